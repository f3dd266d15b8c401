use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::database::MapBucketDatabase;
use super::id::BucketId;
use crate::distribution::{ClusterState, Distribution};

/// Independent namespaces of buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketSpace {
    /// Regular documents
    Default,
    /// Documents replicated to every node
    Global,
}

impl BucketSpace {
    /// Every bucket space, in scan order
    pub const ALL: [BucketSpace; 2] = [BucketSpace::Default, BucketSpace::Global];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketSpace::Default => "default",
            BucketSpace::Global => "global",
        }
    }
}

impl fmt::Display for BucketSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bucket within a bucket space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    /// Space the bucket belongs to
    pub space: BucketSpace,
    /// Bucket id
    pub id: BucketId,
}

impl Bucket {
    /// Create a bucket
    pub fn new(space: BucketSpace, id: BucketId) -> Self {
        Self { space, id }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bucket(space: {}, {})", self.space, self.id)
    }
}

/// Everything the distributor knows about one bucket space: its bucket
/// database, the cluster state it currently works against and the placement
/// oracle.
pub struct DistributorBucketSpace {
    space: BucketSpace,
    database: MapBucketDatabase,
    cluster_state: ArcSwap<ClusterState>,
    distribution: Arc<dyn Distribution>,
}

impl DistributorBucketSpace {
    /// Create an empty space
    pub fn new(space: BucketSpace, distribution: Arc<dyn Distribution>, cluster_state: ClusterState) -> Self {
        Self {
            space,
            database: MapBucketDatabase::new(),
            cluster_state: ArcSwap::from_pointee(cluster_state),
            distribution,
        }
    }

    /// Which space this is
    pub fn space(&self) -> BucketSpace {
        self.space
    }

    /// Bucket database
    pub fn database(&self) -> &MapBucketDatabase {
        &self.database
    }

    /// Placement oracle
    pub fn distribution(&self) -> &dyn Distribution {
        self.distribution.as_ref()
    }

    /// Current cluster state
    pub fn cluster_state(&self) -> Arc<ClusterState> {
        self.cluster_state.load_full()
    }

    /// Switch to a new cluster state; readers holding the old one keep it
    pub fn set_cluster_state(&self, state: ClusterState) {
        tracing::debug!(space = %self.space, "Switching to cluster state version {}", state.version());
        self.cluster_state.store(Arc::new(state));
    }

    /// Ideal storage nodes for a bucket under the current state. Global
    /// buckets belong on every available node.
    pub fn ideal_nodes(&self, bucket: &BucketId) -> Vec<u16> {
        let state = self.cluster_state.load();
        match self.space {
            BucketSpace::Default => self.distribution.ideal_storage_nodes(&state, bucket),
            BucketSpace::Global => self.distribution.ideal_storage_order(&state, bucket),
        }
    }

    /// Every available node, most preferred first
    pub fn ideal_order(&self, bucket: &BucketId) -> Vec<u16> {
        self.distribution.ideal_storage_order(&self.cluster_state.load(), bucket)
    }

    /// Wanted number of copies for a bucket in this space
    pub fn redundancy(&self, bucket: &BucketId) -> usize {
        match self.space {
            BucketSpace::Default => self.distribution.redundancy() as usize,
            BucketSpace::Global => self.ideal_order(bucket).len(),
        }
    }
}

impl fmt::Debug for DistributorBucketSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributorBucketSpace")
            .field("space", &self.space)
            .field("buckets", &self.database.len())
            .field("cluster_state", &self.cluster_state.load().to_string())
            .finish()
    }
}

/// All bucket spaces of one distributor
#[derive(Debug, Clone)]
pub struct BucketSpaceRepo {
    default: Arc<DistributorBucketSpace>,
    global: Arc<DistributorBucketSpace>,
}

impl BucketSpaceRepo {
    /// Both spaces sharing one distribution and cluster state
    pub fn new(distribution: Arc<dyn Distribution>, cluster_state: ClusterState) -> Self {
        Self {
            default: Arc::new(DistributorBucketSpace::new(
                BucketSpace::Default,
                distribution.clone(),
                cluster_state.clone(),
            )),
            global: Arc::new(DistributorBucketSpace::new(BucketSpace::Global, distribution, cluster_state)),
        }
    }

    /// A space by name
    pub fn get(&self, space: BucketSpace) -> &Arc<DistributorBucketSpace> {
        match space {
            BucketSpace::Default => &self.default,
            BucketSpace::Global => &self.global,
        }
    }

    /// All spaces in scan order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DistributorBucketSpace>> {
        BucketSpace::ALL.into_iter().map(move |space| self.get(space))
    }

    /// Apply a new cluster state to every space
    pub fn set_cluster_state(&self, state: &ClusterState) {
        for space in self.iter() {
            space.set_cluster_state(state.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::StorageDistribution;

    #[test]
    fn test_cluster_state_swap_keeps_old_snapshot() {
        let repo = BucketSpaceRepo::new(
            Arc::new(StorageDistribution::new(2)),
            ClusterState::parse("version:1 storage:4").unwrap(),
        );
        let space = repo.get(BucketSpace::Default);
        let old = space.cluster_state();
        repo.set_cluster_state(&ClusterState::parse("version:2 storage:4 .0.s:d").unwrap());
        assert_eq!(old.version(), 1);
        assert_eq!(space.cluster_state().version(), 2);
        assert_eq!(repo.get(BucketSpace::Global).cluster_state().version(), 2);
        assert!(!space.ideal_nodes(&BucketId::new(16, 3)).contains(&0));
        assert_eq!(space.ideal_nodes(&BucketId::new(16, 3)).len(), 2);

        let global = repo.get(BucketSpace::Global);
        assert_eq!(global.ideal_nodes(&BucketId::new(16, 3)).len(), 3);
        assert_eq!(global.redundancy(&BucketId::new(16, 3)), 3);
    }

    #[test]
    fn test_spaces_have_separate_databases() {
        let repo = BucketSpaceRepo::new(Arc::new(StorageDistribution::new(1)), ClusterState::default());
        repo.get(BucketSpace::Global)
            .database()
            .insert(crate::bucket::BucketEntry::new(BucketId::new(8, 1)));
        assert_eq!(repo.get(BucketSpace::Global).database().len(), 1);
        assert!(repo.get(BucketSpace::Default).database().is_empty());
        assert_eq!(repo.iter().map(|s| s.space()).collect::<Vec<_>>(), BucketSpace::ALL.to_vec());
    }
}
