//! Ideal placement of buckets on nodes
//!
//! Every node gets a pseudo-random score drawn from a generator seeded with
//! the bucket's distribution bits; nodes are ordered by score. The generator
//! is the 48-bit linear congruential one from `java.util.Random`, so every
//! process computes the same order for the same bucket and state.

use crate::bucket::BucketId;
use crate::distribution::cluster_state::{ClusterState, NodeState};

/// Oracle deciding where buckets should live
pub trait Distribution: Send + Sync {
    /// Number of copies every bucket should have
    fn redundancy(&self) -> u16;

    /// Every available storage node, most preferred first
    fn ideal_storage_order(&self, state: &ClusterState, bucket: &BucketId) -> Vec<u16>;

    /// The first `redundancy` nodes of the ideal order
    fn ideal_storage_nodes(&self, state: &ClusterState, bucket: &BucketId) -> Vec<u16> {
        let mut nodes = self.ideal_storage_order(state, bucket);
        nodes.truncate(self.redundancy() as usize);
        nodes
    }

    /// Distributor owning the bucket, if any distributor is available
    fn ideal_distributor_node(&self, state: &ClusterState, bucket: &BucketId) -> Option<u16>;
}

const MULTIPLIER: u64 = 0x5DEE_CE66D;
const ADDEND: u64 = 0xB;
const MASK: u64 = (1 << 48) - 1;

/// `java.util.Random` compatible generator
#[derive(Debug, Clone)]
struct RandomGen {
    seed: u64,
}

impl RandomGen {
    fn new(seed: u64) -> Self {
        Self { seed: (seed ^ MULTIPLIER) & MASK }
    }

    fn next(&mut self, bits: u32) -> u64 {
        self.seed = self.seed.wrapping_mul(MULTIPLIER).wrapping_add(ADDEND) & MASK;
        self.seed >> (48 - bits)
    }

    fn next_double(&mut self) -> f64 {
        let value = (self.next(26) << 27) + self.next(27);
        value as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// Default capacity-weighted distribution
#[derive(Debug, Clone)]
pub struct StorageDistribution {
    redundancy: u16,
}

impl StorageDistribution {
    /// Distribution keeping `redundancy` copies per bucket
    pub fn new(redundancy: u16) -> Self {
        Self { redundancy }
    }

    fn seed(state: &ClusterState, bucket: &BucketId) -> u64 {
        let bits = state.distribution_bits().min(bucket.used_bits());
        bucket.with_used_bits(bits).location()
    }

    /// Scores every node index, skipping unavailable nodes but still drawing
    /// their score so one node going down leaves the others' order intact.
    fn order(seed: u64, count: u16, node: impl Fn(u16) -> NodeState) -> Vec<u16> {
        let mut random = RandomGen::new(seed);
        let mut scored: Vec<(f64, u16)> = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut score = random.next_double();
            let node = node(index);
            if !node.state.is_available() {
                continue;
            }
            if node.capacity > 0.0 && node.capacity != 1.0 {
                score = score.powf(1.0 / node.capacity);
            }
            scored.push((score, index));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, index)| index).collect()
    }
}

impl Distribution for StorageDistribution {
    fn redundancy(&self) -> u16 {
        self.redundancy
    }

    fn ideal_storage_order(&self, state: &ClusterState, bucket: &BucketId) -> Vec<u16> {
        Self::order(Self::seed(state, bucket), state.storage_count(), |i| state.storage_node(i))
    }

    fn ideal_distributor_node(&self, state: &ClusterState, bucket: &BucketId) -> Option<u16> {
        Self::order(Self::seed(state, bucket), state.distributor_count(), |i| state.distributor_node(i))
            .first()
            .copied()
    }
}
