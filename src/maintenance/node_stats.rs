//! Per-node maintenance statistics gathered during a scan pass

use std::collections::HashMap;

use super::priority::MaintenanceType;
use crate::bucket::BucketSpace;

/// Counts of maintenance work touching one node in one bucket space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeMaintenanceStats {
    /// Copies that should leave this node
    pub moving_out: u64,
    /// Copies on this node that are out of sync
    pub syncing: u64,
    /// Copies this node is missing
    pub copying_in: u64,
    /// Copies this node must supply to others
    pub copying_out: u64,
    /// Copies this node holds
    pub total: u64,
}

impl NodeMaintenanceStats {
    /// Copies still awaiting maintenance: moving out, syncing or copying in
    pub fn pending(&self) -> u64 {
        self.moving_out + self.syncing + self.copying_in
    }

    fn merge(&mut self, other: &NodeMaintenanceStats) {
        self.moving_out += other.moving_out;
        self.syncing += other.syncing;
        self.copying_in += other.copying_in;
        self.copying_out += other.copying_out;
        self.total += other.total;
    }
}

/// Totals for one node across bucket spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketSpacesStats {
    /// Copies held
    pub total: u64,
    /// Copies awaiting maintenance
    pub pending: u64,
}

/// Maintenance stats per node and bucket space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMaintenanceStatsTracker {
    stats: HashMap<u16, HashMap<BucketSpace, NodeMaintenanceStats>>,
}

impl NodeMaintenanceStatsTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, node: u16, space: BucketSpace) -> &mut NodeMaintenanceStats {
        self.stats.entry(node).or_default().entry(space).or_default()
    }

    /// A copy on `node` should move elsewhere
    pub fn inc_moving_out(&mut self, node: u16, space: BucketSpace) {
        self.entry(node, space).moving_out += 1;
    }

    /// A copy on `node` is out of sync
    pub fn inc_syncing(&mut self, node: u16, space: BucketSpace) {
        self.entry(node, space).syncing += 1;
    }

    /// `node` is missing a copy it should have
    pub fn inc_copying_in(&mut self, node: u16, space: BucketSpace) {
        self.entry(node, space).copying_in += 1;
    }

    /// `node` must supply a copy
    pub fn inc_copying_out(&mut self, node: u16, space: BucketSpace) {
        self.entry(node, space).copying_out += 1;
    }

    /// `node` holds a copy
    pub fn inc_total(&mut self, node: u16, space: BucketSpace) {
        self.entry(node, space).total += 1;
    }

    /// Stats for one node in one space (zero when never touched)
    pub fn for_node(&self, node: u16, space: BucketSpace) -> NodeMaintenanceStats {
        self.stats
            .get(&node)
            .and_then(|spaces| spaces.get(&space))
            .copied()
            .unwrap_or_default()
    }

    /// Totals for one node summed over every bucket space
    pub fn bucket_spaces_stats(&self, node: u16) -> BucketSpacesStats {
        let mut sum = NodeMaintenanceStats::default();
        if let Some(spaces) = self.stats.get(&node) {
            for stats in spaces.values() {
                sum.merge(stats);
            }
        }
        BucketSpacesStats {
            total: sum.total,
            pending: sum.pending(),
        }
    }

    /// Nodes with any recorded stats, ascending
    pub fn nodes(&self) -> Vec<u16> {
        let mut nodes: Vec<u16> = self.stats.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.stats.clear();
    }
}

/// Pending operations per maintenance type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationTypeCounts {
    /// Buckets needing a merge
    pub merge_bucket: u64,
    /// Buckets needing a delete
    pub delete_bucket: u64,
}

impl OperationTypeCounts {
    /// Count one more bucket of this type
    pub fn inc(&mut self, maintenance_type: MaintenanceType) {
        match maintenance_type {
            MaintenanceType::MergeBucket => self.merge_bucket += 1,
            MaintenanceType::DeleteBucket => self.delete_bucket += 1,
            MaintenanceType::None => {}
        }
    }

    /// Count for one type
    pub fn get(&self, maintenance_type: MaintenanceType) -> u64 {
        match maintenance_type {
            MaintenanceType::MergeBucket => self.merge_bucket,
            MaintenanceType::DeleteBucket => self.delete_bucket,
            MaintenanceType::None => 0,
        }
    }
}

/// Everything a scan pass has counted so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingMaintenanceStats {
    /// Buckets needing work, per operation type
    pub global: OperationTypeCounts,
    /// Per-node stats
    pub per_node: NodeMaintenanceStatsTracker,
}

impl PendingMaintenanceStats {
    /// Clear all counts
    pub fn reset(&mut self) {
        self.global = OperationTypeCounts::default();
        self.per_node.reset();
    }
}
