//! Bucket classification

use super::node_stats::NodeMaintenanceStatsTracker;
use super::priority::{MaintenancePriority, MaintenancePriorityAndType, MaintenanceType};
use crate::bucket::{BucketEntry, DistributorBucketSpace};

/// Decides what, if anything, a bucket needs
pub trait MaintenancePriorityGenerator: Send + Sync {
    /// Classify one bucket entry, recording per-node work into `stats`
    fn prioritize(
        &self,
        space: &DistributorBucketSpace,
        entry: &BucketEntry,
        stats: &mut NodeMaintenanceStatsTracker,
    ) -> MaintenancePriorityAndType;
}

/// Compares a bucket's copies against its ideal nodes.
///
/// | situation | result |
/// |---|---|
/// | fewer copies than wanted | merge, very high |
/// | copies out of sync | merge, high |
/// | copies on the wrong nodes | merge, medium |
/// | in sync, ideal nodes covered, surplus copies | delete, low |
#[derive(Debug, Clone, Copy, Default)]
pub struct IdealStatePriorityGenerator;

impl IdealStatePriorityGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }
}

impl MaintenancePriorityGenerator for IdealStatePriorityGenerator {
    fn prioritize(
        &self,
        space: &DistributorBucketSpace,
        entry: &BucketEntry,
        stats: &mut NodeMaintenanceStatsTracker,
    ) -> MaintenancePriorityAndType {
        if entry.is_empty() {
            return MaintenancePriorityAndType::none();
        }
        let ideal = space.ideal_nodes(&entry.bucket);
        if ideal.is_empty() {
            return MaintenancePriorityAndType::none();
        }
        let bucket_space = space.space();
        let wanted = ideal.len();
        let in_sync = entry.valid_and_consistent();
        let missing: Vec<u16> = ideal.iter().copied().filter(|n| entry.get_node(*n).is_none()).collect();
        let misplaced: Vec<u16> = entry.nodes().into_iter().filter(|n| !ideal.contains(n)).collect();

        let priority = if entry.node_count() < wanted {
            MaintenancePriority::VeryHigh
        } else if !in_sync {
            MaintenancePriority::High
        } else if !missing.is_empty() {
            MaintenancePriority::Medium
        } else if !misplaced.is_empty() {
            for &node in &misplaced {
                stats.inc_moving_out(node, bucket_space);
            }
            return MaintenancePriorityAndType::new(MaintenancePriority::Low, MaintenanceType::DeleteBucket);
        } else {
            return MaintenancePriorityAndType::none();
        };

        for &node in &missing {
            stats.inc_copying_in(node, bucket_space);
        }
        for &node in &misplaced {
            stats.inc_moving_out(node, bucket_space);
        }
        for copy in entry.copies() {
            if !in_sync {
                stats.inc_syncing(copy.node, bucket_space);
            }
            if !missing.is_empty() && copy.info.is_valid() {
                stats.inc_copying_out(copy.node, bucket_space);
            }
        }
        tracing::trace!(bucket = %entry.bucket, space = %bucket_space, "Needs merge at priority {}", priority);
        MaintenancePriorityAndType::new(priority, MaintenanceType::MergeBucket)
    }
}
