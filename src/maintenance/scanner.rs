//! Maintenance scanner
//!
//! Walks each bucket space's database with a key cursor, one bucket per call.
//! A pass ends when [`ScanResult::Done`] comes back; [`SimpleMaintenanceScanner::reset`]
//! starts the next one.

use std::sync::Arc;

use super::generator::MaintenancePriorityGenerator;
use super::node_stats::PendingMaintenanceStats;
use super::priority::PrioritizedBucket;
use super::priority_db::BucketPriorityDatabase;
use crate::bucket::{Bucket, BucketEntry, BucketSpace, BucketSpaceRepo};
use crate::system::metrics::MaintenanceMetrics;

/// Outcome of one scan step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// A bucket was scanned
    NotDone {
        /// Space the bucket lives in
        space: BucketSpace,
        /// The scanned entry
        entry: BucketEntry,
    },
    /// Every bucket space is exhausted
    Done,
}

impl ScanResult {
    /// Whether the pass is over
    pub fn is_done(&self) -> bool {
        matches!(self, ScanResult::Done)
    }
}

/// Sequential scanner over every bucket space
pub struct SimpleMaintenanceScanner {
    spaces: BucketSpaceRepo,
    priority_db: Arc<dyn BucketPriorityDatabase>,
    generator: Arc<dyn MaintenancePriorityGenerator>,
    metrics: Option<Arc<MaintenanceMetrics>>,
    space_index: usize,
    cursor: Option<u64>,
    scanned: u64,
    stats: PendingMaintenanceStats,
}

impl SimpleMaintenanceScanner {
    /// Create a scanner positioned at the start of a pass
    pub fn new(
        spaces: BucketSpaceRepo,
        priority_db: Arc<dyn BucketPriorityDatabase>,
        generator: Arc<dyn MaintenancePriorityGenerator>,
    ) -> Self {
        Self {
            spaces,
            priority_db,
            generator,
            metrics: None,
            space_index: 0,
            cursor: None,
            scanned: 0,
            stats: PendingMaintenanceStats::default(),
        }
    }

    /// Publish pass results to these metrics
    pub fn with_metrics(mut self, metrics: Arc<MaintenanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Scan the next bucket
    pub fn scan_next(&mut self) -> ScanResult {
        loop {
            let Some(&space_kind) = BucketSpace::ALL.get(self.space_index) else {
                return ScanResult::Done;
            };
            let space = self.spaces.get(space_kind).clone();
            let Some(entry) = space.database().next_after(self.cursor) else {
                self.space_index += 1;
                self.cursor = None;
                if self.space_index == BucketSpace::ALL.len() {
                    self.finish_pass();
                }
                continue;
            };
            self.cursor = Some(entry.bucket.to_key());
            self.scanned += 1;

            for copy in entry.copies() {
                self.stats.per_node.inc_total(copy.node, space_kind);
            }
            let classification = self.generator.prioritize(&space, &entry, &mut self.stats.per_node);
            self.stats.global.inc(classification.maintenance_type);
            // Always written so a bucket that no longer needs work loses its stale entry
            self.priority_db
                .set_priority(PrioritizedBucket::new(Bucket::new(space_kind, entry.bucket), classification.priority));

            return ScanResult::NotDone { space: space_kind, entry };
        }
    }

    /// Scan until the pass is done; returns the number of buckets scanned
    pub fn scan_all(&mut self) -> u64 {
        let before = self.scanned;
        while !self.scan_next().is_done() {}
        self.scanned - before
    }

    /// Rewind to the start and clear collected stats
    pub fn reset(&mut self) {
        self.space_index = 0;
        self.cursor = None;
        self.scanned = 0;
        self.stats.reset();
    }

    /// Stats collected so far in this pass
    pub fn pending_stats(&self) -> &PendingMaintenanceStats {
        &self.stats
    }

    fn finish_pass(&self) {
        tracing::debug!(
            buckets = self.scanned,
            pending_merges = self.stats.global.merge_bucket,
            pending_deletes = self.stats.global.delete_bucket,
            "Maintenance scan pass done"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_pass(self.scanned, &self.stats.global);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{BucketCopy, BucketId, BucketInfo};
    use crate::distribution::{ClusterState, StorageDistribution};
    use crate::maintenance::{
        IdealStatePriorityGenerator, MaintenancePriority, MaintenanceType, SimpleBucketPriorityDatabase,
    };

    struct Fixture {
        spaces: BucketSpaceRepo,
        db: Arc<SimpleBucketPriorityDatabase>,
        scanner: SimpleMaintenanceScanner,
    }

    fn fixture() -> Fixture {
        let spaces = BucketSpaceRepo::new(
            Arc::new(StorageDistribution::new(2)),
            ClusterState::parse("distributor:1 storage:4").unwrap(),
        );
        let db = Arc::new(SimpleBucketPriorityDatabase::new());
        let scanner =
            SimpleMaintenanceScanner::new(spaces.clone(), db.clone(), Arc::new(IdealStatePriorityGenerator::new()));
        Fixture { spaces, db, scanner }
    }

    fn add(spaces: &BucketSpaceRepo, space: BucketSpace, bucket: BucketId, nodes: &[u16]) {
        spaces.get(space).database().insert(BucketEntry::with_copies(
            bucket,
            nodes.iter().map(|&n| BucketCopy::new(n, BucketInfo::new(1, 1, 1), true, 0)),
        ));
    }

    fn ideal_copies(spaces: &BucketSpaceRepo, bucket: BucketId) -> Vec<u16> {
        spaces.get(BucketSpace::Default).ideal_nodes(&bucket)
    }

    #[test]
    fn test_empty_databases_are_done_immediately() {
        let mut f = fixture();
        assert_eq!(f.scanner.scan_next(), ScanResult::Done);
        assert_eq!(f.scanner.scan_next(), ScanResult::Done);
    }

    #[test]
    fn test_pass_visits_every_space_then_done() {
        let mut f = fixture();
        let a = BucketId::new(16, 1);
        let b = BucketId::new(16, 2);
        add(&f.spaces, BucketSpace::Default, a, &ideal_copies(&f.spaces, a));
        add(&f.spaces, BucketSpace::Default, b, &ideal_copies(&f.spaces, b)[..1]);
        add(&f.spaces, BucketSpace::Global, a, &[0]);

        let mut seen = Vec::new();
        loop {
            match f.scanner.scan_next() {
                ScanResult::NotDone { space, entry } => seen.push((space, entry.bucket)),
                ScanResult::Done => break,
            }
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.iter().filter(|(s, _)| *s == BucketSpace::Global).count(), 1);
        assert_eq!(seen.last().map(|(s, _)| *s), Some(BucketSpace::Global));

        assert_eq!(f.db.len(), 2);
        assert_eq!(f.db.priority_of(&Bucket::new(BucketSpace::Default, a)), MaintenancePriority::NoMaintenanceNeeded);
        assert_eq!(f.db.priority_of(&Bucket::new(BucketSpace::Default, b)), MaintenancePriority::VeryHigh);
        assert_eq!(f.scanner.pending_stats().global.get(MaintenanceType::MergeBucket), 2);
        assert_eq!(f.scanner.pending_stats().per_node.bucket_spaces_stats(0).total, {
            let ideal_a = ideal_copies(&f.spaces, a);
            let ideal_b = ideal_copies(&f.spaces, b);
            1 + ideal_a.contains(&0) as u64 + (ideal_b[0] == 0) as u64
        });
    }

    #[test]
    fn test_reset_starts_new_pass_and_clears_stale_priorities() {
        let mut f = fixture();
        let bucket = BucketId::new(16, 5);
        let ideal = ideal_copies(&f.spaces, bucket);
        add(&f.spaces, BucketSpace::Default, bucket, &ideal[..1]);
        assert_eq!(f.scanner.scan_all(), 1);
        assert_eq!(f.db.len(), 1);

        add(&f.spaces, BucketSpace::Default, bucket, &ideal);
        f.scanner.reset();
        assert_eq!(f.scanner.pending_stats(), &PendingMaintenanceStats::default());
        assert_eq!(f.scanner.scan_all(), 1);
        assert!(f.db.is_empty());
    }

    #[test]
    fn test_buckets_added_behind_cursor_wait_for_next_pass() {
        let mut f = fixture();
        let first = BucketId::new(16, 0);
        add(&f.spaces, BucketSpace::Default, BucketId::new(16, 0x8000), &[0]);
        assert!(!f.scanner.scan_next().is_done());
        add(&f.spaces, BucketSpace::Default, first, &[0]);
        // key of `first` sorts before the cursor
        assert!(first.to_key() < BucketId::new(16, 0x8000).to_key());
        assert!(f.scanner.scan_next().is_done());
        f.scanner.reset();
        assert_eq!(f.scanner.scan_all(), 2);
    }
}
