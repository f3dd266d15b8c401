//! Priority database
//!
//! Ordered by priority (most urgent first), then by the order priorities were
//! assigned. Re-prioritizing a bucket moves it to the back of its new tier.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::priority::{MaintenancePriority, PrioritizedBucket};
use crate::bucket::Bucket;

/// Store of buckets waiting for maintenance
pub trait BucketPriorityDatabase: Send + Sync {
    /// Set a bucket's priority; `NoMaintenanceNeeded` removes it
    fn set_priority(&self, prioritized: PrioritizedBucket);

    /// Current priority of a bucket (`NoMaintenanceNeeded` when absent)
    fn priority_of(&self, bucket: &Bucket) -> MaintenancePriority;

    /// All buckets in dispatch order, as of now
    fn snapshot(&self) -> Vec<PrioritizedBucket>;

    /// Number of stored buckets
    fn len(&self) -> usize;

    /// No stored buckets
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Key = (Reverse<MaintenancePriority>, u64);

#[derive(Debug, Default)]
struct Inner {
    ordered: BTreeMap<Key, Bucket>,
    index: HashMap<Bucket, Key>,
    next_sequence: u64,
}

/// [`BucketPriorityDatabase`] backed by an ordered map plus an inverse index
#[derive(Debug, Default)]
pub struct SimpleBucketPriorityDatabase {
    inner: RwLock<Inner>,
}

impl SimpleBucketPriorityDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketPriorityDatabase for SimpleBucketPriorityDatabase {
    fn set_priority(&self, prioritized: PrioritizedBucket) {
        let mut inner = self.inner.write();
        if let Some(old) = inner.index.remove(&prioritized.bucket) {
            inner.ordered.remove(&old);
        }
        if !prioritized.priority.requires_maintenance() {
            return;
        }
        let key = (Reverse(prioritized.priority), inner.next_sequence);
        inner.next_sequence += 1;
        inner.ordered.insert(key, prioritized.bucket);
        inner.index.insert(prioritized.bucket, key);
    }

    fn priority_of(&self, bucket: &Bucket) -> MaintenancePriority {
        self.inner
            .read()
            .index
            .get(bucket)
            .map(|(Reverse(priority), _)| *priority)
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Vec<PrioritizedBucket> {
        self.inner
            .read()
            .ordered
            .iter()
            .map(|((Reverse(priority), _), bucket)| PrioritizedBucket::new(*bucket, *priority))
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.read().ordered.len()
    }
}
