//! In-memory bucket database
//!
//! Entries are keyed by [`BucketId::to_key`] in a persistent ordered map, so a
//! parent bucket sorts directly before everything it contains and read guards
//! are O(1) snapshots that later writes never disturb.

use std::ops::Bound;

use im::OrdMap;
use parking_lot::RwLock;

use super::id::BucketId;
use super::info::BucketEntry;

/// Bucket database for one bucket space
#[derive(Debug, Default)]
pub struct MapBucketDatabase {
    entries: RwLock<OrdMap<u64, BucketEntry>>,
}

/// Immutable view of a bucket database at one point in time
#[derive(Debug, Clone)]
pub struct BucketDatabaseSnapshot {
    entries: OrdMap<u64, BucketEntry>,
}

impl MapBucketDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for exactly this bucket
    pub fn get(&self, bucket: &BucketId) -> Option<BucketEntry> {
        self.entries.read().get(&bucket.to_key()).cloned()
    }

    /// Insert or replace an entry
    pub fn insert(&self, entry: BucketEntry) {
        self.entries.write().insert(entry.bucket.to_key(), entry);
    }

    /// Modify an existing entry in place; returns whether it existed.
    /// An entry left without copies is removed.
    pub fn update(&self, bucket: &BucketId, f: impl FnOnce(&mut BucketEntry)) -> bool {
        let key = bucket.to_key();
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&key) else {
            return false;
        };
        f(entry);
        if entry.is_empty() {
            entries.remove(&key);
        }
        true
    }

    /// Drop the copies held by `nodes`; returns how many were removed
    pub fn remove_nodes(&self, bucket: &BucketId, nodes: &[u16]) -> usize {
        let mut removed = 0;
        self.update(bucket, |entry| {
            removed = nodes.iter().filter(|&&node| entry.remove_node(node)).count();
        });
        removed
    }

    /// Remove an entry
    pub fn remove(&self, bucket: &BucketId) -> Option<BucketEntry> {
        self.entries.write().remove(&bucket.to_key())
    }

    /// Entries for this bucket and every bucket containing it, outermost first
    pub fn get_parents(&self, bucket: &BucketId) -> Vec<BucketEntry> {
        let entries = self.entries.read();
        (0..=bucket.used_bits())
            .filter_map(|bits| entries.get(&bucket.with_used_bits(bits).to_key()).cloned())
            .collect()
    }

    /// Parents of this bucket plus every bucket it contains, in key order
    pub fn get_all(&self, bucket: &BucketId) -> Vec<BucketEntry> {
        let mut result = self.get_parents(bucket);
        let entries = self.entries.read();
        let range = (Bound::Excluded(bucket.to_key()), Bound::Included(bucket.last_contained_key()));
        result.extend(
            entries
                .range(range)
                .filter(|(_, entry)| bucket.contains(&entry.bucket))
                .map(|(_, entry)| entry.clone()),
        );
        result
    }

    /// Visit entries in key order until the visitor returns false
    pub fn for_each(&self, mut visitor: impl FnMut(&BucketEntry) -> bool) {
        let snapshot = self.read_guard();
        for entry in snapshot.iter() {
            if !visitor(entry) {
                break;
            }
        }
    }

    /// First entry whose key is greater than `cursor` (or the first entry at all)
    pub fn next_after(&self, cursor: Option<u64>) -> Option<BucketEntry> {
        let entries = self.entries.read();
        let lower = match cursor {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        entries.range((lower, Bound::Unbounded)).next().map(|(_, entry)| entry.clone())
    }

    /// Snapshot for lock-free reading
    pub fn read_guard(&self) -> BucketDatabaseSnapshot {
        BucketDatabaseSnapshot {
            entries: self.entries.read().clone(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// No entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl BucketDatabaseSnapshot {
    /// Entry for exactly this bucket
    pub fn get(&self, bucket: &BucketId) -> Option<&BucketEntry> {
        self.entries.get(&bucket.to_key())
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = &BucketEntry> {
        self.entries.values()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
