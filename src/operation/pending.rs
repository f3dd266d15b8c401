//! Tracking of in-flight messages, busy nodes and node features

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::commands::MessageType;
use crate::bucket::Bucket;

/// Outstanding messages per node and bucket, plus nodes that recently
/// answered busy
#[derive(Debug)]
pub struct PendingMessageTracker {
    busy_until: DashMap<u16, Instant>,
    pending: DashMap<(u16, Bucket, MessageType), u32>,
    busy_duration: Duration,
}

impl PendingMessageTracker {
    /// Tracker that keeps nodes busy for `busy_duration` after a busy reply
    pub fn new(busy_duration: Duration) -> Self {
        Self {
            busy_until: DashMap::new(),
            pending: DashMap::new(),
            busy_duration,
        }
    }

    /// Record a message sent to `node`
    pub fn insert(&self, node: u16, bucket: Bucket, message_type: MessageType) {
        *self.pending.entry((node, bucket, message_type)).or_insert(0) += 1;
    }

    /// Record the reply for a message sent to `node`
    pub fn reply(&self, node: u16, bucket: Bucket, message_type: MessageType) {
        let key = (node, bucket, message_type);
        let drained = match self.pending.get_mut(&key) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if drained {
            self.pending.remove_if(&key, |_, count| *count == 0);
        }
    }

    /// Whether a message of this type is in flight to `node` for the bucket
    pub fn has_pending(&self, node: u16, bucket: &Bucket, message_type: MessageType) -> bool {
        self.pending.contains_key(&(node, *bucket, message_type))
    }

    /// Whether any message is in flight to `node` for the bucket
    pub fn has_any_pending(&self, node: u16, bucket: &Bucket) -> bool {
        [MessageType::MergeBucket, MessageType::DeleteBucket, MessageType::RequestBucketInfo]
            .into_iter()
            .any(|message_type| self.has_pending(node, bucket, message_type))
    }

    /// Mark a node busy for the configured duration
    pub fn mark_busy(&self, node: u16) {
        tracing::debug!("Storage node {} is busy for {:?}", node, self.busy_duration);
        self.busy_until.insert(node, Instant::now() + self.busy_duration);
    }

    /// Whether a node is still inside its busy window
    pub fn is_busy(&self, node: u16) -> bool {
        let expired = match self.busy_until.get(&node) {
            Some(until) => *until <= Instant::now(),
            None => return false,
        };
        if expired {
            self.busy_until.remove(&node);
        }
        !expired
    }
}

/// Optional features a storage node has advertised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFeatures {
    /// Node accepts merges without an ordered forwarding chain
    pub unordered_merge_chaining: bool,
}

/// Advertised features per storage node
#[derive(Debug, Default)]
pub struct NodeFeatureRepo {
    features: DashMap<u16, NodeFeatures>,
}

impl NodeFeatureRepo {
    /// Empty repo; unknown nodes have no features
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what a node supports
    pub fn set(&self, node: u16, features: NodeFeatures) {
        self.features.insert(node, features);
    }

    /// Features of a node
    pub fn get(&self, node: u16) -> NodeFeatures {
        self.features.get(&node).map(|f| *f).unwrap_or_default()
    }
}
