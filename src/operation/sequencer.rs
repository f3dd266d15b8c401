use std::sync::Arc;

use dashmap::DashSet;

use crate::bucket::Bucket;

/// Hands out exclusive per-bucket handles so at most one mutating operation
/// works on a bucket at a time
#[derive(Debug, Clone, Default)]
pub struct OperationSequencer {
    held: Arc<DashSet<Bucket>>,
}

/// Exclusive claim on a bucket, released on drop
#[derive(Debug)]
pub struct SequencingHandle {
    bucket: Bucket,
    held: Arc<DashSet<Bucket>>,
}

impl OperationSequencer {
    /// Create a sequencer with no buckets held
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a bucket; `None` if another handle holds it
    pub fn try_acquire(&self, bucket: Bucket) -> Option<SequencingHandle> {
        if !self.held.insert(bucket) {
            return None;
        }
        Some(SequencingHandle {
            bucket,
            held: self.held.clone(),
        })
    }

    /// Whether some handle holds the bucket
    pub fn is_blocked(&self, bucket: &Bucket) -> bool {
        self.held.contains(bucket)
    }
}

impl SequencingHandle {
    /// The claimed bucket
    pub fn bucket(&self) -> Bucket {
        self.bucket
    }
}

impl Drop for SequencingHandle {
    fn drop(&mut self) {
        self.held.remove(&self.bucket);
    }
}
