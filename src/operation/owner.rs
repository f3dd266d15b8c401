//! Operation owner
//!
//! Turns prioritized buckets into running operations, routes storage replies
//! to them and drops them once finished. At most one operation runs per bucket.

use std::collections::HashMap;
use std::sync::Arc;

use super::commands::{MessageSender, StorageReply};
use super::context::OperationContext;
use super::merge::MergeOperation;
use super::remove_bucket::RemoveBucketOperation;
use super::sequencer::SequencingHandle;
use crate::bucket::{Bucket, DistributorBucketSpace};
use crate::maintenance::{
    MaintenancePriorityGenerator, MaintenanceType, NodeMaintenanceStatsTracker, OperationStarter, PrioritizedBucket,
};

#[derive(Debug)]
enum RunningOperation {
    Merge(MergeOperation),
    RemoveBucket {
        operation: RemoveBucketOperation,
        _handle: SequencingHandle,
    },
}

/// Starts maintenance operations and feeds them their replies
pub struct OperationOwner<S: MessageSender> {
    ctx: Arc<OperationContext>,
    generator: Arc<dyn MaintenancePriorityGenerator>,
    sender: S,
    running: HashMap<Bucket, RunningOperation>,
}

fn merge_nodes(space: &DistributorBucketSpace, bucket: &Bucket, copies: &[u16]) -> Vec<u16> {
    let mut nodes = space.ideal_nodes(&bucket.id);
    for &node in copies {
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }
    nodes
}

impl<S: MessageSender> OperationOwner<S> {
    /// Owner sending through `sender`
    pub fn new(ctx: Arc<OperationContext>, generator: Arc<dyn MaintenancePriorityGenerator>, sender: S) -> Self {
        Self {
            ctx,
            generator,
            sender,
            running: HashMap::new(),
        }
    }

    /// Shared operation context
    pub fn context(&self) -> &Arc<OperationContext> {
        &self.ctx
    }

    /// The outbound sender
    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    /// Number of unfinished operations
    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Whether an operation is running for the bucket
    pub fn is_running(&self, bucket: &Bucket) -> bool {
        self.running.contains_key(bucket)
    }

    /// Route a storage reply; returns false when no operation wanted it
    pub fn handle_reply(&mut self, reply: StorageReply) -> bool {
        let bucket = reply.bucket();
        let Some(operation) = self.running.get_mut(&bucket) else {
            tracing::debug!("No running operation for reply on {}", bucket);
            return false;
        };
        let finished = match operation {
            RunningOperation::Merge(merge) => {
                merge.on_reply(&self.ctx, &mut self.sender, &reply);
                merge.is_finished()
            }
            RunningOperation::RemoveBucket { operation, .. } => match &reply {
                StorageReply::DeleteBucket(delete) => {
                    let done = operation.on_reply(&self.ctx, delete);
                    if done {
                        record(&self.ctx.remove_metrics, operation.succeeded());
                    }
                    done
                }
                other => {
                    tracing::warn!("Remove of {} ignoring {:?}", bucket, other);
                    false
                }
            },
        };
        if finished {
            self.running.remove(&bucket);
        }
        true
    }

    fn start_merge(&mut self, prioritized: &PrioritizedBucket, copies: &[u16], priority: u8) -> bool {
        let space = self.ctx.spaces.get(prioritized.bucket.space);
        let nodes = merge_nodes(space, &prioritized.bucket, copies);
        let mut merge = MergeOperation::new(
            prioritized.bucket,
            nodes,
            priority,
            format!("[Maintenance merge at priority {}]", prioritized.priority),
        );
        if merge.is_blocked(&self.ctx) {
            self.ctx.merge_metrics.blocked.inc();
            return false;
        }
        merge.start(&self.ctx, &mut self.sender);
        if !merge.is_finished() {
            self.running.insert(prioritized.bucket, RunningOperation::Merge(merge));
        }
        true
    }

    fn start_remove(&mut self, prioritized: &PrioritizedBucket, copies: &[u16], priority: u8) -> bool {
        let bucket = prioritized.bucket;
        let ideal = self.ctx.spaces.get(bucket.space).ideal_nodes(&bucket.id);
        let surplus: Vec<u16> = copies.iter().copied().filter(|n| !ideal.contains(n)).collect();
        if surplus.is_empty() {
            return true;
        }
        let pending = surplus.iter().any(|&n| self.ctx.pending.has_any_pending(n, &bucket));
        let handle = match self.ctx.sequencer.try_acquire(bucket) {
            Some(handle) if !pending => handle,
            _ => {
                self.ctx.remove_metrics.blocked.inc();
                return false;
            }
        };
        let mut operation = RemoveBucketOperation::new(bucket, surplus, priority);
        operation.start(&self.ctx, &mut self.sender);
        if operation.is_done() {
            record(&self.ctx.remove_metrics, operation.succeeded());
        } else {
            self.running.insert(bucket, RunningOperation::RemoveBucket { operation, _handle: handle });
        }
        true
    }
}

fn record(metrics: &crate::system::metrics::OperationMetrics, ok: bool) {
    if ok {
        metrics.ok.inc();
    } else {
        metrics.failed.inc();
    }
}

impl<S: MessageSender> OperationStarter for OperationOwner<S> {
    fn start(&mut self, prioritized: &PrioritizedBucket) -> bool {
        if self.running.contains_key(&prioritized.bucket) {
            return false;
        }
        let space = self.ctx.spaces.get(prioritized.bucket.space).clone();
        let Some(entry) = space.database().get(&prioritized.bucket.id) else {
            return true;
        };
        let mut scratch = NodeMaintenanceStatsTracker::new();
        let classification = self.generator.prioritize(&space, &entry, &mut scratch);
        let priority = self
            .ctx
            .priorities
            .message_priority(prioritized.priority)
            .unwrap_or(u8::MAX);
        let copies = entry.nodes();

        match classification.maintenance_type {
            MaintenanceType::MergeBucket => self.start_merge(prioritized, &copies, priority),
            MaintenanceType::DeleteBucket => self.start_remove(prioritized, &copies, priority),
            MaintenanceType::None => true,
        }
    }
}
