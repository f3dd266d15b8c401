//! Merge operation
//!
//! Created → NodeListGenerated → MergeSent → DeleteSourceOnlySent → Done,
//! with Failed reachable from every step. The operation never retries; a
//! failed bucket is picked up again by a later maintenance pass.

use prometheus::IntCounter;

use super::commands::{
    DeleteBucketReply, MergeBucketCommand, MergeBucketReply, MergeNode, MessageSender, MessageType, StorageCommand,
    StorageReply,
};
use super::context::OperationContext;
use super::merge_limiter::{MergeLimiter, MergeMetaData};
use super::remove_bucket::RemoveBucketOperation;
use super::sequencer::SequencingHandle;
use crate::bucket::{Bucket, BucketCopy, BucketId, BucketSpace, DistributorBucketSpace};

/// Merge progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Not started
    Created,
    /// Participants chosen
    NodeListGenerated,
    /// Waiting for the merge reply
    MergeSent,
    /// Waiting for source-only deletes
    DeleteSourceOnlySent,
    /// Finished successfully
    Done,
    /// Finished unsuccessfully
    Failed,
}

/// Order merge participants by preference and mark surplus ones source-only.
///
/// Nodes are sorted by their position in the bucket's ideal order; nodes the
/// distribution does not want at all (down, retired) follow by index. Every
/// node past the space's redundancy becomes source-only, so with N nodes and
/// redundancy R exactly N - R are marked when N > R and none otherwise. The
/// limiter then caps the list.
pub fn generate_sorted_node_list(
    space: &DistributorBucketSpace,
    bucket: &BucketId,
    limiter: &MergeLimiter,
    mut nodes: Vec<MergeMetaData>,
) -> Vec<MergeMetaData> {
    let ideal_order = space.ideal_order(bucket);
    let redundancy = space.redundancy(bucket);
    nodes.sort_by_key(|n| match ideal_order.iter().position(|&i| i == n.node) {
        Some(pos) => (false, pos, n.node),
        None => (true, 0, n.node),
    });
    for (pos, node) in nodes.iter_mut().enumerate() {
        node.source_only = pos >= redundancy;
    }
    limiter.limit(nodes)
}

/// Merge of one bucket across a set of nodes
#[derive(Debug)]
pub struct MergeOperation {
    bucket: Bucket,
    nodes: Vec<u16>,
    priority: u8,
    reasons: String,
    state: MergeState,
    merge_nodes: Vec<MergeMetaData>,
    source_only_before: Vec<BucketCopy>,
    target: Option<u16>,
    remove: Option<RemoveBucketOperation>,
    handle: Option<SequencingHandle>,
}

impl MergeOperation {
    /// Merge `bucket` across `nodes` at message priority `priority`
    pub fn new(bucket: Bucket, nodes: Vec<u16>, priority: u8, reasons: impl Into<String>) -> Self {
        Self {
            bucket,
            nodes,
            priority,
            reasons: reasons.into(),
            state: MergeState::Created,
            merge_nodes: Vec::new(),
            source_only_before: Vec::new(),
            target: None,
            remove: None,
            handle: None,
        }
    }

    /// Bucket being merged
    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    /// Current state
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Participants after sorting and limiting
    pub fn merge_nodes(&self) -> &[MergeMetaData] {
        &self.merge_nodes
    }

    /// Node the merge command went to
    pub fn target(&self) -> Option<u16> {
        self.target
    }

    /// Done or failed
    pub fn is_finished(&self) -> bool {
        matches!(self.state, MergeState::Done | MergeState::Failed)
    }

    /// Whether the merge must wait: a participating node is busy (global
    /// buckets ignore this), another operation holds the bucket, or a bucket
    /// info request for the bucket is outstanding on a participating node.
    pub fn is_blocked(&self, ctx: &OperationContext) -> bool {
        if self.bucket.space != BucketSpace::Global && self.nodes.iter().any(|&n| ctx.pending.is_busy(n)) {
            return true;
        }
        if ctx.sequencer.is_blocked(&self.bucket) {
            return true;
        }
        self.nodes
            .iter()
            .any(|&n| ctx.pending.has_pending(n, &self.bucket, MessageType::RequestBucketInfo))
    }

    /// Plan the merge and send the merge command
    pub fn start(&mut self, ctx: &OperationContext, sender: &mut dyn MessageSender) {
        if self.state != MergeState::Created {
            tracing::warn!("Merge of {} started twice", self.bucket);
            return;
        }
        if ctx.should_abort(&self.bucket) {
            tracing::debug!("Not merging {}: ownership changed", self.bucket);
            self.finish(ctx, false);
            return;
        }
        let space = ctx.spaces.get(self.bucket.space);
        let Some(entry) = space.database().get(&self.bucket.id) else {
            tracing::debug!("Not merging {}: bucket no longer exists", self.bucket);
            self.finish(ctx, true);
            return;
        };

        let metadata = self
            .nodes
            .iter()
            .map(|&node| MergeMetaData::new(entry.get_node(node).copied().unwrap_or_else(|| BucketCopy::empty(node)), false))
            .collect();
        let limiter = MergeLimiter::new(ctx.config.max_nodes_per_merge);
        self.merge_nodes = generate_sorted_node_list(space, &self.bucket.id, &limiter, metadata);
        self.state = MergeState::NodeListGenerated;

        if self.merge_nodes.len() < 2 {
            tracing::warn!("Cannot merge {} with fewer than two nodes", self.bucket);
            self.finish(ctx, false);
            return;
        }
        self.source_only_before = self
            .merge_nodes
            .iter()
            .filter(|n| n.source_only && n.has_valid_copy())
            .map(|n| n.copy)
            .collect();

        let unordered = ctx.config.use_unordered_merge_chaining
            && self
                .merge_nodes
                .iter()
                .all(|n| ctx.features.get(n.node).unordered_merge_chaining);
        let mut nodes: Vec<MergeNode> = self
            .merge_nodes
            .iter()
            .map(|n| MergeNode { index: n.node, source_only: n.source_only })
            .collect();
        let chain = if unordered {
            Vec::new()
        } else {
            nodes.sort_by_key(|n| n.index);
            nodes.iter().map(|n| n.index).collect()
        };
        let target = nodes[0].index;

        let command = MergeBucketCommand {
            bucket: self.bucket,
            nodes,
            max_timestamp: ctx.unique_timestamp(),
            cluster_state_version: space.cluster_state().version(),
            chain,
            unordered,
            reasons: self.reasons.clone(),
            priority: self.priority,
        };
        tracing::debug!(
            "Sending merge of {} to node {} with nodes [{}]",
            self.bucket,
            target,
            command.nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
        );
        ctx.pending.insert(target, self.bucket, MessageType::MergeBucket);
        sender.send(target, StorageCommand::MergeBucket(command));
        self.target = Some(target);
        self.state = MergeState::MergeSent;
    }

    /// Feed a reply to the operation
    pub fn on_reply(&mut self, ctx: &OperationContext, sender: &mut dyn MessageSender, reply: &StorageReply) {
        match (self.state, reply) {
            (MergeState::MergeSent, StorageReply::MergeBucket(reply)) => self.on_merge_reply(ctx, sender, reply),
            (MergeState::DeleteSourceOnlySent, StorageReply::DeleteBucket(reply)) => self.on_delete_reply(ctx, reply),
            (state, reply) => tracing::warn!("Merge of {} in state {:?} ignoring {:?}", self.bucket, state, reply),
        }
    }

    fn on_merge_reply(&mut self, ctx: &OperationContext, sender: &mut dyn MessageSender, reply: &MergeBucketReply) {
        ctx.pending.reply(reply.node, self.bucket, MessageType::MergeBucket);
        if !reply.result.is_success() {
            if reply.result.is_busy() {
                ctx.pending.mark_busy(reply.node);
                ctx.merge_metrics.throttled.inc();
            }
            tracing::debug!("Merge of {} failed: {}", self.bucket, reply.result);
            self.finish(ctx, false);
            return;
        }
        if ctx.should_abort(&self.bucket) {
            tracing::debug!("Merge of {} done but ownership changed, not deleting", self.bucket);
            self.finish(ctx, false);
            return;
        }
        let Some(entry) = ctx.spaces.get(self.bucket.space).database().get(&self.bucket.id) else {
            self.finish(ctx, true);
            return;
        };

        let changed = self
            .source_only_before
            .iter()
            .find(|before| {
                entry
                    .get_node(before.node)
                    .is_some_and(|now| !now.info.same_documents(&before.info))
            })
            .map(|before| before.node);
        if let Some(node) = changed {
            tracing::info!("Source-only copy of {} on node {} changed during merge, not deleting", self.bucket, node);
            self.fail_with(ctx, &ctx.merge_metrics.source_only_copy_changed);
            return;
        }

        let kept: Vec<&BucketCopy> = self
            .merge_nodes
            .iter()
            .filter(|n| !n.source_only)
            .filter_map(|n| entry.get_node(n.node))
            .collect();
        let wanted = self.merge_nodes.iter().filter(|n| !n.source_only).count();
        let converged =
            kept.len() == wanted && kept.first().is_some_and(|first| kept.iter().all(|c| c.consistent_with(first)));
        if !converged {
            tracing::debug!("Copies of {} not yet in sync after merge, keeping source-only copies", self.bucket);
            self.finish(ctx, true);
            return;
        }

        let targets: Vec<u16> = self
            .merge_nodes
            .iter()
            .filter(|n| n.source_only && entry.get_node(n.node).is_some())
            .map(|n| n.node)
            .collect();
        if targets.is_empty() {
            self.finish(ctx, true);
            return;
        }

        let busy = targets.iter().any(|&n| ctx.pending.has_any_pending(n, &self.bucket));
        let handle = match ctx.sequencer.try_acquire(self.bucket) {
            Some(handle) if !busy => handle,
            _ => {
                tracing::debug!("Deleting source-only copies of {} is blocked", self.bucket);
                self.fail_with(ctx, &ctx.merge_metrics.source_only_copy_delete_blocked);
                return;
            }
        };

        let priority = self.priority.min(ctx.config.max_feed_priority);
        let mut remove = RemoveBucketOperation::new(self.bucket, targets, priority);
        remove.start(ctx, sender);
        self.handle = Some(handle);
        self.remove = Some(remove);
        self.state = MergeState::DeleteSourceOnlySent;
    }

    fn on_delete_reply(&mut self, ctx: &OperationContext, reply: &DeleteBucketReply) {
        let Some(remove) = self.remove.as_mut() else {
            return;
        };
        if !remove.on_reply(ctx, reply) {
            return;
        }
        if remove.succeeded() {
            self.finish(ctx, true);
        } else {
            self.fail_with(ctx, &ctx.merge_metrics.source_only_copy_delete_failed);
        }
    }

    fn fail_with(&mut self, ctx: &OperationContext, reason: &IntCounter) {
        reason.inc();
        self.finish(ctx, false);
    }

    fn finish(&mut self, ctx: &OperationContext, ok: bool) {
        if ok {
            self.state = MergeState::Done;
            ctx.merge_metrics.ok.inc();
        } else {
            self.state = MergeState::Failed;
            ctx.merge_metrics.failed.inc();
        }
        self.handle = None;
    }
}
