use super::commands::{DeleteBucketCommand, DeleteBucketReply, MessageSender, MessageType, ReturnCode, StorageCommand};
use super::context::OperationContext;
use crate::bucket::Bucket;

/// Deletes a bucket's copies on a set of nodes and drops them from the
/// bucket database as the replies arrive
#[derive(Debug)]
pub struct RemoveBucketOperation {
    bucket: Bucket,
    nodes: Vec<u16>,
    priority: u8,
    outstanding: Vec<u16>,
    succeeded: bool,
    started: bool,
}

impl RemoveBucketOperation {
    /// Operation deleting the copies on `nodes`
    pub fn new(bucket: Bucket, nodes: Vec<u16>, priority: u8) -> Self {
        Self {
            bucket,
            nodes,
            priority,
            outstanding: Vec::new(),
            succeeded: true,
            started: false,
        }
    }

    /// Bucket being deleted from
    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    /// Target nodes
    pub fn nodes(&self) -> &[u16] {
        &self.nodes
    }

    /// Send one delete per node that still has a copy in the database
    pub fn start(&mut self, ctx: &OperationContext, sender: &mut dyn MessageSender) {
        self.started = true;
        let entry = ctx.spaces.get(self.bucket.space).database().get(&self.bucket.id);
        for &node in &self.nodes {
            let Some(copy) = entry.as_ref().and_then(|e| e.get_node(node)) else {
                tracing::debug!("{} has no copy on node {}, nothing to delete", self.bucket, node);
                continue;
            };
            let command = DeleteBucketCommand {
                bucket: self.bucket,
                expected_info: copy.info,
                priority: self.priority,
            };
            ctx.pending.insert(node, self.bucket, MessageType::DeleteBucket);
            sender.send(node, StorageCommand::DeleteBucket(command));
            self.outstanding.push(node);
        }
    }

    /// Handle a delete reply; returns whether the operation is finished
    pub fn on_reply(&mut self, ctx: &OperationContext, reply: &DeleteBucketReply) -> bool {
        let Some(pos) = self.outstanding.iter().position(|&n| n == reply.node) else {
            tracing::warn!("Unexpected delete reply from node {} for {}", reply.node, self.bucket);
            return self.is_done();
        };
        self.outstanding.swap_remove(pos);
        ctx.pending.reply(reply.node, self.bucket, MessageType::DeleteBucket);

        match &reply.result {
            ReturnCode::Ok | ReturnCode::BucketNotFound => {
                ctx.spaces
                    .get(self.bucket.space)
                    .database()
                    .remove_nodes(&self.bucket.id, &[reply.node]);
            }
            result => {
                if result.is_busy() {
                    ctx.pending.mark_busy(reply.node);
                }
                tracing::warn!("Deleting {} on node {} failed: {}", self.bucket, reply.node, result);
                self.succeeded = false;
            }
        }
        self.is_done()
    }

    /// All replies are in
    pub fn is_done(&self) -> bool {
        self.started && self.outstanding.is_empty()
    }

    /// Every delete succeeded (meaningful once done)
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }
}
