//! Messages exchanged with storage nodes

use std::fmt;

use crate::bucket::{Bucket, BucketInfo};

/// Node taking part in a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeNode {
    /// Storage node index
    pub index: u16,
    /// Node only supplies data and is not expected to keep the bucket
    pub source_only: bool,
}

impl fmt::Display for MergeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.index, if self.source_only { "s" } else { "" })
    }
}

/// Ask storage nodes to bring their copies of a bucket in sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeBucketCommand {
    /// Bucket to merge
    pub bucket: Bucket,
    /// Participating nodes
    pub nodes: Vec<MergeNode>,
    /// Only entries up to this timestamp take part
    pub max_timestamp: u64,
    /// Cluster state the merge was planned against
    pub cluster_state_version: u32,
    /// Forwarding chain; empty when merging unordered
    pub chain: Vec<u16>,
    /// Nodes may forward in any order
    pub unordered: bool,
    /// Why the merge was started
    pub reasons: String,
    /// Message priority, lower is more urgent
    pub priority: u8,
}

/// Ask one storage node to delete its copy of a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBucketCommand {
    /// Bucket to delete
    pub bucket: Bucket,
    /// Info the copy is expected to have; the node refuses if it differs
    pub expected_info: BucketInfo,
    /// Message priority, lower is more urgent
    pub priority: u8,
}

/// Command sent to a storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCommand {
    /// Merge
    MergeBucket(MergeBucketCommand),
    /// Delete
    DeleteBucket(DeleteBucketCommand),
}

impl StorageCommand {
    /// Bucket the command is about
    pub fn bucket(&self) -> Bucket {
        match self {
            StorageCommand::MergeBucket(cmd) => cmd.bucket,
            StorageCommand::DeleteBucket(cmd) => cmd.bucket,
        }
    }

    /// Message type used for pending tracking
    pub fn message_type(&self) -> MessageType {
        match self {
            StorageCommand::MergeBucket(_) => MessageType::MergeBucket,
            StorageCommand::DeleteBucket(_) => MessageType::DeleteBucket,
        }
    }
}

/// Kinds of in-flight messages tracked per node and bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Merge
    MergeBucket,
    /// Delete
    DeleteBucket,
    /// Bucket info request
    RequestBucketInfo,
}

/// Result of a storage command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnCode {
    /// Success
    Ok,
    /// Node is overloaded; try again later
    Busy,
    /// Node has no such bucket
    BucketNotFound,
    /// Node refused a delete because the copy changed
    BucketInfoMismatch,
    /// Command was aborted by the node
    Aborted,
    /// Anything else
    InternalFailure(String),
}

impl ReturnCode {
    /// Whether the command succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, ReturnCode::Ok)
    }

    /// Whether the node answered busy
    pub fn is_busy(&self) -> bool {
        matches!(self, ReturnCode::Busy)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnCode::Ok => f.write_str("OK"),
            ReturnCode::Busy => f.write_str("BUSY"),
            ReturnCode::BucketNotFound => f.write_str("BUCKET_NOT_FOUND"),
            ReturnCode::BucketInfoMismatch => f.write_str("BUCKET_INFO_MISMATCH"),
            ReturnCode::Aborted => f.write_str("ABORTED"),
            ReturnCode::InternalFailure(msg) => write!(f, "INTERNAL_FAILURE: {}", msg),
        }
    }
}

/// Reply to a [`MergeBucketCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeBucketReply {
    /// Merged bucket
    pub bucket: Bucket,
    /// Node that answered
    pub node: u16,
    /// Outcome
    pub result: ReturnCode,
}

/// Reply to a [`DeleteBucketCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBucketReply {
    /// Deleted bucket
    pub bucket: Bucket,
    /// Node that answered
    pub node: u16,
    /// Outcome
    pub result: ReturnCode,
}

/// Reply from a storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageReply {
    /// Merge reply
    MergeBucket(MergeBucketReply),
    /// Delete reply
    DeleteBucket(DeleteBucketReply),
}

impl StorageReply {
    /// Bucket the reply is about
    pub fn bucket(&self) -> Bucket {
        match self {
            StorageReply::MergeBucket(reply) => reply.bucket,
            StorageReply::DeleteBucket(reply) => reply.bucket,
        }
    }
}

/// Outbound channel to storage nodes
pub trait MessageSender {
    /// Send a command to storage node `target`
    fn send(&mut self, target: u16, command: StorageCommand);
}

impl MessageSender for Vec<(u16, StorageCommand)> {
    fn send(&mut self, target: u16, command: StorageCommand) {
        self.push((target, command));
    }
}
