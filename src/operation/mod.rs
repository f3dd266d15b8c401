//! Distributor operations
//!
//! A [`MergeOperation`] brings a bucket's copies in sync and onto their ideal
//! nodes, then deletes the copies that were only kept as merge sources. A
//! [`RemoveBucketOperation`] deletes copies directly. Both are single-owner
//! state machines driven by an [`OperationOwner`], which also acts as the
//! maintenance scheduler's operation starter.

pub mod commands;
pub mod context;
pub mod merge;
pub mod merge_limiter;
pub mod owner;
pub mod pending;
pub mod remove_bucket;
pub mod sequencer;

pub use commands::{
    DeleteBucketCommand, DeleteBucketReply, MergeBucketCommand, MergeBucketReply, MergeNode, MessageSender,
    MessageType, ReturnCode, StorageCommand, StorageReply,
};
pub use context::{AlwaysOwned, OperationContext, OwnershipCheck};
pub use merge::{generate_sorted_node_list, MergeOperation, MergeState};
pub use merge_limiter::{MergeLimiter, MergeMetaData};
pub use owner::OperationOwner;
pub use pending::{NodeFeatureRepo, NodeFeatures, PendingMessageTracker};
pub use remove_bucket::RemoveBucketOperation;
pub use sequencer::{OperationSequencer, SequencingHandle};
