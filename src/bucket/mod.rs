//! Buckets: the unit of replication
//!
//! Documents map to buckets through [`BucketIdFactory`]; each bucket space keeps a
//! database of bucket entries recording which storage nodes hold a copy and
//! what those copies look like.

pub mod database;
pub mod factory;
pub mod id;
pub mod info;
pub mod space;

pub use database::{BucketDatabaseSnapshot, MapBucketDatabase};
pub use factory::BucketIdFactory;
pub use id::BucketId;
pub use info::{BucketCopy, BucketEntry, BucketInfo};
pub use space::{Bucket, BucketSpace, BucketSpaceRepo, DistributorBucketSpace};
