//! Cluster state and ideal bucket placement

pub mod cluster_state;
pub mod ideal;

pub use cluster_state::{ClusterState, NodeState, State};
pub use ideal::{Distribution, StorageDistribution};
