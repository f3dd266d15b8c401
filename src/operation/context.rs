use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::pending::{NodeFeatureRepo, PendingMessageTracker};
use super::sequencer::OperationSequencer;
use crate::bucket::{Bucket, BucketSpaceRepo};
use crate::core::config::{Config, DistributorConfig, PriorityConfig};
use crate::system::metrics::{Metrics, OperationMetrics};

/// Tells running operations whether this distributor still owns a bucket
pub trait OwnershipCheck: Send + Sync {
    /// True when the operation must stop sending and finish
    fn should_abort(&self, bucket: &Bucket) -> bool;
}

/// Ownership check that never aborts
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOwned;

impl OwnershipCheck for AlwaysOwned {
    fn should_abort(&self, _bucket: &Bucket) -> bool {
        false
    }
}

/// Shared state every distributor operation works against
pub struct OperationContext {
    /// Bucket spaces and their databases
    pub spaces: BucketSpaceRepo,
    /// In-flight messages and busy nodes
    pub pending: Arc<PendingMessageTracker>,
    /// Per-bucket exclusivity
    pub sequencer: OperationSequencer,
    /// Advertised node features
    pub features: Arc<NodeFeatureRepo>,
    /// Distributor settings
    pub config: DistributorConfig,
    /// Message priorities per maintenance priority
    pub priorities: PriorityConfig,
    /// Merge outcome counters
    pub merge_metrics: Arc<OperationMetrics>,
    /// Remove-bucket outcome counters
    pub remove_metrics: Arc<OperationMetrics>,
    ownership: Arc<dyn OwnershipCheck>,
    last_timestamp: AtomicU64,
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

impl OperationContext {
    /// Context built from configuration and registered metrics
    pub fn new(spaces: BucketSpaceRepo, config: &Config, metrics: &Metrics) -> Self {
        Self {
            spaces,
            pending: Arc::new(PendingMessageTracker::new(config.distributor.busy_node_duration)),
            sequencer: OperationSequencer::new(),
            features: Arc::new(NodeFeatureRepo::new()),
            config: config.distributor.clone(),
            priorities: config.maintenance.priorities,
            merge_metrics: metrics.merge.clone(),
            remove_metrics: metrics.remove_bucket.clone(),
            ownership: Arc::new(AlwaysOwned),
            last_timestamp: AtomicU64::new(0),
        }
    }

    /// Use a different ownership check
    pub fn with_ownership(mut self, ownership: Arc<dyn OwnershipCheck>) -> Self {
        self.ownership = ownership;
        self
    }

    /// Whether operations on the bucket must stop
    pub fn should_abort(&self, bucket: &Bucket) -> bool {
        self.ownership.should_abort(bucket)
    }

    /// Strictly increasing timestamp in microseconds, never behind the clock
    pub fn unique_timestamp(&self) -> u64 {
        let now = now_micros();
        let previous = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(last.saturating_add(1).max(now)))
            .unwrap_or_default();
        previous.saturating_add(1).max(now)
    }
}
