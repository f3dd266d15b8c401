use std::sync::Arc;

use super::priority::{MaintenancePriority, PrioritizedBucket};
use super::priority_db::BucketPriorityDatabase;
use crate::system::metrics::{MaintenanceMetrics, Timer};

/// Turns a prioritized bucket into a running operation
pub trait OperationStarter {
    /// Try to start maintenance for the bucket; false leaves it queued
    fn start(&mut self, bucket: &PrioritizedBucket) -> bool;
}

/// Drains the priority database into an [`OperationStarter`], most urgent first
pub struct MaintenanceScheduler {
    priority_db: Arc<dyn BucketPriorityDatabase>,
    max_starts_per_tick: usize,
    metrics: Option<Arc<MaintenanceMetrics>>,
}

impl MaintenanceScheduler {
    /// Scheduler starting at most `max_starts_per_tick` operations per tick
    pub fn new(priority_db: Arc<dyn BucketPriorityDatabase>, max_starts_per_tick: usize) -> Self {
        Self {
            priority_db,
            max_starts_per_tick,
            metrics: None,
        }
    }

    /// Record ticks and starts in these metrics
    pub fn with_metrics(mut self, metrics: Arc<MaintenanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Offer queued buckets to the starter; returns how many started.
    /// Started buckets leave the database, refused ones stay for the next tick.
    pub fn tick(&self, starter: &mut dyn OperationStarter) -> usize {
        let timer = self.metrics.as_ref().map(|m| Timer::start(m.tick_duration.clone()));
        let mut started = 0;
        for prioritized in self.priority_db.snapshot() {
            if started >= self.max_starts_per_tick {
                break;
            }
            if !starter.start(&prioritized) {
                tracing::trace!("Could not start maintenance for {}", prioritized);
                continue;
            }
            self.priority_db
                .set_priority(PrioritizedBucket::new(prioritized.bucket, MaintenancePriority::NoMaintenanceNeeded));
            started += 1;
        }
        if let Some(metrics) = &self.metrics {
            metrics.operations_started.inc_by(started as u64);
        }
        if let Some(timer) = timer {
            timer.finish();
        }
        started
    }
}
