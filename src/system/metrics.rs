//! Metrics collection for docgrid
//!
//! Every metric group registers on a caller supplied [`Registry`]. The process
//! wide registry and [`Metrics::global`] exist for binaries that want one;
//! components themselves are always handed their metric groups explicitly.

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, register_int_gauge_with_registry,
    Histogram, IntCounter, IntGauge, Opts, Registry,
};

use crate::core::error::Result;
use crate::maintenance::OperationTypeCounts;

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static GLOBAL: OnceCell<Metrics> = OnceCell::new();

/// Outcome counters for one class of distributor operation
#[derive(Debug)]
pub struct OperationMetrics {
    /// Operations that completed successfully
    pub ok: IntCounter,
    /// Operations that failed
    pub failed: IntCounter,
    /// Operations refused because something else held the bucket or node
    pub blocked: IntCounter,
    /// Failures caused by a busy storage node
    pub throttled: IntCounter,
    /// Merges abandoned because a source-only copy changed underneath them
    pub source_only_copy_changed: IntCounter,
    /// Deletes of source-only copies that failed
    pub source_only_copy_delete_failed: IntCounter,
    /// Deletes of source-only copies that could not be sent
    pub source_only_copy_delete_blocked: IntCounter,
}

/// Maintenance scan and scheduling metrics
#[derive(Debug)]
pub struct MaintenanceMetrics {
    /// Buckets needing a merge, as of the last finished pass
    pub pending_merges: IntGauge,
    /// Buckets needing a delete, as of the last finished pass
    pub pending_deletes: IntGauge,
    /// Buckets scanned
    pub buckets_scanned: IntCounter,
    /// Finished scan passes
    pub scan_passes: IntCounter,
    /// Operations handed out by the scheduler
    pub operations_started: IntCounter,
    /// Time spent per scheduler tick
    pub tick_duration: Histogram,
}

/// All docgrid metric groups
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Merge operation outcomes
    pub merge: Arc<OperationMetrics>,
    /// Remove-bucket operation outcomes
    pub remove_bucket: Arc<OperationMetrics>,
    /// Maintenance scanner and scheduler
    pub maintenance: Arc<MaintenanceMetrics>,
}

impl Metrics {
    /// Register every metric group on `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            merge: Arc::new(OperationMetrics::new(registry, "merge_bucket")?),
            remove_bucket: Arc::new(OperationMetrics::new(registry, "remove_bucket")?),
            maintenance: Arc::new(MaintenanceMetrics::new(registry)?),
        })
    }

    /// The global metrics instance, once [`init_registry`] has run
    pub fn global() -> Option<&'static Metrics> {
        GLOBAL.get()
    }
}

fn operation_counter(registry: &Registry, operation: &str, outcome: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(format!("docgrid_operation_{}_total", outcome), help).const_label("operation", operation);
    Ok(register_int_counter_with_registry!(opts, registry)?)
}

impl OperationMetrics {
    /// Register counters labelled with `operation` on `registry`
    pub fn new(registry: &Registry, operation: &str) -> Result<Self> {
        Ok(Self {
            ok: operation_counter(registry, operation, "ok", "Operations that completed successfully")?,
            failed: operation_counter(registry, operation, "failed", "Operations that failed")?,
            blocked: operation_counter(registry, operation, "blocked", "Operations blocked by pending work")?,
            throttled: operation_counter(registry, operation, "throttled", "Operations failed by busy nodes")?,
            source_only_copy_changed: operation_counter(
                registry,
                operation,
                "source_only_copy_changed",
                "Merges aborted because a source-only copy changed",
            )?,
            source_only_copy_delete_failed: operation_counter(
                registry,
                operation,
                "source_only_copy_delete_failed",
                "Failed deletes of source-only copies",
            )?,
            source_only_copy_delete_blocked: operation_counter(
                registry,
                operation,
                "source_only_copy_delete_blocked",
                "Blocked deletes of source-only copies",
            )?,
        })
    }
}

impl MaintenanceMetrics {
    /// Register maintenance metrics on `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            pending_merges: register_int_gauge_with_registry!(
                "docgrid_maintenance_pending_merges",
                "Buckets needing a merge",
                registry
            )?,
            pending_deletes: register_int_gauge_with_registry!(
                "docgrid_maintenance_pending_deletes",
                "Buckets needing a delete",
                registry
            )?,
            buckets_scanned: register_int_counter_with_registry!(
                "docgrid_maintenance_buckets_scanned_total",
                "Buckets scanned by the maintenance scanner",
                registry
            )?,
            scan_passes: register_int_counter_with_registry!(
                "docgrid_maintenance_scan_passes_total",
                "Completed maintenance scan passes",
                registry
            )?,
            operations_started: register_int_counter_with_registry!(
                "docgrid_maintenance_operations_started_total",
                "Maintenance operations started",
                registry
            )?,
            tick_duration: register_histogram_with_registry!(
                "docgrid_maintenance_tick_duration_seconds",
                "Duration of maintenance scheduler ticks in seconds",
                vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5],
                registry
            )?,
        })
    }

    /// Publish the results of a finished scan pass
    pub fn record_pass(&self, scanned: u64, pending: &OperationTypeCounts) {
        self.buckets_scanned.inc_by(scanned);
        self.scan_passes.inc();
        self.pending_merges.set(pending.merge_bucket as i64);
        self.pending_deletes.set(pending.delete_bucket as i64);
    }
}

/// Timer for measuring operation duration with automatic histogram recording
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    /// Start a new timer
    pub fn start(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    /// Record the elapsed time and consume the timer
    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Register the global metrics on the global registry.
///
/// Safe to call more than once; later calls return the first instance.
pub fn init_registry() -> Result<&'static Metrics> {
    GLOBAL.get_or_try_init(|| Metrics::new(registry()))
}

/// The global Prometheus registry
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Render a registry in the Prometheus text exposition format
pub fn encode(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    encoder.encode_to_string(&registry.gather()).unwrap_or_default()
}

/// Render the global registry
pub fn collect_metrics() -> String {
    encode(registry())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_classes_share_names_with_labels() {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        metrics.merge.source_only_copy_changed.inc();
        metrics.remove_bucket.ok.inc_by(2);

        let text = encode(&registry);
        assert!(text.contains(r#"docgrid_operation_source_only_copy_changed_total{operation="merge_bucket"} 1"#));
        assert!(text.contains(r#"docgrid_operation_ok_total{operation="remove_bucket"} 2"#));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        MaintenanceMetrics::new(&registry).unwrap();
        assert!(matches!(MaintenanceMetrics::new(&registry), Err(crate::Error::Metrics(_))));
    }

    #[test]
    fn test_record_pass() {
        let metrics = MaintenanceMetrics::new(&Registry::new()).unwrap();
        let pending = OperationTypeCounts { merge_bucket: 3, delete_bucket: 1 };
        metrics.record_pass(10, &pending);
        metrics.record_pass(5, &OperationTypeCounts::default());
        assert_eq!(metrics.buckets_scanned.get(), 15);
        assert_eq!(metrics.scan_passes.get(), 2);
        assert_eq!(metrics.pending_merges.get(), 0);
    }

    #[test]
    fn test_global_init_is_idempotent() {
        let first = init_registry().unwrap() as *const Metrics;
        let second = init_registry().unwrap() as *const Metrics;
        assert_eq!(first, second);
        assert!(Metrics::global().is_some());
        assert!(collect_metrics().contains("docgrid_maintenance_scan_passes_total"));
    }

    #[test]
    fn test_timer_records_sample() {
        let metrics = MaintenanceMetrics::new(&Registry::new()).unwrap();
        Timer::start(metrics.tick_duration.clone()).finish();
        assert_eq!(metrics.tick_duration.get_sample_count(), 1);
    }
}
