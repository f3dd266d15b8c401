//! Bucket maintenance
//!
//! One maintenance pass walks every bucket database with the
//! [`SimpleMaintenanceScanner`], classifies each bucket and records the result
//! in a [`BucketPriorityDatabase`]. The [`MaintenanceScheduler`] then drains
//! that database, most urgent first, into operation starters.

pub mod generator;
pub mod node_stats;
pub mod priority;
pub mod priority_db;
pub mod scanner;
pub mod scheduler;

pub use generator::{IdealStatePriorityGenerator, MaintenancePriorityGenerator};
pub use node_stats::{NodeMaintenanceStats, NodeMaintenanceStatsTracker, OperationTypeCounts, PendingMaintenanceStats};
pub use priority::{MaintenancePriority, MaintenancePriorityAndType, MaintenanceType, PrioritizedBucket};
pub use priority_db::{BucketPriorityDatabase, SimpleBucketPriorityDatabase};
pub use scanner::{ScanResult, SimpleMaintenanceScanner};
pub use scheduler::{MaintenanceScheduler, OperationStarter};
