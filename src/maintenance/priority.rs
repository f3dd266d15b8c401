use std::fmt;

use crate::bucket::Bucket;

/// How urgently a bucket needs maintenance, least urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum MaintenancePriority {
    /// Nothing to do; never stored in a priority database
    #[default]
    NoMaintenanceNeeded,
    /// Very low
    VeryLow,
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Very high
    VeryHigh,
    /// Highest
    Highest,
}

impl MaintenancePriority {
    /// Whether anything must be done
    pub fn requires_maintenance(self) -> bool {
        self != MaintenancePriority::NoMaintenanceNeeded
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenancePriority::NoMaintenanceNeeded => "no_maintenance_needed",
            MaintenancePriority::VeryLow => "very_low",
            MaintenancePriority::Low => "low",
            MaintenancePriority::Medium => "medium",
            MaintenancePriority::High => "high",
            MaintenancePriority::VeryHigh => "very_high",
            MaintenancePriority::Highest => "highest",
        }
    }
}

impl fmt::Display for MaintenancePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of operation a bucket needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaintenanceType {
    /// Nothing
    #[default]
    None,
    /// Bring copies in sync and onto their ideal nodes
    MergeBucket,
    /// Drop surplus copies
    DeleteBucket,
}

impl MaintenanceType {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceType::None => "none",
            MaintenanceType::MergeBucket => "merge_bucket",
            MaintenanceType::DeleteBucket => "delete_bucket",
        }
    }
}

/// Classification of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenancePriorityAndType {
    /// Urgency
    pub priority: MaintenancePriority,
    /// What to do
    pub maintenance_type: MaintenanceType,
}

impl MaintenancePriorityAndType {
    /// Create a classification
    pub fn new(priority: MaintenancePriority, maintenance_type: MaintenanceType) -> Self {
        Self { priority, maintenance_type }
    }

    /// The "nothing to do" classification
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether anything must be done
    pub fn requires_maintenance(&self) -> bool {
        self.priority.requires_maintenance()
    }
}

/// A bucket and its current maintenance priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioritizedBucket {
    /// The bucket
    pub bucket: Bucket,
    /// Its priority
    pub priority: MaintenancePriority,
}

impl PrioritizedBucket {
    /// Create a prioritized bucket
    pub fn new(bucket: Bucket, priority: MaintenancePriority) -> Self {
        Self { bucket, priority }
    }
}

impl fmt::Display for PrioritizedBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pri {}", self.bucket, self.priority)
    }
}
