//! System monitoring
//!
//! Prometheus metrics for maintenance and merge outcomes.

pub mod metrics;
