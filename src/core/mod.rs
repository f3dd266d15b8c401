//! Core foundations
//!
//! Error handling and configuration shared by every distributor component.

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::Config;
pub use error::{Error, Result};
