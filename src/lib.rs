//! # Docgrid
//!
//! Distributor side of the docgrid document store: documents map to buckets,
//! buckets are replicated over storage nodes, and a maintenance scanner keeps
//! the replicas where the ideal distribution wants them by scheduling merges
//! and deletes. The document model and binary codec live in `docgrid_core`.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod bucket;
pub mod distribution;
pub mod maintenance;
pub mod operation;
pub mod system;

use std::sync::Arc;

pub use docgrid_core;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Error, Result};
use docgrid_core::DocumentTypeRepo;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging and metrics from configuration
pub fn init(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.logging.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };
    installed.map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    if config.metrics.enable_prometheus {
        system::metrics::init_registry()?;
    }

    Ok(())
}

/// Build the document type repo named by the configuration.
///
/// Without a configured file only the builtin types are available.
pub fn load_repo(config: &Config) -> Result<Arc<DocumentTypeRepo>> {
    let repo = match &config.document.documenttypes {
        Some(path) => {
            tracing::info!("Loading document types from {}", path.display());
            DocumentTypeRepo::from_file(path)?
        }
        None => DocumentTypeRepo::default(),
    };
    tracing::debug!("Document type repo holds {} document types", repo.document_type_count());
    Ok(Arc::new(repo))
}
