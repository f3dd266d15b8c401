//! # Docgrid Core
//!
//! Document model for the docgrid store: the document type repository built from
//! configuration, field values, and the binary document codec.
//! Nothing in this crate does I/O beyond reading config files.

#![warn(missing_docs)]

/// Logging macros
pub mod core;

/// System constants
pub mod constants;

/// Type definitions: data types, documents, values, annotations
pub mod types;

/// Document type repository built from configuration
pub mod repo;

/// Binary document serialization
pub mod serialization;

// Re-export commonly used items
pub use repo::{DocumentTypeRepo, FixedTypeRepo};
pub use types::{DataType, Document, DocumentId, DocumentType, FieldValue, StructValue, TypeIdx};
pub use types::error::{DecodeError, EncodeError, RepoError};
pub use serialization::{DocumentDeserializer, DocumentSerializer};
