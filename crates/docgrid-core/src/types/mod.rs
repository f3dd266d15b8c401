//! Type definitions for the document model
//!
//! Data types and the values they describe, grouped by concern.

/// Error types
pub mod error;
/// Data type descriptors and the arena handle
pub mod datatype;
/// Fields and struct types
pub mod field;
/// Document types and documents
pub mod document;
/// Document identifiers
pub mod document_id;
/// Field values
pub mod value;
/// Span trees and annotations
pub mod annotation;
/// Tensor values
pub mod tensor;

// Re-export commonly used types for convenience
pub use datatype::{name_hash, DataType, DataTypeKind, PrimitiveKind, TypeIdx};
pub use field::{field_id_from_name, Field, StructType};
pub use document::{Document, DocumentType};
pub use document_id::{DocumentId, Location};
pub use value::{FieldValue, MapValue, StringValue, StructValue, WeightedSetValue};
pub use annotation::{AlternateSubtree, Annotation, AnnotationType, AnnotationTypeIdx, Span, SpanNode, SpanTree};
pub use tensor::Tensor;
