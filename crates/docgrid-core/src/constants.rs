//! System constants for the document model and wire format.

/// The one serialization version the codec reads and writes.
pub const SERIALIZATION_VERSION: u16 = 8;

/// Content code bit: header chunk present.
pub const CONTENT_HAS_HEADER: u8 = 0x02;
/// Content code bit: body chunk present.
pub const CONTENT_HAS_BODY: u8 = 0x04;

/// String coding bit: span tree block follows the string bytes.
pub const STRING_HAS_SPAN_TREES: u8 = 0x40;

/// Annotation feature bit: annotation points at a span node.
pub const ANNOTATION_HAS_SPAN_NODE: u8 = 0x01;
/// Annotation feature bit: annotation carries a field value.
pub const ANNOTATION_HAS_VALUE: u8 = 0x02;

// Builtin data type ids
/// int
pub const TYPE_INT: i32 = 0;
/// float
pub const TYPE_FLOAT: i32 = 1;
/// string
pub const TYPE_STRING: i32 = 2;
/// raw
pub const TYPE_RAW: i32 = 3;
/// long
pub const TYPE_LONG: i32 = 4;
/// double
pub const TYPE_DOUBLE: i32 = 5;
/// bool
pub const TYPE_BOOL: i32 = 6;
/// The root document type
pub const TYPE_DOCUMENT: i32 = 8;
/// uri
pub const TYPE_URI: i32 = 10;
/// byte
pub const TYPE_BYTE: i32 = 16;
/// tag (weighted set of string, create-if-nonexistent and remove-if-zero)
pub const TYPE_TAG: i32 = 18;
/// short
pub const TYPE_SHORT: i32 = 19;
/// Untyped tensor
pub const TYPE_TENSOR: i32 = 21;

/// Name of the root document type
pub const ROOT_DOCUMENT_NAME: &str = "document";

/// Builtin annotation type `term`
pub const ANNOTATION_TERM_ID: i32 = 1;
/// Builtin annotation type `token_type`
pub const ANNOTATION_TOKEN_TYPE_ID: i32 = 2;

/// Field ids must fit the 1-2-4 field-info encoding.
pub const MAX_FIELD_ID: u32 = 0x3FFF_FFFF;

/// Structs smaller than this are never compressed by default.
pub const DEFAULT_MIN_COMPRESS_SIZE: usize = 64;
