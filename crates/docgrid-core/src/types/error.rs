//! Error types for the document model
//!
//! Repo construction, decoding and encoding each get their own enum so callers
//! can tell a broken config apart from a corrupt buffer.

use thiserror::Error;

/// Result alias for repo construction
pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// Result alias for decoding
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Result alias for encoding
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Errors raised while building a [`crate::DocumentTypeRepo`]
#[derive(Error, Debug)]
pub enum RepoError {
    /// A reference points at something that was never declared
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// The config declares the same thing twice with different meaning
    #[error("Illegal config: {0}")]
    IllegalConfig(String),

    /// The config file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl RepoError {
    /// Create an illegal argument error
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Self::IllegalArgument(msg.into())
    }

    /// Create an illegal config error
    pub fn illegal_config(msg: impl Into<String>) -> Self {
        Self::IllegalConfig(msg.into())
    }

    /// Create a config loading error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors raised while deserializing documents and field values.
///
/// Any of these aborts decoding of the enclosing document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Buffer ended before a read could complete
    #[error("Unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Serialization version other than the supported one
    #[error("Unrecognized serialization version {0}")]
    UnsupportedVersion(u16),

    /// A declared length did not match what was actually there
    #[error("Length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// What was being measured
        context: &'static str,
        /// Declared length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Struct declared a compression type the codec cannot handle
    #[error("Unsupported compression type {0}")]
    UnknownCompression(u8),

    /// Decompression itself failed
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Field-info table points past the struct buffer
    #[error("Field table overflow: fields cover {covered} bytes but buffer holds {available}")]
    FieldTableOverflow {
        /// Sum of all field sizes
        covered: usize,
        /// Uncompressed buffer extent
        available: usize,
    },

    /// String with length prefix zero (the prefix always counts the NUL)
    #[error("Invalid zero string length")]
    ZeroStringLength,

    /// String bytes are not UTF-8
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    /// Last byte covered by a string length prefix is not NUL
    #[error("String is not NUL terminated")]
    UnterminatedString,

    /// Envelope names a document type the repo does not know
    #[error("Unknown document type '{0}'")]
    UnknownDocumentType(String),

    /// Type id not visible from the current document type
    #[error("Unknown data type {0}")]
    UnknownDataType(i32),

    /// Span node type byte not recognized
    #[error("Unknown span node type {0}")]
    UnknownSpanNodeType(u8),

    /// Annotation record is inconsistent with the span tree or its type
    #[error("Bad annotation: {0}")]
    BadAnnotation(String),

    /// Tensor codec rejected the payload
    #[error("Tensor decode failed: {0}")]
    Tensor(String),

    /// Document id string did not parse
    #[error("Invalid document id '{0}'")]
    InvalidDocumentId(String),

    /// Value does not fit the data type it is decoded as
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}

impl DecodeError {
    /// Create an end-of-buffer error
    pub fn eof(needed: usize, remaining: usize) -> Self {
        Self::UnexpectedEof { needed, remaining }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { context, expected, actual }
    }

    /// Create a bad annotation error
    pub fn bad_annotation(msg: impl Into<String>) -> Self {
        Self::BadAnnotation(msg.into())
    }
}

/// Errors raised while serializing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// Integer does not fit the variable-length scheme
    #[error("Value {value} out of range for {scheme} encoding")]
    OutOfRange {
        /// Offending value
        value: u64,
        /// Encoding scheme name
        scheme: &'static str,
    },

    /// Field value does not match its declared data type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Lazily held field could not be decoded for re-encoding
    #[error("Failed to decode lazy field: {0}")]
    Lazy(#[from] DecodeError),

    /// Tensor codec rejected the value
    #[error("Tensor encode failed: {0}")]
    Tensor(String),
}

impl EncodeError {
    /// Create a type mismatch error
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }
}
