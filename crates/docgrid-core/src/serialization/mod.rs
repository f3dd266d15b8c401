//! Binary document serialization, version 8.
//!
//! All integers are big-endian. A document is an envelope (version, length,
//! id, content code, type name) around its content struct; structs carry a
//! field-info table and an optionally lz4-compressed field buffer.

pub mod compression;
pub mod deserializer;
pub mod reader;
pub mod serializer;
mod span_tree;
pub mod tensor;
pub mod varint;

pub use compression::CompressionType;
pub use deserializer::{decode_field_value, decode_field_value_with, DocumentDeserializer};
pub use reader::ByteReader;
pub use serializer::{encode_field_value, DocumentSerializer, SerializerOptions};
pub use tensor::{DenseTensorCodec, TensorCodec};

#[cfg(test)]
mod tests;
