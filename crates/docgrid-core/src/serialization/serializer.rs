//! Document serialization.
//!
//! Always writes version 8 with a single header chunk. Struct fields go out in
//! ascending id order; fields still held undecoded are copied through as raw
//! bytes.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::constants::{CONTENT_HAS_HEADER, DEFAULT_MIN_COMPRESS_SIZE, SERIALIZATION_VERSION, STRING_HAS_SPAN_TREES};
use crate::log_trace;
use crate::repo::{DocumentTypeRepo, FixedTypeRepo};
use crate::serialization::compression::{self, CompressionType};
use crate::serialization::span_tree;
use crate::serialization::tensor::{TensorCodec, DENSE_TENSOR_CODEC};
use crate::serialization::varint::{write_1_2_4, write_1_4, write_2_4_8};
use crate::types::datatype::{DataTypeKind, PrimitiveKind, TypeIdx};
use crate::types::document::Document;
use crate::types::error::{EncodeError, EncodeResult};
use crate::types::value::{FieldValue, StringValue, StructValue, WeightedSetValue};

/// Serializer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Compression tried on every struct payload
    pub compression: CompressionType,
    /// Payloads below this size are stored uncompressed
    pub min_compress_size: usize,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            min_compress_size: DEFAULT_MIN_COMPRESS_SIZE,
        }
    }
}

/// Writes documents in the version 8 wire format
pub struct DocumentSerializer<'r> {
    repo: &'r DocumentTypeRepo,
    options: SerializerOptions,
    tensor_codec: &'r dyn TensorCodec,
}

impl<'r> DocumentSerializer<'r> {
    /// Serializer with default options and the dense tensor codec
    pub fn new(repo: &'r DocumentTypeRepo) -> Self {
        Self { repo, options: SerializerOptions::default(), tensor_codec: &DENSE_TENSOR_CODEC }
    }

    /// Replace the options
    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Use another tensor codec
    pub fn with_tensor_codec(mut self, codec: &'r dyn TensorCodec) -> Self {
        self.tensor_codec = codec;
        self
    }

    /// Current options
    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Serialize a whole document
    pub fn serialize(&self, doc: &Document) -> EncodeResult<Bytes> {
        let mut out = BytesMut::new();
        self.serialize_into(doc, &mut out)?;
        Ok(out.freeze())
    }

    /// Append a serialized document to `out`
    pub fn serialize_into(&self, doc: &Document, out: &mut BytesMut) -> EncodeResult<()> {
        write_document(out, doc, self.repo, &self.options, self.tensor_codec)
    }

    /// Serialize a single value of `type_idx` as seen from `repo`'s document type
    pub fn serialize_value(&self, repo: &FixedTypeRepo<'_>, type_idx: TypeIdx, value: &FieldValue) -> EncodeResult<Bytes> {
        let encoder = ValueEncoder { repo: *repo, options: &self.options, tensor_codec: self.tensor_codec };
        let mut out = BytesMut::new();
        encoder.write_value(&mut out, type_idx, value)?;
        Ok(out.freeze())
    }
}

/// Encode a single field value with default options
pub fn encode_field_value(repo: &FixedTypeRepo<'_>, type_idx: TypeIdx, value: &FieldValue) -> EncodeResult<Bytes> {
    DocumentSerializer::new(repo.repo()).serialize_value(repo, type_idx, value)
}

fn write_document(
    out: &mut BytesMut,
    doc: &Document,
    repo: &DocumentTypeRepo,
    options: &SerializerOptions,
    tensor_codec: &dyn TensorCodec,
) -> EncodeResult<()> {
    let doc_type = repo
        .document_type_at(doc.doc_type())
        .ok_or_else(|| EncodeError::type_mismatch(format!("{} is not a document type of this repo", doc.doc_type())))?;

    out.put_u16(SERIALIZATION_VERSION);
    let length_at = out.len();
    out.put_u32(0);
    let start = out.len();

    put_cstring(out, doc.id().as_str())?;
    out.put_u8(CONTENT_HAS_HEADER);
    put_cstring(out, doc_type.name())?;
    out.put_u16(0);

    let encoder = ValueEncoder { repo: FixedTypeRepo::new(repo, doc_type), options, tensor_codec };
    encoder.write_struct(out, doc.fields())?;

    let length = len_u32(out.len() - start)?;
    out[length_at..length_at + 4].copy_from_slice(&length.to_be_bytes());
    log_trace!("Encoded document {} of type {} ({} bytes)", doc.id(), doc_type.name(), length);
    Ok(())
}

/// Encodes values of one document type
#[derive(Clone, Copy)]
pub(crate) struct ValueEncoder<'a> {
    pub(crate) repo: FixedTypeRepo<'a>,
    options: &'a SerializerOptions,
    tensor_codec: &'a dyn TensorCodec,
}

impl<'a> ValueEncoder<'a> {
    pub(crate) fn write_value(&self, out: &mut BytesMut, type_idx: TypeIdx, value: &FieldValue) -> EncodeResult<()> {
        let data_type = self.repo.get(type_idx);
        let mismatch = || {
            EncodeError::type_mismatch(format!("cannot write {} value as {}", value.kind_name(), data_type.name()))
        };

        match (data_type.kind(), value) {
            (DataTypeKind::Primitive(kind), _) => {
                if !self.write_primitive(out, *kind, value)? {
                    return Err(mismatch());
                }
            }
            (DataTypeKind::Array { element }, FieldValue::Array(items)) => {
                write_1_2_4(out, len_u32(items.len())?)?;
                for item in items {
                    self.write_value(out, *element, item)?;
                }
            }
            (DataTypeKind::Map { key, value: value_type }, FieldValue::Map(map)) => {
                write_1_2_4(out, len_u32(map.len())?)?;
                for (k, v) in map.iter() {
                    self.write_value(out, *key, k)?;
                    self.write_value(out, *value_type, v)?;
                }
            }
            (DataTypeKind::WeightedSet { element, .. }, FieldValue::WeightedSet(set)) => {
                self.write_weighted_set(out, *element, set)?
            }
            (DataTypeKind::Struct(_), FieldValue::Struct(s)) if s.type_idx() == type_idx => self.write_struct(out, s)?,
            (DataTypeKind::Document(_), FieldValue::Document(doc)) => {
                write_document(out, doc, self.repo.repo(), self.options, self.tensor_codec)?
            }
            (DataTypeKind::DocumentReference { .. }, FieldValue::Reference(id)) => match id {
                Some(id) => {
                    out.put_u8(1);
                    put_cstring(out, id.as_str())?;
                }
                None => out.put_u8(0),
            },
            (DataTypeKind::Tensor { .. }, FieldValue::Tensor(tensor)) => match tensor {
                Some(tensor) => {
                    let mut payload = BytesMut::new();
                    self.tensor_codec.encode(tensor, &mut payload).map_err(EncodeError::Tensor)?;
                    write_1_4(out, len_u32(payload.len())?)?;
                    out.extend_from_slice(&payload);
                }
                None => write_1_4(out, 0)?,
            },
            (DataTypeKind::AnnotationReference { .. }, FieldValue::AnnotationReference(index)) => {
                write_1_2_4(out, *index)?
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// `false` when the value does not fit the primitive kind
    fn write_primitive(&self, out: &mut BytesMut, kind: PrimitiveKind, value: &FieldValue) -> EncodeResult<bool> {
        match (kind, value) {
            (PrimitiveKind::Bool, FieldValue::Bool(v)) => out.put_u8(u8::from(*v)),
            (PrimitiveKind::Byte, FieldValue::Byte(v)) => out.put_i8(*v),
            (PrimitiveKind::Short, FieldValue::Short(v)) => out.put_i16(*v),
            (PrimitiveKind::Int, FieldValue::Int(v)) => out.put_i32(*v),
            (PrimitiveKind::Long, FieldValue::Long(v)) => out.put_i64(*v),
            (PrimitiveKind::Float, FieldValue::Float(v)) => out.put_f32(*v),
            (PrimitiveKind::Double, FieldValue::Double(v)) => out.put_f64(*v),
            (PrimitiveKind::Raw, FieldValue::Raw(bytes)) => {
                out.put_u32(len_u32(bytes.len())?);
                out.extend_from_slice(bytes);
            }
            (PrimitiveKind::String | PrimitiveKind::Uri, FieldValue::String(s)) => self.write_string(out, s)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn write_string(&self, out: &mut BytesMut, value: &StringValue) -> EncodeResult<()> {
        if value.span_trees.is_empty() {
            out.put_u8(0);
            return write_string_bytes(out, &value.text);
        }
        out.put_u8(STRING_HAS_SPAN_TREES);
        write_string_bytes(out, &value.text)?;
        let mut block = BytesMut::new();
        span_tree::write_span_trees(&mut block, &value.span_trees, self)?;
        out.put_u32(len_u32(block.len())?);
        out.extend_from_slice(&block);
        Ok(())
    }

    /// Element size prefixes count the element and its weight
    fn write_weighted_set(&self, out: &mut BytesMut, element: TypeIdx, set: &WeightedSetValue) -> EncodeResult<()> {
        out.put_i32(self.repo.get(element).id());
        write_1_2_4(out, len_u32(set.len())?)?;
        let mut item = BytesMut::new();
        for (key, weight) in set.iter() {
            item.clear();
            self.write_value(&mut item, element, key)?;
            out.put_u32(len_u32(item.len() + 4)?);
            out.extend_from_slice(&item);
            out.put_i32(*weight);
        }
        Ok(())
    }

    pub(crate) fn write_struct(&self, out: &mut BytesMut, value: &StructValue) -> EncodeResult<()> {
        let data_type = self.repo.get(value.type_idx());
        let struct_type = data_type
            .as_struct()
            .ok_or_else(|| EncodeError::type_mismatch(format!("{} is not a struct type", data_type.name())))?;

        let mut data = BytesMut::new();
        let mut table = Vec::with_capacity(value.len());
        for id in value.field_ids() {
            let start = data.len();
            if let Some(field_value) = value.materialized().get(&id) {
                let field = struct_type.field_by_id(id).ok_or_else(|| {
                    EncodeError::type_mismatch(format!("field id {} is not part of struct {}", id, data_type.name()))
                })?;
                self.write_value(&mut data, field.data_type(), field_value)?;
            } else if let Some(lazy) = value.lazy() {
                if let Some(entry) = lazy.entries.iter().find(|e| e.id == id) {
                    data.extend_from_slice(&lazy.slice(entry));
                }
            }
            table.push((id, data.len() - start));
        }

        let compressed = match self.options.compression {
            CompressionType::None => None,
            kind if data.len() >= self.options.min_compress_size => compression::compress(kind, &data),
            _ => None,
        };

        match &compressed {
            Some(payload) => {
                out.put_u32(len_u32(payload.len())?);
                out.put_u8(self.options.compression.code());
                write_2_4_8(out, data.len() as u64)?;
            }
            None => {
                out.put_u32(len_u32(data.len())?);
                out.put_u8(CompressionType::None.code());
            }
        }
        write_1_2_4(out, len_u32(table.len())?)?;
        for (id, size) in table {
            write_1_2_4(out, id)?;
            write_2_4_8(out, size as u64)?;
        }
        match compressed {
            Some(payload) => out.extend_from_slice(&payload),
            None => out.extend_from_slice(&data),
        }
        Ok(())
    }
}

/// 1-4 length (NUL included) followed by the bytes and a NUL
pub(crate) fn write_string_bytes(out: &mut BytesMut, text: &str) -> EncodeResult<()> {
    write_1_4(out, len_u32(text.len() + 1)?)?;
    out.extend_from_slice(text.as_bytes());
    out.put_u8(0);
    Ok(())
}

pub(crate) fn len_u32(len: usize) -> EncodeResult<u32> {
    u32::try_from(len).map_err(|_| EncodeError::OutOfRange { value: len as u64, scheme: "u32" })
}

fn put_cstring(out: &mut BytesMut, s: &str) -> EncodeResult<()> {
    if s.as_bytes().contains(&0) {
        return Err(EncodeError::type_mismatch(format!("'{}' contains a NUL byte", s.escape_debug())));
    }
    out.extend_from_slice(s.as_bytes());
    out.put_u8(0);
    Ok(())
}
