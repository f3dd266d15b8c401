//! Document deserialization.
//!
//! The envelope and the struct headers are parsed eagerly. Field values stay
//! in the (decompressed) struct buffer and are decoded when first asked for.

use bytes::Bytes;

use crate::constants::{CONTENT_HAS_BODY, CONTENT_HAS_HEADER, SERIALIZATION_VERSION, STRING_HAS_SPAN_TREES};
use crate::repo::{DocumentTypeRepo, FixedTypeRepo};
use crate::serialization::compression::{self, CompressionType};
use crate::serialization::reader::ByteReader;
use crate::serialization::span_tree;
use crate::serialization::tensor::{TensorCodec, DENSE_TENSOR_CODEC};
use crate::serialization::varint::{read_1_2_4, read_1_4, read_2_4_8};
use crate::types::datatype::{DataTypeKind, PrimitiveKind, TypeIdx};
use crate::types::document::Document;
use crate::types::document_id::DocumentId;
use crate::types::error::{DecodeError, DecodeResult};
use crate::types::value::{
    FieldValue, LazyEntry, LazyFields, MapValue, StringValue, StructValue, WeightedSetValue,
};
use crate::{log_debug, log_trace, log_warn};

/// Reads serialized documents against a repo
pub struct DocumentDeserializer<'r> {
    repo: &'r DocumentTypeRepo,
    tensor_codec: &'r dyn TensorCodec,
}

impl<'r> DocumentDeserializer<'r> {
    /// Deserializer using the dense tensor codec
    pub fn new(repo: &'r DocumentTypeRepo) -> Self {
        Self { repo, tensor_codec: &DENSE_TENSOR_CODEC }
    }

    /// Use another tensor codec
    pub fn with_tensor_codec(mut self, codec: &'r dyn TensorCodec) -> Self {
        self.tensor_codec = codec;
        self
    }

    /// Decode one document that fills the whole buffer
    pub fn deserialize(&self, buf: impl Into<Bytes>) -> DecodeResult<Document> {
        let mut r = ByteReader::new(buf);
        let total = r.remaining();
        let doc = read_document(&mut r, self.repo, self.tensor_codec)?;
        if !r.is_empty() {
            return Err(DecodeError::length_mismatch("document buffer", total, total - r.remaining()));
        }
        Ok(doc)
    }

    /// Decode one document from the front of `r`, leaving the rest unread
    pub fn read(&self, r: &mut ByteReader) -> DecodeResult<Document> {
        read_document(r, self.repo, self.tensor_codec)
    }

    /// Value of a document field by name, decoded with this deserializer's tensor codec
    pub fn field(&self, doc: &Document, name: &str) -> DecodeResult<Option<FieldValue>> {
        let repo = self.repo.fixed(doc.doc_type());
        match repo.document_type().field(name) {
            Some(field) => doc.fields().get_with(&repo, self.tensor_codec, field),
            None => Ok(None),
        }
    }
}

/// Decode a single encoded field value that must fill `bytes` exactly
pub fn decode_field_value(repo: &FixedTypeRepo<'_>, type_idx: TypeIdx, bytes: Bytes) -> DecodeResult<FieldValue> {
    decode_field_value_with(repo, &DENSE_TENSOR_CODEC, type_idx, bytes)
}

/// [`decode_field_value`] with an explicit tensor codec
pub fn decode_field_value_with(
    repo: &FixedTypeRepo<'_>,
    tensor_codec: &dyn TensorCodec,
    type_idx: TypeIdx,
    bytes: Bytes,
) -> DecodeResult<FieldValue> {
    let size = bytes.len();
    let mut r = ByteReader::new(bytes);
    let value = ValueDecoder { repo: *repo, tensor_codec }.read_value(&mut r, type_idx)?;
    if !r.is_empty() {
        return Err(DecodeError::length_mismatch("field value", size, size - r.remaining()));
    }
    Ok(value)
}

pub(crate) fn read_document(
    r: &mut ByteReader,
    repo: &DocumentTypeRepo,
    tensor_codec: &dyn TensorCodec,
) -> DecodeResult<Document> {
    let version = r.read_u16()?;
    if version != SERIALIZATION_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let length = r.read_u32()? as usize;
    r.ensure(length)?;
    let start = r.position();

    let id = DocumentId::parse(&r.read_cstring()?)?;
    let content = r.read_u8()?;
    let type_name = r.read_cstring()?;
    let _type_version = r.read_u16()?;
    let doc_type = repo
        .document_type(&type_name)
        .ok_or_else(|| DecodeError::UnknownDocumentType(type_name.clone()))?;
    log_trace!("Decoding document {} of type {} ({} bytes)", id, type_name, length);

    let decoder = ValueDecoder { repo: FixedTypeRepo::new(repo, doc_type), tensor_codec };
    let mut fields = StructValue::new(doc_type.content_struct());
    if content & CONTENT_HAS_HEADER != 0 {
        decoder.read_struct_into(r, &mut fields)?;
    }
    if content & CONTENT_HAS_BODY != 0 {
        decoder.read_struct_into(r, &mut fields)?;
    }

    let consumed = r.position() - start;
    if consumed != length {
        return Err(DecodeError::length_mismatch("document", length, consumed));
    }
    Ok(Document::from_parts(id, doc_type.idx(), fields))
}

/// Decodes values of one document type
#[derive(Clone, Copy)]
pub(crate) struct ValueDecoder<'a> {
    pub(crate) repo: FixedTypeRepo<'a>,
    pub(crate) tensor_codec: &'a dyn TensorCodec,
}

impl<'a> ValueDecoder<'a> {
    pub(crate) fn read_value(&self, r: &mut ByteReader, type_idx: TypeIdx) -> DecodeResult<FieldValue> {
        let data_type = self.repo.get(type_idx);
        let value = match data_type.kind() {
            DataTypeKind::Primitive(kind) => self.read_primitive(r, *kind)?,
            DataTypeKind::Array { element } => {
                let count = read_1_2_4(r)? as usize;
                let mut items = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    items.push(self.read_value(r, *element)?);
                }
                FieldValue::Array(items)
            }
            DataTypeKind::Map { key, value } => {
                let count = read_1_2_4(r)? as usize;
                let mut map = MapValue::new();
                for _ in 0..count {
                    let k = self.read_value(r, *key)?;
                    let v = self.read_value(r, *value)?;
                    map.insert(k, v);
                }
                FieldValue::Map(map)
            }
            DataTypeKind::WeightedSet { element, .. } => FieldValue::WeightedSet(self.read_weighted_set(r, *element)?),
            DataTypeKind::Struct(_) => {
                let mut value = StructValue::new(type_idx);
                self.read_struct_into(r, &mut value)?;
                FieldValue::Struct(value)
            }
            DataTypeKind::Document(_) => {
                let doc = read_document(r, self.repo.repo(), self.tensor_codec)?;
                FieldValue::Document(Box::new(doc))
            }
            DataTypeKind::DocumentReference { .. } => {
                let has_id = r.read_u8()? != 0;
                let id = if has_id { Some(DocumentId::parse(&r.read_cstring()?)?) } else { None };
                FieldValue::Reference(id)
            }
            DataTypeKind::Tensor { spec } => self.read_tensor(r, spec)?,
            DataTypeKind::AnnotationReference { .. } => FieldValue::AnnotationReference(read_1_2_4(r)?),
        };
        Ok(value)
    }

    fn read_primitive(&self, r: &mut ByteReader, kind: PrimitiveKind) -> DecodeResult<FieldValue> {
        let value = match kind {
            PrimitiveKind::Bool => FieldValue::Bool(r.read_u8()? != 0),
            PrimitiveKind::Byte => FieldValue::Byte(r.read_i8()?),
            PrimitiveKind::Short => FieldValue::Short(r.read_i16()?),
            PrimitiveKind::Int => FieldValue::Int(r.read_i32()?),
            PrimitiveKind::Long => FieldValue::Long(r.read_i64()?),
            PrimitiveKind::Float => FieldValue::Float(r.read_f32()?),
            PrimitiveKind::Double => FieldValue::Double(r.read_f64()?),
            PrimitiveKind::Raw => {
                let len = r.read_u32()? as usize;
                FieldValue::Raw(r.read_bytes(len)?)
            }
            PrimitiveKind::String | PrimitiveKind::Uri => FieldValue::String(self.read_string(r)?),
        };
        Ok(value)
    }

    pub(crate) fn read_string(&self, r: &mut ByteReader) -> DecodeResult<StringValue> {
        let coding = r.read_u8()?;
        let text = read_string_bytes(r)?;
        let mut value = StringValue::new(text);
        if coding & STRING_HAS_SPAN_TREES != 0 {
            let block_size = r.read_u32()? as usize;
            let mut block = r.sub_reader(block_size)?;
            value.span_trees = span_tree::read_span_trees(&mut block, self)?;
            if !block.is_empty() {
                return Err(DecodeError::length_mismatch("span tree block", block_size, block_size - block.remaining()));
            }
        }
        Ok(value)
    }

    fn read_weighted_set(&self, r: &mut ByteReader, element: TypeIdx) -> DecodeResult<WeightedSetValue> {
        let _element_type_id = r.read_u32()?;
        let count = read_1_2_4(r)? as usize;
        let mut set = WeightedSetValue::new();
        for _ in 0..count {
            let size = r.read_u32()? as usize;
            let start = r.position();
            let key = self.read_value(r, element)?;
            let weight = r.read_i32()?;
            let consumed = r.position() - start;
            if consumed != size {
                return Err(DecodeError::length_mismatch("weighted set element", size, consumed));
            }
            set.insert(key, weight);
        }
        Ok(set)
    }

    fn read_tensor(&self, r: &mut ByteReader, spec: &str) -> DecodeResult<FieldValue> {
        let len = read_1_4(r)? as usize;
        if len == 0 {
            return Ok(FieldValue::Tensor(None));
        }
        let mut sub = r.sub_reader(len)?;
        let tensor = self.tensor_codec.decode(spec, &mut sub).map_err(DecodeError::Tensor)?;
        if !sub.is_empty() {
            return Err(DecodeError::Tensor(format!(
                "{} bytes left over after decoding {} byte tensor",
                sub.remaining(),
                len
            )));
        }
        Ok(FieldValue::Tensor(Some(tensor)))
    }

    /// Read a struct header and its field data into `target`.
    ///
    /// An empty target keeps the data undecoded. A target that already holds
    /// fields (a second chunk of a legacy document) gets every field of the
    /// new chunk decoded and copied in; fields that fail to decode are skipped.
    pub(crate) fn read_struct_into(&self, r: &mut ByteReader, target: &mut StructValue) -> DecodeResult<()> {
        let data_size = r.read_u32()? as usize;
        let compression = CompressionType::from_code(r.read_u8()?)?;
        let uncompressed_size = match compression {
            CompressionType::None => data_size,
            CompressionType::Lz4 => read_2_4_8(r)? as usize,
        };

        let count = read_1_2_4(r)? as usize;
        let mut entries = Vec::with_capacity(count.min(r.remaining()));
        let mut covered: usize = 0;
        for _ in 0..count {
            let id = read_1_2_4(r)?;
            let size = read_2_4_8(r)? as usize;
            let offset = covered;
            covered = covered.checked_add(size).ok_or(DecodeError::FieldTableOverflow {
                covered: usize::MAX,
                available: uncompressed_size,
            })?;
            entries.push(LazyEntry { id, offset, size });
        }
        if covered > uncompressed_size {
            return Err(DecodeError::FieldTableOverflow { covered, available: uncompressed_size });
        }

        let data = r.read_bytes(data_size)?;
        let buffer = match compression {
            CompressionType::None => data,
            kind => Bytes::from(compression::decompress(kind, &data, uncompressed_size)?),
        };
        let lazy = LazyFields { buffer, entries };

        if target.is_empty() {
            target.set_lazy(lazy);
            return Ok(());
        }
        self.merge_legacy_chunk(target, &lazy);
        Ok(())
    }

    fn merge_legacy_chunk(&self, target: &mut StructValue, chunk: &LazyFields) {
        let Some(struct_type) = self.repo.get(target.type_idx()).as_struct() else {
            log_warn!("Struct chunk for non-struct type {}", self.repo.get(target.type_idx()).name());
            return;
        };
        for entry in &chunk.entries {
            let Some(field) = struct_type.field_by_id(entry.id) else {
                log_debug!("Ignoring unknown field id {} in legacy struct chunk", entry.id);
                continue;
            };
            let mut sub = ByteReader::new(chunk.slice(entry));
            match self.read_value(&mut sub, field.data_type()) {
                Ok(value) if sub.is_empty() => target.insert_by_id(entry.id, value),
                Ok(_) => log_warn!(
                    "Skipping field '{}' in legacy struct chunk: {} trailing bytes",
                    field.name(),
                    sub.remaining()
                ),
                Err(e) => log_warn!("Skipping field '{}' in legacy struct chunk: {}", field.name(), e),
            }
        }
    }
}

/// 1-4 length (NUL included) followed by the bytes and the NUL
pub(crate) fn read_string_bytes(r: &mut ByteReader) -> DecodeResult<String> {
    let len = read_1_4(r)? as usize;
    if len == 0 {
        return Err(DecodeError::ZeroStringLength);
    }
    let bytes = r.read_bytes(len)?;
    if bytes[len - 1] != 0 {
        return Err(DecodeError::UnterminatedString);
    }
    std::str::from_utf8(&bytes[..len - 1])
        .map(str::to_string)
        .map_err(|_| DecodeError::InvalidUtf8)
}
