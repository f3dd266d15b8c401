//! Field values
//!
//! One closed sum type covers every value kind the codec knows about; the
//! codec dispatches on it with exhaustive matches.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::log_debug;
use crate::repo::FixedTypeRepo;
use crate::serialization::deserializer::decode_field_value_with;
use crate::serialization::tensor::{TensorCodec, DENSE_TENSOR_CODEC};
use crate::types::annotation::SpanTree;
use crate::types::datatype::TypeIdx;
use crate::types::document::Document;
use crate::types::document_id::DocumentId;
use crate::types::error::DecodeResult;
use crate::types::field::Field;
use crate::types::tensor::Tensor;

/// A field value of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// bool
    Bool(bool),
    /// byte
    Byte(i8),
    /// short
    Short(i16),
    /// int
    Int(i32),
    /// long
    Long(i64),
    /// float
    Float(f32),
    /// double
    Double(f64),
    /// string or uri, with optional span trees
    String(StringValue),
    /// raw bytes
    Raw(Bytes),
    /// array elements
    Array(Vec<FieldValue>),
    /// map entries
    Map(MapValue),
    /// weighted set entries
    WeightedSet(WeightedSetValue),
    /// struct
    Struct(StructValue),
    /// embedded document
    Document(Box<Document>),
    /// reference to another document, possibly unset
    Reference(Option<DocumentId>),
    /// tensor, possibly unset
    Tensor(Option<Tensor>),
    /// index of an annotation in the enclosing span tree
    AnnotationReference(u32),
}

impl FieldValue {
    /// Short kind name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Byte(_) => "byte",
            FieldValue::Short(_) => "short",
            FieldValue::Int(_) => "int",
            FieldValue::Long(_) => "long",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Raw(_) => "raw",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
            FieldValue::WeightedSet(_) => "weightedset",
            FieldValue::Struct(_) => "struct",
            FieldValue::Document(_) => "document",
            FieldValue::Reference(_) => "reference",
            FieldValue::Tensor(_) => "tensor",
            FieldValue::AnnotationReference(_) => "annotationreference",
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(&s.text),
            _ => None,
        }
    }

    /// Decode every lazily held struct inside this value, recursively
    pub fn materialize(&mut self, repo: &FixedTypeRepo<'_>) -> DecodeResult<()> {
        match self {
            FieldValue::Struct(s) => s.materialize(repo),
            FieldValue::Document(doc) => {
                let nested = repo.repo().fixed(doc.doc_type());
                doc.fields_mut().materialize(&nested)
            }
            FieldValue::Array(items) => items.iter_mut().try_for_each(|v| v.materialize(repo)),
            FieldValue::Map(map) => map.entries.iter_mut().try_for_each(|(k, v)| {
                k.materialize(repo)?;
                v.materialize(repo)
            }),
            FieldValue::WeightedSet(set) => {
                set.entries.iter_mut().try_for_each(|(k, _)| k.materialize(repo))
            }
            FieldValue::String(s) => s
                .span_trees
                .iter_mut()
                .flat_map(|tree| tree.annotations.iter_mut())
                .filter_map(|annotation| annotation.value.as_deref_mut())
                .try_for_each(|v| v.materialize(repo)),
            _ => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(StringValue::new(s))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(StringValue::new(s))
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Long(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<StructValue> for FieldValue {
    fn from(v: StructValue) -> Self {
        FieldValue::Struct(v)
    }
}

/// String with its span trees
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringValue {
    /// Text
    pub text: String,
    /// Span trees annotating the text
    pub span_trees: Vec<SpanTree>,
}

impl StringValue {
    /// Plain string
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), span_trees: Vec::new() }
    }

    /// Add a span tree
    pub fn with_span_tree(mut self, tree: SpanTree) -> Self {
        self.span_trees.push(tree);
        self
    }
}

/// Map entries in insertion order with unique keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapValue {
    pub(crate) entries: Vec<(FieldValue, FieldValue)>,
}

impl MapValue {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace
    pub fn insert(&mut self, key: FieldValue, value: FieldValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value for a key
    pub fn get(&self, key: &FieldValue) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(FieldValue, FieldValue)> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Weighted set entries in insertion order with unique keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightedSetValue {
    pub(crate) entries: Vec<(FieldValue, i32)>,
}

impl WeightedSetValue {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the weight of a key
    pub fn insert(&mut self, key: FieldValue, weight: i32) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = weight,
            None => self.entries.push((key, weight)),
        }
    }

    /// Weight of a key
    pub fn weight(&self, key: &FieldValue) -> Option<i32> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, w)| *w)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(FieldValue, i32)> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Location of one encoded field inside a lazily held struct buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LazyEntry {
    pub(crate) id: u32,
    pub(crate) offset: usize,
    pub(crate) size: usize,
}

/// Undecoded struct payload: the field-info table plus the raw field bytes
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LazyFields {
    pub(crate) buffer: Bytes,
    pub(crate) entries: Vec<LazyEntry>,
}

impl LazyFields {
    pub(crate) fn slice(&self, entry: &LazyEntry) -> Bytes {
        self.buffer.slice(entry.offset..entry.offset + entry.size)
    }
}

/// Struct value.
///
/// Fields decoded from the wire stay as raw bytes until asked for; fields set
/// explicitly live in the materialized map. A field id is never in both.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    type_idx: TypeIdx,
    fields: BTreeMap<u32, FieldValue>,
    lazy: Option<LazyFields>,
}

impl StructValue {
    /// Empty struct of the given struct type
    pub fn new(type_idx: TypeIdx) -> Self {
        Self { type_idx, fields: BTreeMap::new(), lazy: None }
    }

    /// Struct type
    pub fn type_idx(&self) -> TypeIdx {
        self.type_idx
    }

    /// Set a field, replacing any lazily held value
    pub fn set(&mut self, field: &Field, value: FieldValue) {
        self.drop_lazy_entry(field.id());
        self.fields.insert(field.id(), value);
    }

    /// Remove a field; returns whether it was present
    pub fn remove(&mut self, field: &Field) -> bool {
        let lazy = self.drop_lazy_entry(field.id());
        self.fields.remove(&field.id()).is_some() || lazy
    }

    /// Whether a field is present, decoded or not
    pub fn has_field(&self, id: u32) -> bool {
        self.fields.contains_key(&id)
            || self.lazy.as_ref().is_some_and(|l| l.entries.iter().any(|e| e.id == id))
    }

    /// Ids of all present fields, ascending
    pub fn field_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.fields.keys().copied().collect();
        if let Some(lazy) = &self.lazy {
            ids.extend(lazy.entries.iter().map(|e| e.id));
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of present fields
    pub fn len(&self) -> usize {
        self.fields.len() + self.lazy.as_ref().map_or(0, |l| l.entries.len())
    }

    /// Whether no field is present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether some fields are still undecoded
    pub fn is_lazy(&self) -> bool {
        self.lazy.as_ref().is_some_and(|l| !l.entries.is_empty())
    }

    /// Value of a field, decoding it from the raw buffer if needed
    pub fn get(&self, repo: &FixedTypeRepo<'_>, field: &Field) -> DecodeResult<Option<FieldValue>> {
        self.get_with(repo, &DENSE_TENSOR_CODEC, field)
    }

    /// [`StructValue::get`] with an explicit tensor codec
    pub fn get_with(
        &self,
        repo: &FixedTypeRepo<'_>,
        tensor_codec: &dyn TensorCodec,
        field: &Field,
    ) -> DecodeResult<Option<FieldValue>> {
        if let Some(value) = self.fields.get(&field.id()) {
            return Ok(Some(value.clone()));
        }
        let Some(lazy) = &self.lazy else { return Ok(None) };
        match lazy.entries.iter().find(|e| e.id == field.id()) {
            Some(entry) => decode_field_value_with(repo, tensor_codec, field.data_type(), lazy.slice(entry)).map(Some),
            None => Ok(None),
        }
    }

    /// Value of a field by name
    pub fn get_by_name(&self, repo: &FixedTypeRepo<'_>, name: &str) -> DecodeResult<Option<FieldValue>> {
        let field = repo
            .repo()
            .get(self.type_idx)
            .as_struct()
            .and_then(|s| s.field(name))
            .cloned();
        match field {
            Some(field) => self.get(repo, &field),
            None => Ok(None),
        }
    }

    /// Decode all lazily held fields into the materialized map, recursively.
    /// Field ids the struct type no longer declares are dropped.
    pub fn materialize(&mut self, repo: &FixedTypeRepo<'_>) -> DecodeResult<()> {
        if let Some(lazy) = self.lazy.take() {
            let struct_type = repo.repo().get(self.type_idx).as_struct().cloned().unwrap_or_default();
            for entry in &lazy.entries {
                let Some(field) = struct_type.field_by_id(entry.id) else {
                    log_debug!("Dropping unknown field id {} while materializing struct", entry.id);
                    continue;
                };
                let value = decode_field_value_with(repo, &DENSE_TENSOR_CODEC, field.data_type(), lazy.slice(entry))?;
                self.fields.insert(entry.id, value);
            }
        }
        self.fields.values_mut().try_for_each(|v| v.materialize(repo))
    }

    /// Explicitly set values by field id
    pub(crate) fn materialized(&self) -> &BTreeMap<u32, FieldValue> {
        &self.fields
    }

    pub(crate) fn insert_by_id(&mut self, id: u32, value: FieldValue) {
        self.drop_lazy_entry(id);
        self.fields.insert(id, value);
    }

    pub(crate) fn lazy(&self) -> Option<&LazyFields> {
        self.lazy.as_ref()
    }

    pub(crate) fn set_lazy(&mut self, lazy: LazyFields) {
        self.lazy = Some(lazy);
    }

    fn drop_lazy_entry(&mut self, id: u32) -> bool {
        match &mut self.lazy {
            Some(lazy) => {
                let before = lazy.entries.len();
                lazy.entries.retain(|e| e.id != id);
                before != lazy.entries.len()
            }
            None => false,
        }
    }
}
