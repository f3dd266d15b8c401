use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::repo::FixedTypeRepo;
use crate::types::datatype::TypeIdx;
use crate::types::document_id::DocumentId;
use crate::types::error::DecodeResult;
use crate::types::field::Field;
use crate::types::value::{FieldValue, StructValue};

/// Document type payload: content struct, inheritance and field metadata.
///
/// `fields` is the resolved visible field set, i.e. the content struct's fields
/// after inheritance.
#[derive(Debug, Clone)]
pub struct DocumentType {
    pub(crate) idx: TypeIdx,
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) content_struct: TypeIdx,
    pub(crate) inherits: Vec<TypeIdx>,
    pub(crate) fields: BTreeMap<String, Field>,
    pub(crate) by_id: HashMap<u32, String>,
    pub(crate) imported_field_names: BTreeSet<String>,
    pub(crate) field_sets: BTreeMap<String, Vec<String>>,
}

impl DocumentType {
    pub(crate) fn new(idx: TypeIdx, id: i32, name: impl Into<String>, content_struct: TypeIdx) -> Self {
        Self {
            idx,
            id,
            name: name.into(),
            content_struct,
            inherits: Vec::new(),
            fields: BTreeMap::new(),
            by_id: HashMap::new(),
            imported_field_names: BTreeSet::new(),
            field_sets: BTreeMap::new(),
        }
    }

    /// Arena handle of this document type
    pub fn idx(&self) -> TypeIdx {
        self.idx
    }

    /// Public numeric id
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Document type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The struct holding this document's fields
    pub fn content_struct(&self) -> TypeIdx {
        self.content_struct
    }

    /// Directly inherited document types
    pub fn inherits(&self) -> &[TypeIdx] {
        &self.inherits
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Field by id
    pub fn field_by_id(&self, id: u32) -> Option<&Field> {
        self.by_id.get(&id).and_then(|name| self.fields.get(name))
    }

    /// Visible fields ordered by name
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Whether `name` is declared as an imported field
    pub fn has_imported_field_name(&self, name: &str) -> bool {
        self.imported_field_names.contains(name)
    }

    /// Declared imported field names
    pub fn imported_field_names(&self) -> impl Iterator<Item = &str> {
        self.imported_field_names.iter().map(String::as_str)
    }

    /// Field names of a named field set
    pub fn field_set(&self, name: &str) -> Option<&[String]> {
        self.field_sets.get(name).map(Vec::as_slice)
    }
}

/// A document: id, type and field values
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    doc_type: TypeIdx,
    fields: StructValue,
}

impl Document {
    /// Empty document of the given type
    pub fn new(doc_type: &DocumentType, id: DocumentId) -> Self {
        Self {
            id,
            doc_type: doc_type.idx(),
            fields: StructValue::new(doc_type.content_struct()),
        }
    }

    pub(crate) fn from_parts(id: DocumentId, doc_type: TypeIdx, fields: StructValue) -> Self {
        Self { id, doc_type, fields }
    }

    /// Document id
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Document type handle
    pub fn doc_type(&self) -> TypeIdx {
        self.doc_type
    }

    /// Field values
    pub fn fields(&self) -> &StructValue {
        &self.fields
    }

    /// Mutable field values
    pub fn fields_mut(&mut self) -> &mut StructValue {
        &mut self.fields
    }

    /// Set a field value
    pub fn set(&mut self, field: &Field, value: impl Into<FieldValue>) {
        self.fields.set(field, value.into());
    }

    /// Field value by name, decoding lazily held fields on the way
    pub fn get(&self, repo: &FixedTypeRepo<'_>, name: &str) -> DecodeResult<Option<FieldValue>> {
        match repo.document_type().field(name) {
            Some(field) => self.fields.get(repo, field),
            None => Ok(None),
        }
    }

    /// Decode every lazily held field
    pub fn materialize(&mut self, repo: &FixedTypeRepo<'_>) -> DecodeResult<()> {
        self.fields.materialize(repo)
    }
}
