//! Document type repository
//!
//! Owns every data type of one configuration generation in an arena. Types
//! point at each other by [`TypeIdx`], so recursive structs and document types
//! referencing each other need no special handling. Immutable once built;
//! share it behind an `Arc`.

use std::collections::HashMap;
use std::path::Path;

use crate::types::annotation::{AnnotationType, AnnotationTypeIdx};
use crate::types::datatype::{DataType, TypeIdx};
use crate::types::document::DocumentType;
use crate::types::error::RepoResult;

mod build;
/// Fluent construction of config records
pub mod builder;
/// Config records
pub mod config;
mod fixed;

pub use builder::{ConfigBuilder, DocTypeBuilder};
pub use config::DocumenttypesConfig;
pub use fixed::FixedTypeRepo;

use build::Builtins;

/// Types visible from one document type: its own declarations plus those of
/// every inherited document type.
#[derive(Debug, Default)]
struct TypeScope {
    by_id: HashMap<i32, TypeIdx>,
    by_name: HashMap<String, TypeIdx>,
    annotations_by_id: HashMap<i32, AnnotationTypeIdx>,
    annotations_by_name: HashMap<String, AnnotationTypeIdx>,
}

/// The resolved type graph of one configuration
#[derive(Debug)]
pub struct DocumentTypeRepo {
    types: Vec<DataType>,
    annotation_types: Vec<AnnotationType>,
    scopes: HashMap<TypeIdx, TypeScope>,
    documents: Vec<TypeIdx>,
    documents_by_name: HashMap<String, TypeIdx>,
    documents_by_id: HashMap<i32, TypeIdx>,
    builtins: Builtins,
    root_doc: DocumentType,
}

impl DocumentTypeRepo {
    /// Build a repo from config records
    pub fn new(config: &DocumenttypesConfig) -> RepoResult<Self> {
        build::build(config)
    }

    /// Load a JSON or TOML config file and build a repo from it
    pub fn from_file(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::new(&DocumenttypesConfig::from_file(path)?)
    }

    /// Data type at an arena position.
    ///
    /// Panics if `idx` was handed out by a different repo.
    pub fn get(&self, idx: TypeIdx) -> &DataType {
        &self.types[idx.index()]
    }

    /// Data type at an arena position, if there is one
    pub fn try_get(&self, idx: TypeIdx) -> Option<&DataType> {
        self.types.get(idx.index())
    }

    /// Annotation type at an arena position, if there is one
    pub fn annotation_type_at(&self, idx: AnnotationTypeIdx) -> Option<&AnnotationType> {
        self.annotation_types.get(idx.0 as usize)
    }

    /// Document type by name
    pub fn document_type(&self, name: &str) -> Option<&DocumentType> {
        self.documents_by_name.get(name).and_then(|idx| self.document_type_at(*idx))
    }

    /// Document type by public id
    pub fn document_type_by_id(&self, id: i32) -> Option<&DocumentType> {
        self.documents_by_id.get(&id).and_then(|idx| self.document_type_at(*idx))
    }

    /// Document type at an arena position
    pub fn document_type_at(&self, idx: TypeIdx) -> Option<&DocumentType> {
        self.try_get(idx).and_then(DataType::as_document)
    }

    /// The builtin `document` type every document type inherits
    pub fn root_document_type(&self) -> &DocumentType {
        &self.root_doc
    }

    /// Number of document types, the builtin root included
    pub fn document_type_count(&self) -> usize {
        self.documents.len()
    }

    /// Visit every document type in declaration order, root first
    pub fn for_each_document_type(&self, visitor: impl FnMut(&DocumentType)) {
        self.document_types().for_each(visitor);
    }

    /// Document types in declaration order, root first
    pub fn document_types(&self) -> impl Iterator<Item = &DocumentType> {
        self.documents.iter().filter_map(|idx| self.document_type_at(*idx))
    }

    /// Data type by id as seen from `doc`
    pub fn data_type(&self, doc: &DocumentType, id: i32) -> Option<&DataType> {
        self.data_type_idx(doc.idx(), id).map(|idx| self.get(idx))
    }

    /// Data type by name as seen from `doc`
    pub fn data_type_by_name(&self, doc: &DocumentType, name: &str) -> Option<&DataType> {
        self.scopes
            .get(&doc.idx())
            .and_then(|scope| scope.by_name.get(name))
            .or_else(|| self.builtins.by_name.get(name))
            .map(|idx| self.get(*idx))
    }

    /// Arena handle of a data type id as seen from the document type at `doc`.
    /// Builtins are visible from everywhere.
    pub fn data_type_idx(&self, doc: TypeIdx, id: i32) -> Option<TypeIdx> {
        self.scopes
            .get(&doc)
            .and_then(|scope| scope.by_id.get(&id))
            .or_else(|| self.builtins.by_id.get(&id))
            .copied()
    }

    /// Annotation type by id as seen from `doc`
    pub fn annotation_type(&self, doc: &DocumentType, id: i32) -> Option<&AnnotationType> {
        self.annotation_type_idx(doc.idx(), id)
            .and_then(|idx| self.annotation_type_at(idx))
    }

    /// Annotation type by name as seen from `doc`
    pub fn annotation_type_by_name(&self, doc: &DocumentType, name: &str) -> Option<&AnnotationType> {
        self.scopes
            .get(&doc.idx())
            .and_then(|scope| scope.annotations_by_name.get(name))
            .or_else(|| self.builtins.annotations_by_name.get(name))
            .and_then(|idx| self.annotation_type_at(*idx))
    }

    fn annotation_type_idx(&self, doc: TypeIdx, id: i32) -> Option<AnnotationTypeIdx> {
        self.scopes
            .get(&doc)
            .and_then(|scope| scope.annotations_by_id.get(&id))
            .or_else(|| self.builtins.annotations_by_id.get(&id))
            .copied()
    }

    /// Codec view fixed on one document type. Falls back to the root
    /// document type when `doc` is not a document type.
    pub fn fixed(&self, doc: TypeIdx) -> FixedTypeRepo<'_> {
        let doc_type = self.document_type_at(doc).unwrap_or(&self.root_doc);
        FixedTypeRepo::new(self, doc_type)
    }

    /// Codec view fixed on a document type looked up by name
    pub fn fixed_by_name(&self, name: &str) -> Option<FixedTypeRepo<'_>> {
        self.document_type(name).map(|doc| FixedTypeRepo::new(self, doc))
    }
}

impl Default for DocumentTypeRepo {
    /// A repo holding only the builtin types
    fn default() -> Self {
        build::builtin_repo()
    }
}

#[cfg(test)]
mod tests;
