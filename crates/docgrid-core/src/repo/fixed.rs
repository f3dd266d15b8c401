use crate::types::annotation::AnnotationType;
use crate::types::datatype::{DataType, TypeIdx};
use crate::types::document::DocumentType;

use super::DocumentTypeRepo;

/// A repo view pinned to one document type.
///
/// The codec resolves wire type ids through this view, so ids declared by a
/// different document type stay invisible.
#[derive(Debug, Clone, Copy)]
pub struct FixedTypeRepo<'r> {
    repo: &'r DocumentTypeRepo,
    doc: &'r DocumentType,
}

impl<'r> FixedTypeRepo<'r> {
    /// View of `repo` from `doc`
    pub fn new(repo: &'r DocumentTypeRepo, doc: &'r DocumentType) -> Self {
        Self { repo, doc }
    }

    /// The underlying repo
    pub fn repo(&self) -> &'r DocumentTypeRepo {
        self.repo
    }

    /// The pinned document type
    pub fn document_type(&self) -> &'r DocumentType {
        self.doc
    }

    /// Data type at an arena position
    pub fn get(&self, idx: TypeIdx) -> &'r DataType {
        self.repo.get(idx)
    }

    /// Data type id as seen from the pinned document type
    pub fn data_type(&self, id: i32) -> Option<TypeIdx> {
        self.repo.data_type_idx(self.doc.idx(), id)
    }

    /// Annotation type id as seen from the pinned document type
    pub fn annotation_type(&self, id: i32) -> Option<&'r AnnotationType> {
        self.repo.annotation_type(self.doc, id)
    }

    /// Same repo, pinned to another document type
    pub fn with_document(&self, doc: TypeIdx) -> FixedTypeRepo<'r> {
        self.repo.fixed(doc)
    }
}
