//! Fluent construction of [`DocumenttypesConfig`] records.
//!
//! Hands out `idx` values automatically and leaves ids unset so they are
//! hashed from names, unless given explicitly.

use std::collections::HashMap;

use crate::types::error::RepoResult;

use super::config::{
    AnnotationRefConfig, AnnotationTypeConfig, ArrayTypeConfig, DoctypeConfig, DocumentRefConfig,
    DocumenttypesConfig, MapTypeConfig, PrimitiveTypeConfig, StructFieldConfig, StructTypeConfig,
    TensorTypeConfig, WsetTypeConfig, NO_ID,
};
use super::DocumentTypeRepo;

/// Builds a document type config one document type at a time
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: DocumenttypesConfig,
    last_idx: i32,
    primitives: HashMap<String, i32>,
}

impl ConfigBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    fn take_idx(&mut self) -> i32 {
        self.last_idx += 1;
        self.last_idx
    }

    /// Add a document type with id `id` and an empty `<name>.header` content struct
    pub fn document(&mut self, name: &str, id: i32) -> DocTypeBuilder<'_> {
        let idx = self.take_idx();
        let header = self.take_idx();
        self.config.doctype.push(DoctypeConfig {
            idx,
            name: name.to_string(),
            internalid: id,
            contentstruct: header,
            structtype: vec![StructTypeConfig {
                idx: header,
                name: format!("{}.header", name),
                internalid: NO_ID,
                inherits: Vec::new(),
                field: Vec::new(),
            }],
            ..Default::default()
        });
        let pos = self.config.doctype.len() - 1;
        DocTypeBuilder { builder: self, pos }
    }

    /// Continue editing a document type added earlier
    pub fn edit(&mut self, name: &str) -> Option<DocTypeBuilder<'_>> {
        let pos = self.config.doctype.iter().position(|d| d.name == name)?;
        Some(DocTypeBuilder { builder: self, pos })
    }

    /// The config records built so far
    pub fn config(&self) -> &DocumenttypesConfig {
        &self.config
    }

    /// Finish and return the config records
    pub fn build(self) -> DocumenttypesConfig {
        self.config
    }

    /// Finish and build a repo from the records
    pub fn into_repo(self) -> RepoResult<DocumentTypeRepo> {
        DocumentTypeRepo::new(&self.config)
    }
}

/// Edits one document type entry of a [`ConfigBuilder`]
#[derive(Debug)]
pub struct DocTypeBuilder<'b> {
    builder: &'b mut ConfigBuilder,
    pos: usize,
}

impl DocTypeBuilder<'_> {
    fn doc(&mut self) -> &mut DoctypeConfig {
        &mut self.builder.config.doctype[self.pos]
    }

    fn header(&mut self) -> &mut StructTypeConfig {
        &mut self.doc().structtype[0]
    }

    /// idx of this document type
    pub fn idx(&self) -> i32 {
        self.builder.config.doctype[self.pos].idx
    }

    /// idx of the content struct
    pub fn header_idx(&self) -> i32 {
        self.builder.config.doctype[self.pos].contentstruct
    }

    /// Set the content struct id
    pub fn header_id(&mut self, id: i32) -> &mut Self {
        self.header().internalid = id;
        self
    }

    /// Add a content field with an id hashed from its name
    pub fn field(&mut self, name: &str, type_idx: i32) -> &mut Self {
        self.field_with_id(name, NO_ID, type_idx)
    }

    /// Add a content field with an explicit id
    pub fn field_with_id(&mut self, name: &str, id: i32, type_idx: i32) -> &mut Self {
        self.header().field.push(StructFieldConfig { name: name.to_string(), internalid: id, type_idx });
        self
    }

    /// Inherit another document type by idx
    pub fn inherits(&mut self, doc_idx: i32) -> &mut Self {
        self.doc().inherits.push(doc_idx);
        self
    }

    /// Declare an imported field name
    pub fn imported_field(&mut self, name: &str) -> &mut Self {
        self.doc().importedfield.push(name.to_string());
        self
    }

    /// Declare a field set
    pub fn field_set(&mut self, name: &str, fields: &[&str]) -> &mut Self {
        let fields = fields.iter().map(|f| f.to_string()).collect();
        self.doc().fieldsets.insert(name.to_string(), fields);
        self
    }

    /// idx bound to a builtin type, declared on first use
    pub fn primitive(&mut self, name: &str) -> i32 {
        if let Some(idx) = self.builder.primitives.get(name) {
            return *idx;
        }
        let idx = self.builder.take_idx();
        self.builder.primitives.insert(name.to_string(), idx);
        self.doc().primitivetype.push(PrimitiveTypeConfig { idx, name: name.to_string() });
        idx
    }

    /// Declare an array type
    pub fn array(&mut self, element: i32) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().arraytype.push(ArrayTypeConfig { idx, elementtype: element, internalid: NO_ID });
        idx
    }

    /// Declare a map type
    pub fn map(&mut self, key: i32, value: i32) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().maptype.push(MapTypeConfig { idx, keytype: key, valuetype: value, internalid: NO_ID });
        idx
    }

    /// Declare a weighted set type
    pub fn weighted_set(&mut self, element: i32, remove_if_zero: bool, create_if_nonexistent: bool) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().wsettype.push(WsetTypeConfig {
            idx,
            elementtype: element,
            removeifzero: remove_if_zero,
            createifnonexistent: create_if_nonexistent,
            internalid: NO_ID,
        });
        idx
    }

    /// Declare a struct type with `(name, type idx)` fields
    pub fn struct_type(&mut self, name: &str, fields: &[(&str, i32)]) -> i32 {
        self.struct_inheriting(name, &[], fields)
    }

    /// Declare a struct type inheriting other structs
    pub fn struct_inheriting(&mut self, name: &str, parents: &[i32], fields: &[(&str, i32)]) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().structtype.push(StructTypeConfig {
            idx,
            name: name.to_string(),
            internalid: NO_ID,
            inherits: parents.to_vec(),
            field: fields
                .iter()
                .map(|(name, type_idx)| StructFieldConfig {
                    name: name.to_string(),
                    internalid: NO_ID,
                    type_idx: *type_idx,
                })
                .collect(),
        });
        idx
    }

    /// Add a field to a struct declared earlier on this document type
    pub fn struct_field(&mut self, struct_idx: i32, name: &str, type_idx: i32) -> &mut Self {
        if let Some(s) = self.doc().structtype.iter_mut().find(|s| s.idx == struct_idx) {
            s.field.push(StructFieldConfig { name: name.to_string(), internalid: NO_ID, type_idx });
        }
        self
    }

    /// Declare a tensor type
    pub fn tensor(&mut self, spec: &str) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().tensortype.push(TensorTypeConfig { idx, detailedtype: spec.to_string() });
        idx
    }

    /// Declare a reference to another document type
    pub fn document_ref(&mut self, target_doc_idx: i32) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().documentref.push(DocumentRefConfig { idx, targettype: target_doc_idx, internalid: NO_ID });
        idx
    }

    /// Declare an annotation type; `data_type` is the payload type idx
    pub fn annotation_type(&mut self, name: &str, id: i32, data_type: Option<i32>) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().annotationtype.push(AnnotationTypeConfig {
            idx,
            name: name.to_string(),
            internalid: id,
            datatype: data_type.unwrap_or(NO_ID),
            inherits: Vec::new(),
        });
        idx
    }

    /// Declare an annotation reference type
    pub fn annotation_ref(&mut self, annotation_idx: i32) -> i32 {
        let idx = self.builder.take_idx();
        self.doc().annotationref.push(AnnotationRefConfig { idx, annotationtype: annotation_idx });
        idx
    }
}
