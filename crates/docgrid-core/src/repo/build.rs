//! Two-phase repo construction.
//!
//! Phase one hands every declared type an arena slot keyed by its config
//! `idx`. Phase two links references between slots, after which inheritance
//! is resolved and the per-document lookup scopes are filled.

use std::collections::{HashMap, HashSet};

use crate::constants::{
    ANNOTATION_TERM_ID, ANNOTATION_TOKEN_TYPE_ID, MAX_FIELD_ID, ROOT_DOCUMENT_NAME, TYPE_DOCUMENT,
    TYPE_STRING, TYPE_TAG, TYPE_TENSOR, TYPE_INT,
};
use crate::types::annotation::{AnnotationType, AnnotationTypeIdx};
use crate::types::datatype::{name_hash, DataType, DataTypeKind, PrimitiveKind, TypeIdx};
use crate::types::document::DocumentType;
use crate::types::error::{RepoError, RepoResult};
use crate::types::field::{field_id_from_name, Field, StructType};
use crate::{log_debug, log_info};

use super::config::{
    AnnotationRefConfig, AnnotationTypeConfig, ArrayTypeConfig, DoctypeConfig, DocumentRefConfig,
    DocumenttypesConfig, MapTypeConfig, StructTypeConfig, TensorTypeConfig, WsetTypeConfig, NO_ID,
};
use super::{DocumentTypeRepo, TypeScope};

/// Containers nested deeper than this are treated as a reference cycle
const MAX_TYPE_NESTING: usize = 64;

const ROOT_HEADER_NAME: &str = "document.header";

/// Types every repo has, visible from every document type
#[derive(Debug, Clone)]
pub(super) struct Builtins {
    pub(super) root: TypeIdx,
    pub(super) by_id: HashMap<i32, TypeIdx>,
    pub(super) by_name: HashMap<String, TypeIdx>,
    pub(super) annotations_by_id: HashMap<i32, AnnotationTypeIdx>,
    pub(super) annotations_by_name: HashMap<String, AnnotationTypeIdx>,
}

fn push(types: &mut Vec<DataType>, builtins: &mut Builtins, t: DataType, global: bool) -> TypeIdx {
    let idx = TypeIdx(types.len() as u32);
    if global {
        builtins.by_id.insert(t.id(), idx);
        builtins.by_name.insert(t.name().to_string(), idx);
    }
    types.push(t);
    idx
}

fn builtin_types() -> (Vec<DataType>, Vec<AnnotationType>, Builtins, DocumentType) {
    let mut types = Vec::new();
    let mut builtins = Builtins {
        root: TypeIdx(0),
        by_id: HashMap::new(),
        by_name: HashMap::new(),
        annotations_by_id: HashMap::new(),
        annotations_by_name: HashMap::new(),
    };

    let mut string = TypeIdx(0);
    let mut int = TypeIdx(0);
    for (kind, id, name) in PrimitiveKind::ALL {
        let idx = push(&mut types, &mut builtins, DataType::new(id, name, DataTypeKind::Primitive(kind)), true);
        match id {
            TYPE_STRING => string = idx,
            TYPE_INT => int = idx,
            _ => {}
        }
    }
    let tag = DataTypeKind::WeightedSet { element: string, remove_if_zero: true, create_if_nonexistent: true };
    push(&mut types, &mut builtins, DataType::new(TYPE_TAG, "tag", tag), true);
    let tensor = DataTypeKind::Tensor { spec: "tensor".into() };
    push(&mut types, &mut builtins, DataType::new(TYPE_TENSOR, "tensor", tensor), true);

    let header = push(
        &mut types,
        &mut builtins,
        DataType::new(name_hash(ROOT_HEADER_NAME), ROOT_HEADER_NAME, DataTypeKind::Struct(StructType::default())),
        false,
    );
    let root = TypeIdx(types.len() as u32);
    let root_doc = DocumentType::new(root, TYPE_DOCUMENT, ROOT_DOCUMENT_NAME, header);
    push(
        &mut types,
        &mut builtins,
        DataType::new(TYPE_DOCUMENT, ROOT_DOCUMENT_NAME, DataTypeKind::Document(root_doc.clone())),
        true,
    );
    builtins.root = root;

    let annotations = vec![
        AnnotationType { id: ANNOTATION_TERM_ID, name: "term".into(), data_type: Some(string), inherits: Vec::new() },
        AnnotationType { id: ANNOTATION_TOKEN_TYPE_ID, name: "token_type".into(), data_type: Some(int), inherits: Vec::new() },
    ];
    for (pos, annotation) in annotations.iter().enumerate() {
        let idx = AnnotationTypeIdx(pos as u32);
        builtins.annotations_by_id.insert(annotation.id, idx);
        builtins.annotations_by_name.insert(annotation.name.clone(), idx);
    }

    (types, annotations, builtins, root_doc)
}

/// Repo with builtins only
pub(super) fn builtin_repo() -> DocumentTypeRepo {
    let (types, annotation_types, builtins, root_doc) = builtin_types();
    let root = builtins.root;
    DocumentTypeRepo {
        types,
        annotation_types,
        scopes: HashMap::new(),
        documents: vec![root],
        documents_by_name: HashMap::from([(ROOT_DOCUMENT_NAME.to_string(), root)]),
        documents_by_id: HashMap::from([(TYPE_DOCUMENT, root)]),
        builtins,
        root_doc,
    }
}

/// Build a repo from config records
pub(super) fn build(config: &DocumenttypesConfig) -> RepoResult<DocumentTypeRepo> {
    let mut builder = Builder::new(config);
    builder.allocate()?;
    builder.link()?;
    let repo = builder.finish()?;
    log_info!(
        "Built document type repo: {} document types, {} data types, {} annotation types",
        repo.documents.len(),
        repo.types.len(),
        repo.annotation_types.len()
    );
    Ok(repo)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Type(TypeIdx),
    Annotation(AnnotationTypeIdx),
}

#[derive(Clone, Copy)]
enum Decl<'c> {
    Document(&'c DoctypeConfig),
    Struct(&'c StructTypeConfig),
    Array(&'c ArrayTypeConfig),
    Map(&'c MapTypeConfig),
    WeightedSet(&'c WsetTypeConfig),
    AnnotationRef(&'c AnnotationRefConfig),
    DocumentRef(&'c DocumentRefConfig),
    Tensor(&'c TensorTypeConfig),
}

struct Pending<'c> {
    owner: usize,
    decl: Decl<'c>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Fresh,
    InProgress,
    Done,
}

struct Builder<'c> {
    config: &'c DocumenttypesConfig,
    types: Vec<Option<DataType>>,
    pending: Vec<Option<Pending<'c>>>,
    annotation_types: Vec<Option<AnnotationType>>,
    annotation_names: Vec<String>,
    pending_annotations: Vec<(AnnotationTypeIdx, usize, &'c AnnotationTypeConfig)>,
    slots: HashMap<i32, Slot>,
    doc_slots: Vec<TypeIdx>,
    builtins: Builtins,
    root_doc: DocumentType,
    struct_parents: Vec<(TypeIdx, TypeIdx)>,
}

impl<'c> Builder<'c> {
    fn new(config: &'c DocumenttypesConfig) -> Self {
        let (types, annotations, builtins, root_doc) = builtin_types();
        let pending = types.iter().map(|_| None).collect();
        let annotation_names = annotations.iter().map(|a| a.name.clone()).collect();
        Self {
            config,
            types: types.into_iter().map(Some).collect(),
            pending,
            annotation_types: annotations.into_iter().map(Some).collect(),
            annotation_names,
            pending_annotations: Vec::new(),
            slots: HashMap::new(),
            doc_slots: Vec::new(),
            builtins,
            root_doc,
            struct_parents: Vec::new(),
        }
    }

    fn bind(&mut self, idx: i32, slot: Slot) -> RepoResult<()> {
        if self.slots.insert(idx, slot).is_some() {
            return Err(RepoError::illegal_config(format!("Type idx {} is declared more than once", idx)));
        }
        Ok(())
    }

    fn push_pending(&mut self, owner: usize, decl: Decl<'c>) -> TypeIdx {
        let idx = TypeIdx(self.types.len() as u32);
        self.types.push(None);
        self.pending.push(Some(Pending { owner, decl }));
        idx
    }

    /// Phase one: an arena slot for every declared type
    fn allocate(&mut self) -> RepoResult<()> {
        let config = self.config;
        for (owner, doc) in config.doctype.iter().enumerate() {
            let doc_slot = if doc.name == ROOT_DOCUMENT_NAME {
                self.builtins.root
            } else {
                self.push_pending(owner, Decl::Document(doc))
            };
            self.bind(doc.idx, Slot::Type(doc_slot))?;
            self.doc_slots.push(doc_slot);

            for primitive in &doc.primitivetype {
                let idx = self.builtins.by_name.get(&primitive.name).copied().ok_or_else(|| {
                    RepoError::illegal_argument(format!(
                        "Unknown builtin type '{}' in document type '{}'",
                        primitive.name, doc.name
                    ))
                })?;
                self.bind(primitive.idx, Slot::Type(idx))?;
            }
            for s in &doc.structtype {
                let idx = self.push_pending(owner, Decl::Struct(s));
                self.bind(s.idx, Slot::Type(idx))?;
            }
            for a in &doc.arraytype {
                let idx = self.push_pending(owner, Decl::Array(a));
                self.bind(a.idx, Slot::Type(idx))?;
            }
            for m in &doc.maptype {
                let idx = self.push_pending(owner, Decl::Map(m));
                self.bind(m.idx, Slot::Type(idx))?;
            }
            for w in &doc.wsettype {
                let idx = self.push_pending(owner, Decl::WeightedSet(w));
                self.bind(w.idx, Slot::Type(idx))?;
            }
            for r in &doc.annotationref {
                let idx = self.push_pending(owner, Decl::AnnotationRef(r));
                self.bind(r.idx, Slot::Type(idx))?;
            }
            for r in &doc.documentref {
                let idx = self.push_pending(owner, Decl::DocumentRef(r));
                self.bind(r.idx, Slot::Type(idx))?;
            }
            for t in &doc.tensortype {
                let idx = self.push_pending(owner, Decl::Tensor(t));
                self.bind(t.idx, Slot::Type(idx))?;
            }
            for a in &doc.annotationtype {
                let id = configured_or_hashed(a.internalid, &a.name);
                let builtin = self.builtins.annotations_by_id.get(&id).copied();
                let slot = match builtin {
                    Some(idx) if self.annotation_names[idx.0 as usize] == a.name => idx,
                    Some(idx) => {
                        return Err(RepoError::illegal_config(format!(
                            "Annotation type '{}' reuses id {} of builtin '{}'",
                            a.name, id, self.annotation_names[idx.0 as usize]
                        )))
                    }
                    None => {
                        let idx = AnnotationTypeIdx(self.annotation_types.len() as u32);
                        self.annotation_types.push(None);
                        self.annotation_names.push(a.name.clone());
                        self.pending_annotations.push((idx, owner, a));
                        idx
                    }
                };
                self.bind(a.idx, Slot::Annotation(slot))?;
            }
        }
        log_debug!("Allocated {} type slots for {} config entries", self.types.len(), config.doctype.len());
        Ok(())
    }

    fn resolve(&self, idx: i32, context: &str) -> RepoResult<TypeIdx> {
        match self.slots.get(&idx) {
            Some(Slot::Type(t)) => Ok(*t),
            Some(Slot::Annotation(_)) => Err(RepoError::illegal_argument(format!(
                "{} references annotation type idx {} where a data type is expected",
                context, idx
            ))),
            None => Err(RepoError::illegal_argument(format!("{} references unknown type idx {}", context, idx))),
        }
    }

    fn resolve_annotation(&self, idx: i32, context: &str) -> RepoResult<AnnotationTypeIdx> {
        match self.slots.get(&idx) {
            Some(Slot::Annotation(a)) => Ok(*a),
            _ => Err(RepoError::illegal_argument(format!(
                "{} references unknown annotation type idx {}",
                context, idx
            ))),
        }
    }

    fn is_document(&self, idx: TypeIdx) -> bool {
        idx == self.builtins.root
            || matches!(
                self.pending.get(idx.index()),
                Some(Some(Pending { decl: Decl::Document(_), .. }))
            )
    }

    fn is_struct(&self, idx: TypeIdx) -> bool {
        match self.pending.get(idx.index()) {
            Some(Some(p)) => matches!(p.decl, Decl::Struct(_)),
            _ => matches!(self.types.get(idx.index()), Some(Some(t)) if t.as_struct().is_some()),
        }
    }

    fn content_struct_of(&self, doc: TypeIdx) -> RepoResult<TypeIdx> {
        match self.pending.get(doc.index()) {
            Some(Some(Pending { decl: Decl::Document(d), .. })) => {
                self.resolve(d.contentstruct, &format!("Document type '{}'", d.name))
            }
            _ => Ok(self.root_doc.content_struct()),
        }
    }

    /// Name of the type in a slot; containers are named after their elements
    fn name_of(&self, idx: TypeIdx, depth: usize) -> RepoResult<String> {
        if depth > MAX_TYPE_NESTING {
            return Err(RepoError::illegal_argument(format!("Type at slot {} nests into itself", idx)));
        }
        if let Some(Some(t)) = self.types.get(idx.index()) {
            return Ok(t.name().to_string());
        }
        let Some(Some(pending)) = self.pending.get(idx.index()) else {
            return Err(RepoError::illegal_argument(format!("Type slot {} is empty", idx)));
        };
        let name = match pending.decl {
            Decl::Document(d) => d.name.clone(),
            Decl::Struct(s) => s.name.clone(),
            Decl::Tensor(t) => t.detailedtype.clone(),
            Decl::Array(a) => {
                let element = self.resolve(a.elementtype, "Array type")?;
                format!("Array<{}>", self.name_of(element, depth + 1)?)
            }
            Decl::Map(m) => {
                let key = self.resolve(m.keytype, "Map type")?;
                let value = self.resolve(m.valuetype, "Map type")?;
                format!("Map<{},{}>", self.name_of(key, depth + 1)?, self.name_of(value, depth + 1)?)
            }
            Decl::WeightedSet(w) => {
                let element = self.resolve(w.elementtype, "Weighted set type")?;
                format!("WeightedSet<{}>", self.name_of(element, depth + 1)?)
            }
            Decl::AnnotationRef(r) => {
                let annotation = self.resolve_annotation(r.annotationtype, "Annotation reference type")?;
                format!("AnnotationReference<{}>", self.annotation_names[annotation.0 as usize])
            }
            Decl::DocumentRef(r) => {
                let target = self.resolve(r.targettype, "Document reference type")?;
                format!("Reference<{}>", self.name_of(target, depth + 1)?)
            }
        };
        Ok(name)
    }

    /// Phase two: turn every pending declaration into a linked data type
    fn link(&mut self) -> RepoResult<()> {
        for pos in 0..self.pending.len() {
            let decl = match &self.pending[pos] {
                Some(pending) => pending.decl,
                None => continue,
            };
            let idx = TypeIdx(pos as u32);
            let data_type = match decl {
                Decl::Document(d) => self.link_document(idx, d)?,
                Decl::Struct(s) => self.link_struct(s)?,
                Decl::Array(a) => {
                    let element = self.resolve(a.elementtype, "Array type")?;
                    let name = self.name_of(idx, 0)?;
                    DataType::new(configured_or_hashed(a.internalid, &name), name, DataTypeKind::Array { element })
                }
                Decl::Map(m) => {
                    let key = self.resolve(m.keytype, "Map type")?;
                    let value = self.resolve(m.valuetype, "Map type")?;
                    let name = self.name_of(idx, 0)?;
                    DataType::new(configured_or_hashed(m.internalid, &name), name, DataTypeKind::Map { key, value })
                }
                Decl::WeightedSet(w) => {
                    let element = self.resolve(w.elementtype, "Weighted set type")?;
                    let name = self.name_of(idx, 0)?;
                    let kind = DataTypeKind::WeightedSet {
                        element,
                        remove_if_zero: w.removeifzero,
                        create_if_nonexistent: w.createifnonexistent,
                    };
                    DataType::new(configured_or_hashed(w.internalid, &name), name, kind)
                }
                Decl::AnnotationRef(r) => {
                    let annotation_type = self.resolve_annotation(r.annotationtype, "Annotation reference type")?;
                    let name = self.name_of(idx, 0)?;
                    DataType::new(name_hash(&name), name, DataTypeKind::AnnotationReference { annotation_type })
                }
                Decl::DocumentRef(r) => {
                    let target = self.resolve(r.targettype, "Document reference type")?;
                    if !self.is_document(target) {
                        return Err(RepoError::illegal_argument(format!(
                            "Document reference idx {} targets idx {} which is not a document type",
                            r.idx, r.targettype
                        )));
                    }
                    let name = self.name_of(idx, 0)?;
                    DataType::new(configured_or_hashed(r.internalid, &name), name, DataTypeKind::DocumentReference { target })
                }
                Decl::Tensor(t) => DataType::new(
                    name_hash(&t.detailedtype),
                    t.detailedtype.clone(),
                    DataTypeKind::Tensor { spec: t.detailedtype.clone() },
                ),
            };
            self.types[pos] = Some(data_type);
        }

        for i in 0..self.pending_annotations.len() {
            let (idx, _, a) = self.pending_annotations[i];
            let context = format!("Annotation type '{}'", a.name);
            let data_type = match a.datatype {
                NO_ID => None,
                datatype => Some(self.resolve(datatype, &context)?),
            };
            let inherits = a
                .inherits
                .iter()
                .map(|parent| self.resolve_annotation(*parent, &context))
                .collect::<RepoResult<Vec<_>>>()?;
            self.annotation_types[idx.0 as usize] = Some(AnnotationType {
                id: configured_or_hashed(a.internalid, &a.name),
                name: a.name.clone(),
                data_type,
                inherits,
            });
        }
        Ok(())
    }

    fn link_struct(&self, s: &StructTypeConfig) -> RepoResult<DataType> {
        let context = format!("Struct '{}'", s.name);
        let mut own_fields = Vec::with_capacity(s.field.len());
        for f in &s.field {
            let id = match f.internalid {
                NO_ID => field_id_from_name(&f.name),
                id if id >= 0 && id as u32 <= MAX_FIELD_ID => id as u32,
                id => {
                    return Err(RepoError::illegal_config(format!(
                        "Field '{}' in struct '{}' has id {} outside the field id range",
                        f.name, s.name, id
                    )))
                }
            };
            let data_type = self.resolve(f.type_idx, &format!("Field '{}' of struct '{}'", f.name, s.name))?;
            own_fields.push(Field::new(f.name.clone(), id, data_type));
        }
        let mut struct_type = StructType::with_fields(own_fields);
        for parent in &s.inherits {
            let parent = self.resolve(*parent, &context)?;
            if !self.is_struct(parent) {
                return Err(RepoError::illegal_argument(format!("{} inherits a type that is not a struct", context)));
            }
            struct_type.inherits.push(parent);
        }
        Ok(DataType::new(
            configured_or_hashed(s.internalid, &s.name),
            s.name.clone(),
            DataTypeKind::Struct(struct_type),
        ))
    }

    fn link_document(&mut self, idx: TypeIdx, d: &DoctypeConfig) -> RepoResult<DataType> {
        let context = format!("Document type '{}'", d.name);
        let content_struct = self.resolve(d.contentstruct, &context)?;
        if !self.is_struct(content_struct) {
            return Err(RepoError::illegal_argument(format!("{} has a content struct that is not a struct", context)));
        }

        let id = configured_or_hashed(d.internalid, &d.name);
        let mut doc = DocumentType::new(idx, id, d.name.clone(), content_struct);
        doc.inherits.push(self.builtins.root);
        for parent in &d.inherits {
            let parent = self.resolve(*parent, &context)?;
            if !self.is_document(parent) {
                return Err(RepoError::illegal_argument(format!("{} inherits a type that is not a document type", context)));
            }
            if parent == self.builtins.root || doc.inherits.contains(&parent) {
                continue;
            }
            let parent_struct = self.content_struct_of(parent)?;
            if parent_struct != content_struct {
                self.struct_parents.push((content_struct, parent_struct));
            }
            doc.inherits.push(parent);
        }
        doc.imported_field_names = d.importedfield.iter().cloned().collect();
        doc.field_sets = d.fieldsets.clone();
        Ok(DataType::new(id, d.name.clone(), DataTypeKind::Document(doc)))
    }

    fn finish(self) -> RepoResult<DocumentTypeRepo> {
        let mut types = self
            .types
            .into_iter()
            .enumerate()
            .map(|(pos, t)| t.ok_or_else(|| RepoError::illegal_argument(format!("Type slot #{} was never linked", pos))))
            .collect::<RepoResult<Vec<_>>>()?;
        let annotation_types = self
            .annotation_types
            .into_iter()
            .enumerate()
            .map(|(pos, a)| a.ok_or_else(|| RepoError::illegal_argument(format!("Annotation slot {} was never linked", pos))))
            .collect::<RepoResult<Vec<_>>>()?;

        for (child, parent) in &self.struct_parents {
            if let DataTypeKind::Struct(s) = &mut types[child.index()].kind {
                if !s.inherits.contains(parent) {
                    s.inherits.push(*parent);
                }
            }
        }

        let mut visits = vec![Visit::Fresh; types.len()];
        for pos in 0..types.len() {
            if types[pos].as_struct().is_some() {
                resolve_struct(&mut types, TypeIdx(pos as u32), &mut visits)?;
            }
        }

        let mut documents = vec![self.builtins.root];
        documents.extend(self.doc_slots.iter().copied().filter(|d| *d != self.builtins.root));
        for doc in &documents {
            let content = match types[doc.index()].as_document() {
                Some(d) => d.content_struct(),
                None => continue,
            };
            let resolved = types[content.index()].as_struct().cloned().unwrap_or_default();
            if let DataTypeKind::Document(d) = &mut types[doc.index()].kind {
                d.fields = resolved.fields;
                d.by_id = resolved.by_id;
            }
        }

        let mut documents_by_name = HashMap::new();
        let mut documents_by_id = HashMap::new();
        for doc in &documents {
            let t = &types[doc.index()];
            if let Some(existing) = documents_by_name.insert(t.name().to_string(), *doc) {
                if existing != *doc {
                    return Err(RepoError::illegal_config(format!("Document type '{}' is declared twice", t.name())));
                }
            }
            if let Some(existing) = documents_by_id.insert(t.id(), *doc) {
                if existing != *doc {
                    return Err(RepoError::illegal_config(format!(
                        "Document types '{}' and '{}' share id {}",
                        types[existing.index()].name(),
                        t.name(),
                        t.id()
                    )));
                }
            }
        }

        // Own declarations per document type
        let mut own: HashMap<TypeIdx, TypeScope> = HashMap::new();
        for (pos, pending) in self.pending.iter().enumerate() {
            let Some(pending) = pending else { continue };
            let doc = self.doc_slots[pending.owner];
            let scope = own.entry(doc).or_default();
            register_type(scope, &types, &self.builtins, TypeIdx(pos as u32), &types[doc.index()])?;
        }
        for (idx, owner, _) in &self.pending_annotations {
            let doc = self.doc_slots[*owner];
            let scope = own.entry(doc).or_default();
            register_annotation(scope, &annotation_types, *idx, types[doc.index()].name())?;
        }

        // Merge in the declarations of every ancestor
        let mut scopes = HashMap::new();
        for doc in &documents {
            let mut scope = TypeScope::default();
            for ancestor in ancestors(&types, *doc) {
                let Some(inherited) = own.get(&ancestor) else { continue };
                let doc_type = &types[doc.index()];
                let mut inherited_types: Vec<TypeIdx> = inherited.by_id.values().copied().collect();
                inherited_types.sort();
                for idx in inherited_types {
                    register_type(&mut scope, &types, &self.builtins, idx, doc_type)?;
                }
                let mut inherited_annotations: Vec<AnnotationTypeIdx> =
                    inherited.annotations_by_id.values().copied().collect();
                inherited_annotations.sort_by_key(|a| a.0);
                for idx in inherited_annotations {
                    register_annotation(&mut scope, &annotation_types, idx, doc_type.name())?;
                }
            }
            scopes.insert(*doc, scope);
        }

        Ok(DocumentTypeRepo {
            types,
            annotation_types,
            scopes,
            documents,
            documents_by_name,
            documents_by_id,
            builtins: self.builtins,
            root_doc: self.root_doc,
        })
    }
}

fn configured_or_hashed(internal_id: i32, name: &str) -> i32 {
    if internal_id == NO_ID {
        name_hash(name)
    } else {
        internal_id
    }
}

/// Resolve the visible field set of a struct, parents first
fn resolve_struct(types: &mut [DataType], idx: TypeIdx, visits: &mut [Visit]) -> RepoResult<()> {
    match visits[idx.index()] {
        Visit::Done => return Ok(()),
        Visit::InProgress => {
            return Err(RepoError::illegal_argument(format!(
                "Struct '{}' inherits from itself",
                types[idx.index()].name()
            )))
        }
        Visit::Fresh => {}
    }
    visits[idx.index()] = Visit::InProgress;

    let (own_fields, inherits) = match types[idx.index()].as_struct() {
        Some(s) => (s.own_fields.clone(), s.inherits.clone()),
        None => {
            return Err(RepoError::illegal_argument(format!(
                "'{}' is inherited as a struct but is not one",
                types[idx.index()].name()
            )))
        }
    };
    for parent in &inherits {
        resolve_struct(types, *parent, visits)?;
    }

    let name = types[idx.index()].name().to_string();
    let mut resolved = StructType::with_fields(own_fields.clone());
    resolved.inherits = inherits.clone();
    let inherited = inherits
        .iter()
        .filter_map(|parent| types[parent.index()].as_struct())
        .flat_map(|s| s.fields().cloned())
        .collect::<Vec<_>>();
    for field in own_fields.into_iter().chain(inherited) {
        let field_name = field.name().to_string();
        resolved.add_resolved(field).map_err(|existing| {
            RepoError::illegal_argument(format!(
                "Field '{}' in struct '{}' conflicts with existing field '{}' (id {})",
                field_name,
                name,
                existing.name(),
                existing.id()
            ))
        })?;
    }

    types[idx.index()].kind = DataTypeKind::Struct(resolved);
    visits[idx.index()] = Visit::Done;
    Ok(())
}

/// A document type followed by all its transitive ancestors
fn ancestors(types: &[DataType], doc: TypeIdx) -> Vec<TypeIdx> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![doc];
    while let Some(next) = stack.pop() {
        if !seen.insert(next) {
            continue;
        }
        order.push(next);
        if let Some(d) = types[next.index()].as_document() {
            stack.extend(d.inherits().iter().rev().copied());
        }
    }
    order
}

fn register_type(
    scope: &mut TypeScope,
    types: &[DataType],
    builtins: &Builtins,
    idx: TypeIdx,
    doc: &DataType,
) -> RepoResult<()> {
    let t = &types[idx.index()];
    let conflict = |other: TypeIdx| {
        RepoError::illegal_config(format!(
            "Data type id {} names both '{}' and '{}' in document type '{}'",
            t.id(),
            types[other.index()].name(),
            t.name(),
            doc.name()
        ))
    };
    if let Some(builtin) = builtins.by_id.get(&t.id()) {
        if *builtin != idx && types[builtin.index()] != *t {
            return Err(conflict(*builtin));
        }
    }
    match scope.by_id.get(&t.id()) {
        Some(existing) if *existing == idx || types[existing.index()] == *t => return Ok(()),
        Some(existing) => return Err(conflict(*existing)),
        None => {}
    }
    scope.by_id.insert(t.id(), idx);
    scope.by_name.entry(t.name().to_string()).or_insert(idx);
    Ok(())
}

fn register_annotation(
    scope: &mut TypeScope,
    annotation_types: &[AnnotationType],
    idx: AnnotationTypeIdx,
    doc_name: &str,
) -> RepoResult<()> {
    let a = &annotation_types[idx.0 as usize];
    if let Some(existing) = scope.annotations_by_id.get(&a.id) {
        let other = &annotation_types[existing.0 as usize];
        if *existing != idx && other.name != a.name {
            return Err(RepoError::illegal_config(format!(
                "Annotation type id {} names both '{}' and '{}' in document type '{}'",
                a.id, other.name, a.name, doc_name
            )));
        }
        return Ok(());
    }
    scope.annotations_by_id.insert(a.id, idx);
    scope.annotations_by_name.entry(a.name.clone()).or_insert(idx);
    Ok(())
}
