use super::*;
use crate::constants::{TYPE_DOCUMENT, TYPE_INT, TYPE_STRING};
use crate::types::datatype::DataTypeKind;
use crate::types::error::RepoError;
use super::config::ArrayTypeConfig;

fn test_config() -> ConfigBuilder {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("test", 787121340);
    let string = doc.primitive("string");
    let int = doc.primitive("int");
    doc.header_id(30).field("title", string).field("year", int);
    builder
}

#[test]
fn test_document_type_with_fixed_ids() {
    let repo = test_config().into_repo().unwrap();

    let doc = repo.document_type("test").unwrap();
    assert_eq!(doc.id(), 787121340);
    assert_eq!(repo.get(doc.content_struct()).id(), 30);
    assert_eq!(repo.data_type(doc, 30).map(|t| t.name()), Some("test.header"));
    assert_eq!(repo.document_type_by_id(787121340).map(|d| d.name()), Some("test"));
    assert_eq!(doc.fields().map(|f| f.name()).collect::<Vec<_>>(), vec!["title", "year"]);
}

#[test]
fn test_default_repo_holds_builtins_only() {
    let repo = DocumentTypeRepo::default();
    let root = repo.root_document_type();
    assert_eq!(root.id(), TYPE_DOCUMENT);
    assert_eq!(repo.document_type_count(), 1);
    assert_eq!(repo.data_type(root, TYPE_STRING).map(|t| t.name()), Some("string"));
    assert!(repo.document_type("test").is_none());
    assert!(repo.annotation_type(root, 1).is_some());
}

#[test]
fn test_builtins_visible_from_every_document_type() {
    let repo = test_config().into_repo().unwrap();
    let doc = repo.document_type("test").unwrap();
    assert_eq!(repo.data_type(doc, TYPE_INT).map(|t| t.name()), Some("int"));
    assert_eq!(repo.data_type(doc, TYPE_DOCUMENT).map(|t| t.name()), Some("document"));
    assert_eq!(repo.data_type_by_name(doc, "tag").map(|t| t.id()), Some(18));
    assert_eq!(doc.inherits(), &[repo.root_document_type().idx()]);
}

#[test]
fn test_inheriting_doc_can_redefine_identical_field() {
    let mut builder = ConfigBuilder::new();
    let mut parent = builder.document("parent", 1);
    let string = parent.primitive("string");
    parent.field("title", string);
    let parent_idx = parent.idx();
    let mut child = builder.document("child", 2);
    child.inherits(parent_idx).field("title", string).field("body", string);

    let repo = builder.into_repo().unwrap();
    let child = repo.document_type("child").unwrap();
    assert_eq!(child.fields().count(), 2);
    assert!(child.field("title").is_some());
    assert!(child.inherits().contains(&repo.document_type("parent").unwrap().idx()));
}

#[test]
fn test_conflicting_field_redeclaration_is_rejected() {
    let mut builder = ConfigBuilder::new();
    let mut parent = builder.document("parent", 1);
    let string = parent.primitive("string");
    let int = parent.primitive("int");
    parent.field("title", string);
    let parent_idx = parent.idx();
    builder.document("child", 2).inherits(parent_idx).field("title", int);

    assert!(matches!(builder.into_repo(), Err(RepoError::IllegalArgument(_))));
}

#[test]
fn test_struct_inheritance_merges_fields() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("music", 5);
    let string = doc.primitive("string");
    let int = doc.primitive("int");
    let base = doc.struct_type("base", &[("name", string)]);
    let mid = doc.struct_inheriting("mid", &[base], &[("count", int)]);
    let leaf = doc.struct_inheriting("leaf", &[mid, base], &[("name", string)]);
    doc.field("s", leaf);

    let repo = builder.into_repo().unwrap();
    let doc = repo.document_type("music").unwrap();
    let leaf = repo.data_type_by_name(doc, "leaf").unwrap().as_struct().unwrap();
    let names: Vec<_> = leaf.fields().map(|f| f.name()).collect();
    assert_eq!(names, vec!["count", "name"]);
    assert_eq!(leaf.own_fields().len(), 1);
}

#[test]
fn test_struct_inheritance_cycle_is_rejected() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("music", 5);
    let a = doc.struct_type("a", &[]);
    let b = doc.struct_inheriting("b", &[a], &[]);
    let mut config = builder.build();
    let a_config = config.doctype[0].structtype.iter_mut().find(|s| s.idx == a).unwrap();
    a_config.inherits.push(b);

    assert!(matches!(DocumentTypeRepo::new(&config), Err(RepoError::IllegalArgument(_))));
}

#[test]
fn test_self_referencing_struct_is_allowed() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("tree", 6);
    let node = doc.struct_type("node", &[]);
    let children = doc.array(node);
    doc.struct_field(node, "children", children).field("root", node);

    let repo = builder.into_repo().unwrap();
    let doc = repo.document_type("tree").unwrap();
    let node = repo.data_type_by_name(doc, "node").unwrap();
    let children = node.as_struct().unwrap().field("children").unwrap();
    let array = repo.get(children.data_type());
    assert_eq!(array.name(), "Array<node>");
    match array.kind() {
        DataTypeKind::Array { element } => assert_eq!(repo.get(*element), node),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_dangling_reference_is_rejected() {
    let mut builder = ConfigBuilder::new();
    builder.document("test", 1).field("missing", 4711);
    match builder.into_repo() {
        Err(RepoError::IllegalArgument(msg)) => assert!(msg.contains("4711"), "{}", msg),
        other => panic!("expected illegal argument, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_duplicate_idx_is_rejected() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("test", 1);
    let string = doc.primitive("string");
    let mut config = builder.build();
    config.doctype[0].arraytype.push(ArrayTypeConfig { idx: string, elementtype: string, internalid: -1 });

    assert!(matches!(DocumentTypeRepo::new(&config), Err(RepoError::IllegalConfig(_))));
}

#[test]
fn test_duplicate_document_id_is_rejected() {
    let mut builder = ConfigBuilder::new();
    builder.document("a", 77);
    builder.document("b", 77);
    assert!(matches!(builder.into_repo(), Err(RepoError::IllegalConfig(_))));
}

#[test]
fn test_same_id_with_different_names_in_one_scope_is_rejected() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("test", 1);
    let first = doc.struct_type("first", &[]);
    let second = doc.struct_type("second", &[]);
    let mut config = builder.build();
    for s in config.doctype[0].structtype.iter_mut().filter(|s| s.idx == first || s.idx == second) {
        s.internalid = 1000;
    }

    assert!(matches!(DocumentTypeRepo::new(&config), Err(RepoError::IllegalConfig(_))));
}

#[test]
fn test_data_type_lookups_are_scoped_per_document_type() {
    let mut builder = ConfigBuilder::new();
    let a_struct = builder.document("a", 1).struct_type("a_struct", &[]);
    let b_struct = builder.document("b", 2).struct_type("b_struct", &[]);
    let mut config = builder.build();
    for doc in config.doctype.iter_mut() {
        for s in doc.structtype.iter_mut().filter(|s| s.idx == a_struct || s.idx == b_struct) {
            s.internalid = 1000;
        }
    }

    let repo = DocumentTypeRepo::new(&config).unwrap();
    let a = repo.document_type("a").unwrap();
    let b = repo.document_type("b").unwrap();
    assert_eq!(repo.data_type(a, 1000).map(|t| t.name()), Some("a_struct"));
    assert_eq!(repo.data_type(b, 1000).map(|t| t.name()), Some("b_struct"));
    assert!(repo.data_type(repo.root_document_type(), 1000).is_none());
}

#[test]
fn test_child_sees_parent_declared_types() {
    let mut builder = ConfigBuilder::new();
    let mut parent = builder.document("parent", 1);
    let string = parent.primitive("string");
    let shared = parent.struct_type("shared", &[("x", string)]);
    let parent_idx = parent.idx();
    builder.document("child", 2).inherits(parent_idx).field("s", shared);

    let repo = builder.into_repo().unwrap();
    let child = repo.document_type("child").unwrap();
    let shared_type = repo.data_type_by_name(child, "shared").unwrap();
    assert_eq!(repo.data_type(child, shared_type.id()), Some(shared_type));
}

#[test]
fn test_imported_fields_and_field_sets() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("ad", 3);
    let string = doc.primitive("string");
    doc.field("title", string)
        .field("body", string)
        .imported_field("campaign_name")
        .field_set("default", &["title", "body"]);

    let repo = builder.into_repo().unwrap();
    let doc = repo.document_type("ad").unwrap();
    assert!(doc.has_imported_field_name("campaign_name"));
    assert!(!doc.has_imported_field_name("title"));
    assert_eq!(doc.field_set("default").unwrap(), &["title".to_string(), "body".to_string()]);
    assert!(doc.field_set("nope").is_none());
}

#[test]
fn test_annotation_types() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("text", 4);
    let int = doc.primitive("int");
    let entity = doc.annotation_type("entity", 100, Some(int));
    doc.annotation_type("marker", 101, None);
    let entity_ref = doc.annotation_ref(entity);
    doc.field("ref", entity_ref);

    let repo = builder.into_repo().unwrap();
    let doc = repo.document_type("text").unwrap();
    let entity = repo.annotation_type(doc, 100).unwrap();
    assert_eq!(entity.name(), "entity");
    assert_eq!(entity.data_type().map(|t| repo.get(t).id()), Some(TYPE_INT));
    assert!(repo.annotation_type(doc, 101).unwrap().data_type().is_none());
    assert_eq!(repo.annotation_type(doc, 1).map(|a| a.name()), Some("term"));
    assert_eq!(repo.annotation_type_by_name(doc, "token_type").map(|a| a.id()), Some(2));
    assert!(repo.annotation_type(repo.root_document_type(), 100).is_none());
    let field = doc.field("ref").unwrap();
    assert_eq!(repo.get(field.data_type()).name(), "AnnotationReference<entity>");
}

#[test]
fn test_document_reference_must_target_document_type() {
    let mut builder = ConfigBuilder::new();
    let target = builder.document("target", 1).idx();
    let mut doc = builder.document("source", 2);
    let reference = doc.document_ref(target);
    doc.field("ref", reference);
    let repo = builder.into_repo().unwrap();
    let source = repo.document_type("source").unwrap();
    let ref_type = repo.get(source.field("ref").unwrap().data_type());
    assert_eq!(ref_type.name(), "Reference<target>");

    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("source", 2);
    let string = doc.primitive("string");
    doc.document_ref(string);
    assert!(matches!(builder.into_repo(), Err(RepoError::IllegalArgument(_))));
}

#[test]
fn test_field_id_out_of_range_is_rejected() {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("test", 1);
    let string = doc.primitive("string");
    doc.field_with_id("big", 0x4000_0000, string);
    assert!(matches!(builder.into_repo(), Err(RepoError::IllegalConfig(_))));
}

#[test]
fn test_unknown_primitive_name_is_rejected() {
    let mut builder = ConfigBuilder::new();
    builder.document("test", 1).primitive("predicate");
    assert!(matches!(builder.into_repo(), Err(RepoError::IllegalArgument(_))));
}

#[test]
fn test_for_each_document_type_visits_root_first() {
    let mut builder = ConfigBuilder::new();
    builder.document("a", 1);
    builder.document("b", 2);
    let repo = builder.into_repo().unwrap();

    let mut names = Vec::new();
    repo.for_each_document_type(|doc| names.push(doc.name().to_string()));
    assert_eq!(names, vec!["document", "a", "b"]);
}

#[test]
fn test_fixed_repo_resolves_through_document_scope() {
    let repo = test_config().into_repo().unwrap();
    let fixed = repo.fixed_by_name("test").unwrap();
    assert_eq!(fixed.document_type().name(), "test");
    let header = fixed.data_type(30).unwrap();
    assert_eq!(fixed.get(header).name(), "test.header");
    assert!(fixed.annotation_type(2).is_some());

    let root_view = repo.fixed(header);
    assert_eq!(root_view.document_type().name(), "document");
    assert!(root_view.data_type(30).is_none());
}

#[test]
fn test_repo_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("documenttypes.toml");
    let toml_src = toml::to_string(test_config().config()).unwrap();
    std::fs::write(&path, toml_src).unwrap();

    let repo = DocumentTypeRepo::from_file(&path).unwrap();
    assert_eq!(repo.document_type("test").unwrap().id(), 787121340);
}
