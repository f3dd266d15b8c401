use bytes::{BufMut, Bytes, BytesMut};
use proptest::prelude::*;

use super::*;
use crate::constants::{ANNOTATION_TERM_ID, TYPE_STRING};
use crate::repo::{ConfigBuilder, DocumentTypeRepo, FixedTypeRepo};
use crate::types::annotation::{AlternateSubtree, Annotation, Span, SpanNode, SpanTree};
use crate::types::document::Document;
use crate::types::document_id::DocumentId;
use crate::types::error::{DecodeError, EncodeError};
use crate::types::tensor::Tensor;
use crate::types::value::{FieldValue, MapValue, StringValue, StructValue, WeightedSetValue};
use crate::types::TypeIdx;

const ENTITY_ANNOTATION_ID: i32 = 100;

fn music_repo() -> DocumentTypeRepo {
    let mut builder = ConfigBuilder::new();
    let mut music = builder.document("music", 42);
    let string = music.primitive("string");
    let int = music.primitive("int");
    let long = music.primitive("long");
    let raw = music.primitive("raw");
    let double = music.primitive("double");
    let tags = music.weighted_set(string, false, false);
    let scores = music.map(string, int);
    let artists = music.array(string);
    let embedding = music.tensor("tensor(x[3])");
    let node = music.struct_type("node", &[("label", string)]);
    let children = music.array(node);
    music.struct_field(node, "children", children);
    music.annotation_type("entity", ENTITY_ANNOTATION_ID, Some(string));
    let music_idx = music.idx();
    music
        .field("title", string)
        .field("year", int)
        .field("plays", long)
        .field("cover", raw)
        .field("rating", double)
        .field("tags", tags)
        .field("scores", scores)
        .field("artists", artists)
        .field("embedding", embedding)
        .field("tree", node);

    let mut playlist = builder.document("playlist", 43);
    let string = playlist.primitive("string");
    let favourite = playlist.document_ref(music_idx);
    playlist
        .field("name", string)
        .field("favourite", favourite)
        .field("featured", music_idx);

    builder.into_repo().unwrap()
}

fn doc_id(raw: &str) -> DocumentId {
    DocumentId::parse(raw).unwrap()
}

fn new_doc(repo: &DocumentTypeRepo, doc_type: &str, id: &str) -> Document {
    Document::new(repo.document_type(doc_type).unwrap(), doc_id(id))
}

fn set(repo: &DocumentTypeRepo, doc: &mut Document, name: &str, value: impl Into<FieldValue>) {
    let field = repo.document_type_at(doc.doc_type()).and_then(|d| d.field(name)).unwrap().clone();
    doc.set(&field, value);
}

fn field_type(repo: &FixedTypeRepo<'_>, name: &str) -> TypeIdx {
    repo.document_type().field(name).unwrap().data_type()
}

fn decode_materialized(repo: &DocumentTypeRepo, bytes: Bytes) -> Document {
    let mut doc = DocumentDeserializer::new(repo).deserialize(bytes).unwrap();
    doc.materialize(&repo.fixed(doc.doc_type())).unwrap();
    doc
}

/// Offset of the content struct inside a serialized envelope
fn struct_offset(id: &str, doc_type: &str) -> usize {
    2 + 4 + id.len() + 1 + 1 + doc_type.len() + 1 + 2
}

fn node(repo: &DocumentTypeRepo, label: &str, children: Vec<StructValue>) -> StructValue {
    let fixed = repo.fixed_by_name("music").unwrap();
    let node_idx = field_type(&fixed, "tree");
    let node_type = repo.get(node_idx).as_struct().unwrap();
    let mut value = StructValue::new(node_idx);
    value.set(node_type.field("label").unwrap(), label.into());
    if !children.is_empty() {
        let children = children.into_iter().map(FieldValue::Struct).collect();
        value.set(node_type.field("children").unwrap(), FieldValue::Array(children));
    }
    value
}

fn full_music_doc(repo: &DocumentTypeRepo) -> Document {
    let mut doc = new_doc(repo, "music", "id:ns:music::bohemian");
    set(repo, &mut doc, "title", "Bohemian Rhapsody");
    set(repo, &mut doc, "year", 1975);
    set(repo, &mut doc, "plays", 1_234_567_890_123i64);
    set(repo, &mut doc, "cover", FieldValue::Raw(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])));
    set(repo, &mut doc, "rating", 4.5);

    let mut tags = WeightedSetValue::new();
    tags.insert("rock".into(), 10);
    tags.insert("opera".into(), -3);
    set(repo, &mut doc, "tags", FieldValue::WeightedSet(tags));

    let mut scores = MapValue::new();
    scores.insert("critics".into(), 97.into());
    scores.insert("fans".into(), 99.into());
    set(repo, &mut doc, "scores", FieldValue::Map(scores));

    set(repo, &mut doc, "artists", FieldValue::Array(vec!["Queen".into(), "Freddie Mercury".into()]));
    set(repo, &mut doc, "embedding", FieldValue::Tensor(Some(Tensor::new("tensor(x[3])", vec![0.5, -1.0, 2.0]))));

    let tree = node(repo, "root", vec![node(repo, "left", vec![]), node(repo, "right", vec![node(repo, "deep", vec![])])]);
    set(repo, &mut doc, "tree", tree);
    doc
}

#[test]
fn test_document_round_trip_with_every_value_kind() {
    let repo = music_repo();
    let doc = full_music_doc(&repo);

    let bytes = DocumentSerializer::new(&repo).serialize(&doc).unwrap();
    assert_eq!(&bytes[..2], &[0x00, 0x08]);
    let declared = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    assert_eq!(declared, bytes.len() - 6);

    assert_eq!(decode_materialized(&repo, bytes), doc);
}

#[test]
fn test_embedded_document_and_reference_round_trip() {
    let repo = music_repo();
    let mut featured = new_doc(&repo, "music", "id:ns:music:n=7:track");
    set(&repo, &mut featured, "title", "Under Pressure");

    let mut playlist = new_doc(&repo, "playlist", "id:ns:playlist:g=users:mix");
    set(&repo, &mut playlist, "name", "Mix");
    set(&repo, &mut playlist, "favourite", FieldValue::Reference(Some(doc_id("id:ns:music::bohemian"))));
    set(&repo, &mut playlist, "featured", FieldValue::Document(Box::new(featured)));

    let bytes = DocumentSerializer::new(&repo).serialize(&playlist).unwrap();
    let decoded = decode_materialized(&repo, bytes);
    assert_eq!(decoded, playlist);

    let fixed = repo.fixed_by_name("playlist").unwrap();
    let Some(FieldValue::Document(inner)) = decoded.get(&fixed, "featured").unwrap() else {
        panic!("featured is not a document");
    };
    assert_eq!(inner.id().as_str(), "id:ns:music:n=7:track");
    assert_eq!(repo.document_type_at(inner.doc_type()).unwrap().name(), "music");
}

#[test]
fn test_unset_reference_and_tensor_round_trip() {
    let repo = music_repo();
    let mut doc = new_doc(&repo, "playlist", "id:ns:playlist::empty");
    set(&repo, &mut doc, "favourite", FieldValue::Reference(None));
    let bytes = DocumentSerializer::new(&repo).serialize(&doc).unwrap();
    assert_eq!(decode_materialized(&repo, bytes), doc);

    let fixed = repo.fixed_by_name("music").unwrap();
    let tensor = field_type(&fixed, "embedding");
    let encoded = encode_field_value(&fixed, tensor, &FieldValue::Tensor(None)).unwrap();
    assert_eq!(&encoded[..], &[0x00]);
    assert_eq!(decode_field_value(&fixed, tensor, encoded).unwrap(), FieldValue::Tensor(None));
}

#[test]
fn test_lz4_compressed_structs_round_trip() {
    let repo = music_repo();
    let mut doc = new_doc(&repo, "music", "id:ns:music::long");
    set(&repo, &mut doc, "title", "la ".repeat(200));
    set(&repo, &mut doc, "year", 2001);

    let options = SerializerOptions { compression: CompressionType::Lz4, min_compress_size: 16 };
    let compressed = DocumentSerializer::new(&repo).with_options(options).serialize(&doc).unwrap();
    let plain = DocumentSerializer::new(&repo).serialize(&doc).unwrap();
    assert!(compressed.len() < plain.len());

    let offset = struct_offset("id:ns:music::long", "music");
    assert_eq!(compressed[offset + 4], CompressionType::Lz4.code());
    assert_eq!(plain[offset + 4], CompressionType::None.code());
    assert_eq!(decode_materialized(&repo, compressed), doc);
}

#[test]
fn test_small_struct_is_not_compressed() {
    let repo = music_repo();
    let mut doc = new_doc(&repo, "music", "id:ns:music::short");
    set(&repo, &mut doc, "year", 1);
    let options = SerializerOptions { compression: CompressionType::Lz4, ..Default::default() };
    let bytes = DocumentSerializer::new(&repo).with_options(options).serialize(&doc).unwrap();
    assert_eq!(bytes[struct_offset("id:ns:music::short", "music") + 4], 0);
}

#[test]
fn test_fields_stay_lazy_until_asked_for() {
    let repo = music_repo();
    let doc = full_music_doc(&repo);
    let bytes = DocumentSerializer::new(&repo).serialize(&doc).unwrap();

    let decoded = DocumentDeserializer::new(&repo).deserialize(bytes).unwrap();
    assert!(decoded.fields().is_lazy());
    assert_eq!(decoded.fields().len(), 10);

    let fixed = repo.fixed(decoded.doc_type());
    assert_eq!(decoded.get(&fixed, "year").unwrap(), Some(FieldValue::Int(1975)));
    assert_eq!(
        decoded.get(&fixed, "title").unwrap().as_ref().and_then(FieldValue::as_str),
        Some("Bohemian Rhapsody")
    );
    assert_eq!(decoded.get(&fixed, "no_such_field").unwrap(), None);
    assert!(decoded.fields().is_lazy());
}

#[test]
fn test_lazy_fields_are_copied_through_on_reserialize() {
    let repo = music_repo();
    let doc = full_music_doc(&repo);
    let serializer = DocumentSerializer::new(&repo);
    let bytes = serializer.serialize(&doc).unwrap();

    let mut decoded = DocumentDeserializer::new(&repo).deserialize(bytes.clone()).unwrap();
    assert_eq!(serializer.serialize(&decoded).unwrap(), bytes);

    set(&repo, &mut decoded, "year", 1976);
    let mut reread = decode_materialized(&repo, serializer.serialize(&decoded).unwrap());
    let fixed = repo.fixed(reread.doc_type());
    assert_eq!(reread.get(&fixed, "year").unwrap(), Some(FieldValue::Int(1976)));
    reread.materialize(&fixed).unwrap();
    assert_eq!(reread.get(&fixed, "rating").unwrap(), Some(FieldValue::Double(4.5)));
}

#[test]
fn test_unsupported_version_is_rejected() {
    let repo = music_repo();
    let doc = new_doc(&repo, "music", "id:ns:music::v");
    let mut bytes = DocumentSerializer::new(&repo).serialize(&doc).unwrap().to_vec();
    bytes[1] = 7;
    assert_eq!(
        DocumentDeserializer::new(&repo).deserialize(bytes).unwrap_err(),
        DecodeError::UnsupportedVersion(7)
    );
}

#[test]
fn test_trailing_bytes_after_document_are_rejected() {
    let repo = music_repo();
    let doc = new_doc(&repo, "music", "id:ns:music::t");
    let mut bytes = DocumentSerializer::new(&repo).serialize(&doc).unwrap().to_vec();
    bytes.push(0);
    assert!(matches!(
        DocumentDeserializer::new(&repo).deserialize(bytes),
        Err(DecodeError::LengthMismatch { context: "document buffer", .. })
    ));
}

#[test]
fn test_unknown_document_type_is_rejected() {
    let repo = music_repo();
    let doc = new_doc(&repo, "music", "id:ns:music::x");
    let bytes = DocumentSerializer::new(&repo).serialize(&doc).unwrap();
    assert_eq!(
        DocumentDeserializer::new(&DocumentTypeRepo::default()).deserialize(bytes).unwrap_err(),
        DecodeError::UnknownDocumentType("music".to_string())
    );
}

#[test]
fn test_zero_string_length_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();
    assert_eq!(
        decode_field_value(&fixed, string, Bytes::from_static(&[0x00, 0x00])).unwrap_err(),
        DecodeError::ZeroStringLength
    );
}

#[test]
fn test_field_table_past_buffer_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let content = fixed.document_type().content_struct();
    // 2 data bytes, one field claiming 5
    let bytes = Bytes::from_static(&[0, 0, 0, 2, 0, 1, 0x01, 0x00, 0x05, 0xaa, 0xbb]);
    assert_eq!(
        decode_field_value(&fixed, content, bytes).unwrap_err(),
        DecodeError::FieldTableOverflow { covered: 5, available: 2 }
    );
}

#[test]
fn test_unknown_compression_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let content = fixed.document_type().content_struct();
    let bytes = Bytes::from_static(&[0, 0, 0, 0, 9, 0]);
    assert_eq!(
        decode_field_value(&fixed, content, bytes).unwrap_err(),
        DecodeError::UnknownCompression(9)
    );
}

#[test]
fn test_weighted_set_element_size_includes_weight() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let tags = field_type(&fixed, "tags");
    let mut set = WeightedSetValue::new();
    set.insert("a".into(), 5);

    let encoded = encode_field_value(&fixed, tags, &FieldValue::WeightedSet(set.clone())).unwrap();
    let expected = [
        0, 0, 0, 2, // element type id
        1, // count
        0, 0, 0, 8, // element size: string (4) + weight (4)
        0, 2, b'a', 0, // string
        0, 0, 0, 5, // weight
    ];
    assert_eq!(&encoded[..], &expected);
    assert_eq!(decode_field_value(&fixed, tags, encoded).unwrap(), FieldValue::WeightedSet(set));

    let mut wrong = expected;
    wrong[8] = 4;
    assert!(matches!(
        decode_field_value(&fixed, tags, Bytes::copy_from_slice(&wrong)),
        Err(DecodeError::LengthMismatch { context: "weighted set element", expected: 4, actual: 8 })
    ));
}

#[test]
fn test_type_mismatch_on_encode() {
    let repo = music_repo();
    let mut doc = new_doc(&repo, "music", "id:ns:music::bad");
    set(&repo, &mut doc, "year", "not a number");
    assert!(matches!(
        DocumentSerializer::new(&repo).serialize(&doc),
        Err(EncodeError::TypeMismatch(_))
    ));
}

#[test]
fn test_tensor_leftover_bytes_are_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let tensor = field_type(&fixed, "embedding");
    let mut bytes = BytesMut::new();
    bytes.put_u8(13);
    bytes.put_u32(1);
    bytes.put_f64(1.0);
    bytes.put_u8(0xff);
    assert!(matches!(decode_field_value(&fixed, tensor, bytes.freeze()), Err(DecodeError::Tensor(_))));
}

fn annotated(text: &str, annotation: Annotation) -> FieldValue {
    let mut tree = SpanTree::new("linguistics", SpanNode::Span(Span::new(0, 1)));
    tree.annotate(annotation);
    FieldValue::String(StringValue::new(text).with_span_tree(tree))
}

/// String "a" with one tree "t" over a single span and one `term` annotation on node `index`
fn handcrafted_annotated_string(index: u8) -> Vec<u8> {
    let block = [
        1, // trees
        0, 2, b't', 0, // tree name
        1, 0, 1, // span [0, 1)
        1, // annotations
        0, 0, 0, 1, // term
        0x01, // has span node
        1,    // payload size
        index,
    ];
    let mut bytes = vec![0x40, 2, b'a', 0];
    bytes.extend_from_slice(&(block.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&block);
    bytes
}

#[test]
fn test_span_tree_wire_layout() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();

    let mut tree = SpanTree::new("t", SpanNode::Span(Span::new(0, 1)));
    tree.annotate(Annotation::new(ANNOTATION_TERM_ID).on_node(0));
    let value = FieldValue::String(StringValue::new("a").with_span_tree(tree));

    let encoded = encode_field_value(&fixed, string, &value).unwrap();
    assert_eq!(encoded.to_vec(), handcrafted_annotated_string(0));
    assert_eq!(decode_field_value(&fixed, string, encoded).unwrap(), value);
}

#[test]
fn test_span_node_index_out_of_range_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();
    let bytes = Bytes::from(handcrafted_annotated_string(5));
    assert!(matches!(decode_field_value(&fixed, string, bytes), Err(DecodeError::BadAnnotation(_))));

    let value = annotated("a", Annotation::new(ANNOTATION_TERM_ID).on_node(1));
    assert!(matches!(encode_field_value(&fixed, string, &value), Err(EncodeError::TypeMismatch(_))));
}

#[test]
fn test_annotations_with_values_and_nested_lists_round_trip() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();

    let root = SpanNode::SpanList(vec![
        SpanNode::Span(Span::new(0, 6)),
        SpanNode::SimpleSpanList(vec![Span::new(7, 3), Span::new(11, 4)]),
        SpanNode::AlternateSpanList(vec![
            AlternateSubtree { probability: 0.75, children: vec![SpanNode::Span(Span::new(0, 15))] },
            AlternateSubtree { probability: 0.25, children: vec![] },
        ]),
    ]);
    let mut tree = SpanTree::new("linguistics", root);
    tree.annotate(Annotation::new(ENTITY_ANNOTATION_ID).on_node(1).with_value("Freddie".into()));
    tree.annotate(Annotation::new(ANNOTATION_TERM_ID).on_node(3));
    tree.annotate(Annotation::new(ANNOTATION_TERM_ID));
    let value = FieldValue::String(StringValue::new("Freddie sang it").with_span_tree(tree));

    let encoded = encode_field_value(&fixed, string, &value).unwrap();
    assert_eq!(decode_field_value(&fixed, string, encoded).unwrap(), value);
}

#[test]
fn test_span_list_of_plain_spans_decodes_as_simple_list() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();

    let tree = SpanTree::new("t", SpanNode::SpanList(vec![SpanNode::Span(Span::new(0, 1)), SpanNode::Span(Span::new(1, 1))]));
    let value = FieldValue::String(StringValue::new("ab").with_span_tree(tree));
    let encoded = encode_field_value(&fixed, string, &value).unwrap();

    let FieldValue::String(decoded) = decode_field_value(&fixed, string, encoded).unwrap() else {
        panic!("not a string");
    };
    assert_eq!(decoded.span_trees[0].root, SpanNode::SimpleSpanList(vec![Span::new(0, 1), Span::new(1, 1)]));
}

#[test]
fn test_unknown_annotation_type_is_skipped() {
    let repo = music_repo();
    let music = repo.fixed_by_name("music").unwrap();
    let playlist = repo.fixed_by_name("playlist").unwrap();
    let string = music.data_type(TYPE_STRING).unwrap();

    let value = annotated("Queen", Annotation::new(ENTITY_ANNOTATION_ID).on_node(0).with_value("band".into()));
    let encoded = encode_field_value(&music, string, &value).unwrap();
    assert!(playlist.annotation_type(ENTITY_ANNOTATION_ID).is_none());

    let FieldValue::String(decoded) = decode_field_value(&playlist, string, encoded).unwrap() else {
        panic!("not a string");
    };
    assert_eq!(decoded.text, "Queen");
    assert_eq!(decoded.span_trees.len(), 1);
    assert!(decoded.span_trees[0].annotations.is_empty());
}

#[test]
fn test_unknown_span_node_type_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();
    let mut bytes = handcrafted_annotated_string(0);
    // root node type byte
    bytes[8 + 5] = 3;
    assert_eq!(
        decode_field_value(&fixed, string, Bytes::from(bytes)).unwrap_err(),
        DecodeError::UnknownSpanNodeType(3)
    );
}

/// Header chunk with `year`, body chunk with `plays` and a corrupt `title`
fn legacy_document(repo: &DocumentTypeRepo) -> Vec<u8> {
    let serializer = DocumentSerializer::new(repo);
    let id = "id:ns:music::legacy";
    let offset = struct_offset(id, "music");

    let mut header = new_doc(repo, "music", id);
    set(repo, &mut header, "year", 1999);
    let header = serializer.serialize(&header).unwrap();

    let mut body = new_doc(repo, "music", id);
    set(repo, &mut body, "title", "x");
    set(repo, &mut body, "plays", 7i64);
    let mut body = serializer.serialize(&body).unwrap()[offset..].to_vec();
    let title_at = body.windows(4).position(|w| w == [0, 2, b'x', 0]).unwrap();
    // claim span trees that are not there
    body[title_at] = 0x40;

    let mut content = BytesMut::new();
    content.put_slice(id.as_bytes());
    content.put_u8(0);
    content.put_u8(0x06);
    content.put_slice(b"music\0");
    content.put_u16(0);
    content.put_slice(&header[offset..]);
    content.put_slice(&body);

    let mut out = BytesMut::new();
    out.put_u16(8);
    out.put_u32(content.len() as u32);
    out.put_slice(&content);
    out.to_vec()
}

#[test]
fn test_legacy_header_and_body_chunks_are_merged() {
    let repo = music_repo();
    let doc = DocumentDeserializer::new(&repo).deserialize(legacy_document(&repo)).unwrap();
    let fixed = repo.fixed(doc.doc_type());

    assert_eq!(doc.get(&fixed, "year").unwrap(), Some(FieldValue::Int(1999)));
    assert_eq!(doc.get(&fixed, "plays").unwrap(), Some(FieldValue::Long(7)));
    assert_eq!(doc.get(&fixed, "title").unwrap(), None);
    assert_eq!(doc.fields().len(), 2);
}

#[test]
fn test_reader_leaves_following_documents_alone() {
    let repo = music_repo();
    let serializer = DocumentSerializer::new(&repo);
    let mut out = BytesMut::new();
    for name in ["a", "b"] {
        let mut doc = new_doc(&repo, "music", &format!("id:ns:music::{}", name));
        set(&repo, &mut doc, "title", name);
        serializer.serialize_into(&doc, &mut out).unwrap();
    }

    let deserializer = DocumentDeserializer::new(&repo);
    let mut r = ByteReader::new(out.freeze());
    let first = deserializer.read(&mut r).unwrap();
    let second = deserializer.read(&mut r).unwrap();
    assert!(r.is_empty());
    assert_eq!(first.id().local_id(), "a");
    assert_eq!(deserializer.field(&second, "title").unwrap().as_ref().and_then(FieldValue::as_str), Some("b"));
}

#[test]
fn test_declared_lz4_size_beyond_input_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let content = fixed.document_type().content_struct();
    let bytes = Bytes::from_static(&[
        0, 0, 0, 1, // data size
        6, // lz4
        0xC0, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, // uncompressed size 2^40
        0, // no fields
        0x10,
    ]);
    assert!(matches!(
        decode_field_value(&fixed, content, bytes),
        Err(DecodeError::Decompression(_))
    ));
}

/// String "a" whose single span tree root sits under `depth` nested span lists
fn nested_span_lists(depth: usize) -> Bytes {
    let mut block = vec![1, 0, 2, b't', 0];
    for _ in 0..depth {
        block.extend_from_slice(&[2, 1]);
    }
    block.extend_from_slice(&[1, 0, 1]);
    block.push(0);

    let mut bytes = vec![0x40, 2, b'a', 0];
    bytes.extend_from_slice(&(block.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&block);
    Bytes::from(bytes)
}

#[test]
fn test_span_node_nesting_is_bounded() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();

    let FieldValue::String(decoded) = decode_field_value(&fixed, string, nested_span_lists(32)).unwrap() else {
        panic!("not a string");
    };
    assert_eq!(decoded.span_trees[0].node_count(), 33);

    assert!(matches!(
        decode_field_value(&fixed, string, nested_span_lists(500_000)),
        Err(DecodeError::BadAnnotation(_))
    ));
}

#[test]
fn test_string_without_terminator_is_rejected() {
    let repo = music_repo();
    let fixed = repo.fixed_by_name("music").unwrap();
    let string = fixed.data_type(TYPE_STRING).unwrap();
    assert_eq!(
        decode_field_value(&fixed, string, Bytes::from_static(&[0x00, 0x02, b'a', b'b'])).unwrap_err(),
        DecodeError::UnterminatedString
    );
    assert_eq!(
        decode_field_value(&fixed, string, Bytes::from_static(&[0x00, 0x03, b'a', b'b', 0x00])).unwrap(),
        FieldValue::from("ab")
    );
}

type NodeShape = (String, Vec<(String, Vec<String>)>);

fn text() -> impl Strategy<Value = String> {
    "[a-z ]{0,12}"
}

fn node_shape() -> impl Strategy<Value = NodeShape> {
    (text(), prop::collection::vec((text(), prop::collection::vec(text(), 0..3)), 0..3))
}

fn build_node(repo: &DocumentTypeRepo, (label, children): NodeShape) -> StructValue {
    let children = children
        .into_iter()
        .map(|(label, leaves)| node(repo, &label, leaves.iter().map(|leaf| node(repo, leaf, vec![])).collect()))
        .collect();
    node(repo, &label, children)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_any_music_document_survives_a_round_trip(
        title in text(),
        annotate_title in any::<bool>(),
        year in any::<i32>(),
        plays in any::<i64>(),
        rating in -1.0e9f64..1.0e9,
        tags in prop::collection::vec((text(), any::<i32>()), 0..5),
        scores in prop::collection::vec((text(), any::<i32>()), 0..5),
        artists in prop::collection::vec(text(), 0..4),
        tree in node_shape(),
        lz4 in any::<bool>(),
    ) {
        let repo = music_repo();
        let mut doc = new_doc(&repo, "music", "id:ns:music::generated");

        let mut title_value = StringValue::new(title.clone());
        if annotate_title {
            let mut span_tree = SpanTree::new("linguistics", SpanNode::Span(Span::new(0, title.len() as u32)));
            span_tree.annotate(Annotation::new(ANNOTATION_TERM_ID).on_node(0));
            title_value = title_value.with_span_tree(span_tree);
        }
        set(&repo, &mut doc, "title", FieldValue::String(title_value));
        set(&repo, &mut doc, "year", year);
        set(&repo, &mut doc, "plays", plays);
        set(&repo, &mut doc, "rating", rating);

        let mut tag_set = WeightedSetValue::new();
        for (tag, weight) in tags {
            tag_set.insert(tag.into(), weight);
        }
        set(&repo, &mut doc, "tags", FieldValue::WeightedSet(tag_set));

        let mut score_map = MapValue::new();
        for (key, score) in scores {
            score_map.insert(key.into(), score.into());
        }
        set(&repo, &mut doc, "scores", FieldValue::Map(score_map));
        set(&repo, &mut doc, "artists", FieldValue::Array(artists.into_iter().map(FieldValue::from).collect()));
        set(&repo, &mut doc, "tree", build_node(&repo, tree));

        let options = if lz4 {
            SerializerOptions { compression: CompressionType::Lz4, min_compress_size: 0 }
        } else {
            SerializerOptions::default()
        };
        let bytes = DocumentSerializer::new(&repo).with_options(options).serialize(&doc).unwrap();
        prop_assert_eq!(decode_materialized(&repo, bytes), doc);
    }
}
