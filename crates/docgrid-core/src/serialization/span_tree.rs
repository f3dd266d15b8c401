//! Span tree block of annotated strings.
//!
//! Nodes are counted in pre-order while reading; annotations refer to nodes by
//! that count, so an annotation's node index must be below the number of
//! nodes in its tree.

use bytes::{BufMut, BytesMut};

use crate::constants::{ANNOTATION_HAS_SPAN_NODE, ANNOTATION_HAS_VALUE, STRING_HAS_SPAN_TREES};
use crate::log_warn;
use crate::serialization::deserializer::{read_string_bytes, ValueDecoder};
use crate::serialization::reader::ByteReader;
use crate::serialization::serializer::{len_u32, write_string_bytes, ValueEncoder};
use crate::serialization::varint::{read_1_2_4, write_1_2_4};
use crate::types::annotation::{AlternateSubtree, Annotation, Span, SpanNode, SpanTree};
use crate::types::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};

const NODE_SPAN: u8 = 1;
const NODE_SPAN_LIST: u8 = 2;
const NODE_ALTERNATE_SPAN_LIST: u8 = 4;

/// Deepest span node nesting accepted from the wire
pub(crate) const MAX_SPAN_NODE_DEPTH: usize = 1024;

pub(crate) fn read_span_trees(r: &mut ByteReader, decoder: &ValueDecoder<'_>) -> DecodeResult<Vec<SpanTree>> {
    let count = read_1_2_4(r)? as usize;
    let mut trees = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        trees.push(read_span_tree(r, decoder)?);
    }
    Ok(trees)
}

fn read_span_tree(r: &mut ByteReader, decoder: &ValueDecoder<'_>) -> DecodeResult<SpanTree> {
    if r.read_u8()? & STRING_HAS_SPAN_TREES != 0 {
        return Err(DecodeError::bad_annotation("span tree name carries span trees of its own"));
    }
    let name = read_string_bytes(r)?;
    let mut node_count = 0;
    let root = read_span_node(r, &mut node_count, 0)?;

    let annotation_count = read_1_2_4(r)? as usize;
    let mut annotations = Vec::with_capacity(annotation_count.min(r.remaining()));
    for _ in 0..annotation_count {
        if let Some(annotation) = read_annotation(r, decoder, node_count)? {
            annotations.push(annotation);
        }
    }
    Ok(SpanTree { name, root, annotations })
}

fn read_span(r: &mut ByteReader) -> DecodeResult<Span> {
    let from = read_1_2_4(r)?;
    let length = read_1_2_4(r)?;
    Ok(Span::new(from, length))
}

fn read_span_node(r: &mut ByteReader, node_count: &mut usize, depth: usize) -> DecodeResult<SpanNode> {
    if depth > MAX_SPAN_NODE_DEPTH {
        return Err(DecodeError::bad_annotation(format!(
            "span nodes nested deeper than {}",
            MAX_SPAN_NODE_DEPTH
        )));
    }
    let node_type = r.read_u8()?;
    *node_count += 1;
    match node_type {
        NODE_SPAN => read_span(r).map(SpanNode::Span),
        NODE_SPAN_LIST => read_span_list(r, node_count, depth),
        NODE_ALTERNATE_SPAN_LIST => {
            let subtree_count = read_1_2_4(r)? as usize;
            let mut subtrees = Vec::with_capacity(subtree_count.min(r.remaining()));
            for _ in 0..subtree_count {
                let probability = r.read_f64()?;
                let child_count = read_1_2_4(r)? as usize;
                let children = (0..child_count)
                    .map(|_| read_span_node(r, node_count, depth + 1))
                    .collect::<DecodeResult<Vec<_>>>()?;
                subtrees.push(AlternateSubtree { probability, children });
            }
            Ok(SpanNode::AlternateSpanList(subtrees))
        }
        other => Err(DecodeError::UnknownSpanNodeType(other)),
    }
}

/// A list is read as a list of plain spans first. On the first child that is
/// not a span, the stream and the node count are rewound and the list is read
/// again as a general list.
fn read_span_list(r: &mut ByteReader, node_count: &mut usize, depth: usize) -> DecodeResult<SpanNode> {
    let count = read_1_2_4(r)? as usize;
    let mark = r.position();
    let nodes_mark = *node_count;

    let mut spans = Vec::with_capacity(count.min(r.remaining()));
    while spans.len() < count && r.peek_u8()? == NODE_SPAN {
        r.skip(1)?;
        spans.push(read_span(r)?);
        *node_count += 1;
    }
    if spans.len() == count {
        return Ok(SpanNode::SimpleSpanList(spans));
    }

    r.rewind_to(mark);
    *node_count = nodes_mark;
    let children = (0..count)
        .map(|_| read_span_node(r, node_count, depth + 1))
        .collect::<DecodeResult<Vec<_>>>()?;
    Ok(SpanNode::SpanList(children))
}

fn read_annotation(r: &mut ByteReader, decoder: &ValueDecoder<'_>, node_count: usize) -> DecodeResult<Option<Annotation>> {
    let type_id = r.read_i32()?;
    let features = r.read_u8()?;
    let size = read_1_2_4(r)? as usize;

    let Some(annotation_type) = decoder.repo.annotation_type(type_id) else {
        log_warn!(
            "Skipping annotation of unknown type {} in document type '{}' ({} bytes)",
            type_id,
            decoder.repo.document_type().name(),
            size
        );
        r.skip(size)?;
        return Ok(None);
    };

    let mut payload = r.sub_reader(size)?;
    let mut annotation = Annotation::new(type_id);
    if features & ANNOTATION_HAS_SPAN_NODE != 0 {
        let index = read_1_2_4(&mut payload)?;
        if index as usize >= node_count {
            return Err(DecodeError::bad_annotation(format!(
                "span node index {} out of range, tree has {} nodes",
                index, node_count
            )));
        }
        annotation.span_node = Some(index);
    }
    if features & ANNOTATION_HAS_VALUE != 0 {
        let data_type = annotation_type.data_type().ok_or_else(|| {
            DecodeError::bad_annotation(format!("annotation type '{}' carries no data type", annotation_type.name()))
        })?;
        annotation.value = Some(Box::new(decoder.read_value(&mut payload, data_type)?));
    }
    if !payload.is_empty() {
        return Err(DecodeError::bad_annotation(format!(
            "{} trailing bytes in annotation of type '{}'",
            payload.remaining(),
            annotation_type.name()
        )));
    }
    Ok(Some(annotation))
}

pub(crate) fn write_span_trees(out: &mut BytesMut, trees: &[SpanTree], encoder: &ValueEncoder<'_>) -> EncodeResult<()> {
    write_1_2_4(out, len_u32(trees.len())?)?;
    for tree in trees {
        out.put_u8(0);
        write_string_bytes(out, &tree.name)?;
        write_span_node(out, &tree.root)?;
        let node_count = tree.node_count();
        write_1_2_4(out, len_u32(tree.annotations.len())?)?;
        for annotation in &tree.annotations {
            write_annotation(out, annotation, node_count, encoder)?;
        }
    }
    Ok(())
}

fn write_span(out: &mut BytesMut, span: &Span) -> EncodeResult<()> {
    out.put_u8(NODE_SPAN);
    write_1_2_4(out, span.from)?;
    write_1_2_4(out, span.length)
}

fn write_span_node(out: &mut BytesMut, node: &SpanNode) -> EncodeResult<()> {
    match node {
        SpanNode::Span(span) => write_span(out, span),
        SpanNode::SpanList(children) => {
            out.put_u8(NODE_SPAN_LIST);
            write_1_2_4(out, len_u32(children.len())?)?;
            children.iter().try_for_each(|child| write_span_node(out, child))
        }
        SpanNode::SimpleSpanList(spans) => {
            out.put_u8(NODE_SPAN_LIST);
            write_1_2_4(out, len_u32(spans.len())?)?;
            spans.iter().try_for_each(|span| write_span(out, span))
        }
        SpanNode::AlternateSpanList(subtrees) => {
            out.put_u8(NODE_ALTERNATE_SPAN_LIST);
            write_1_2_4(out, len_u32(subtrees.len())?)?;
            for subtree in subtrees {
                out.put_f64(subtree.probability);
                write_1_2_4(out, len_u32(subtree.children.len())?)?;
                subtree.children.iter().try_for_each(|child| write_span_node(out, child))?;
            }
            Ok(())
        }
    }
}

fn write_annotation(
    out: &mut BytesMut,
    annotation: &Annotation,
    node_count: usize,
    encoder: &ValueEncoder<'_>,
) -> EncodeResult<()> {
    let annotation_type = encoder.repo.annotation_type(annotation.type_id).ok_or_else(|| {
        EncodeError::type_mismatch(format!("unknown annotation type {}", annotation.type_id))
    })?;

    let mut features = 0u8;
    let mut payload = BytesMut::new();
    if let Some(index) = annotation.span_node {
        if index as usize >= node_count {
            return Err(EncodeError::type_mismatch(format!(
                "annotation points at span node {} but the tree has {} nodes",
                index, node_count
            )));
        }
        features |= ANNOTATION_HAS_SPAN_NODE;
        write_1_2_4(&mut payload, index)?;
    }
    if let Some(value) = &annotation.value {
        let data_type = annotation_type.data_type().ok_or_else(|| {
            EncodeError::type_mismatch(format!("annotation type '{}' carries no data type", annotation_type.name()))
        })?;
        features |= ANNOTATION_HAS_VALUE;
        encoder.write_value(&mut payload, data_type, value)?;
    }

    out.put_i32(annotation.type_id);
    out.put_u8(features);
    write_1_2_4(out, len_u32(payload.len())?)?;
    out.extend_from_slice(&payload);
    Ok(())
}
