//! Annotation and span tree model
//!
//! A span tree marks sub-ranges of a string value. Its nodes are numbered in
//! pre-order (root first, children of every list included), and annotations
//! point at nodes by that number.

use crate::types::datatype::TypeIdx;
use crate::types::value::FieldValue;

/// Position of an annotation type in the repo's annotation arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationTypeIdx(pub(crate) u32);

/// A kind of annotation, optionally carrying a typed payload
#[derive(Debug, Clone)]
pub struct AnnotationType {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) data_type: Option<TypeIdx>,
    pub(crate) inherits: Vec<AnnotationTypeIdx>,
}

impl AnnotationType {
    /// Numeric id written on the wire
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Annotation type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload type; `None` for annotations without values
    pub fn data_type(&self) -> Option<TypeIdx> {
        self.data_type
    }

    /// Inherited annotation types
    pub fn inherits(&self) -> &[AnnotationTypeIdx] {
        &self.inherits
    }
}

/// A single range `[from, from + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start offset
    pub from: u32,
    /// Length
    pub length: u32,
}

impl Span {
    /// Create a span
    pub fn new(from: u32, length: u32) -> Self {
        Self { from, length }
    }
}

/// One alternative of an [`SpanNode::AlternateSpanList`]
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateSubtree {
    /// Probability of this alternative
    pub probability: f64,
    /// Nodes of this alternative
    pub children: Vec<SpanNode>,
}

/// Node of a span tree.
///
/// A list whose children are all plain spans has the same wire form as a
/// [`SpanNode::SimpleSpanList`] and decodes as one.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanNode {
    /// Leaf range
    Span(Span),
    /// General list of nodes
    SpanList(Vec<SpanNode>),
    /// List of plain spans
    SimpleSpanList(Vec<Span>),
    /// Weighted alternatives
    AlternateSpanList(Vec<AlternateSubtree>),
}

impl SpanNode {
    /// Number of nodes in this subtree, this node included
    pub fn node_count(&self) -> usize {
        1 + match self {
            SpanNode::Span(_) => 0,
            SpanNode::SpanList(children) => children.iter().map(SpanNode::node_count).sum(),
            SpanNode::SimpleSpanList(spans) => spans.len(),
            SpanNode::AlternateSpanList(subtrees) => subtrees
                .iter()
                .flat_map(|t| t.children.iter())
                .map(SpanNode::node_count)
                .sum(),
        }
    }
}

/// Annotation attached to a span tree
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Annotation type id, resolved against the host document type
    pub type_id: i32,
    /// Pre-order index of the annotated span node
    pub span_node: Option<u32>,
    /// Optional payload typed by the annotation type
    pub value: Option<Box<FieldValue>>,
}

impl Annotation {
    /// Annotation without span or value
    pub fn new(type_id: i32) -> Self {
        Self { type_id, span_node: None, value: None }
    }

    /// Attach to a span node by pre-order index
    pub fn on_node(mut self, index: u32) -> Self {
        self.span_node = Some(index);
        self
    }

    /// Attach a payload
    pub fn with_value(mut self, value: FieldValue) -> Self {
        self.value = Some(Box::new(value));
        self
    }
}

/// Named span tree with its annotations
#[derive(Debug, Clone, PartialEq)]
pub struct SpanTree {
    /// Tree name, unique per string value
    pub name: String,
    /// Root node
    pub root: SpanNode,
    /// Annotations in insertion order
    pub annotations: Vec<Annotation>,
}

impl SpanTree {
    /// Tree without annotations
    pub fn new(name: impl Into<String>, root: SpanNode) -> Self {
        Self { name: name.into(), root, annotations: Vec::new() }
    }

    /// Add an annotation, returning its index (usable by annotation references)
    pub fn annotate(&mut self, annotation: Annotation) -> usize {
        self.annotations.push(annotation);
        self.annotations.len() - 1
    }

    /// Size of the pre-order node table
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_includes_every_list_child() {
        let root = SpanNode::SpanList(vec![
            SpanNode::Span(Span::new(0, 3)),
            SpanNode::SimpleSpanList(vec![Span::new(4, 1), Span::new(6, 2)]),
            SpanNode::AlternateSpanList(vec![
                AlternateSubtree { probability: 0.5, children: vec![SpanNode::Span(Span::new(0, 1))] },
                AlternateSubtree { probability: 0.5, children: vec![] },
            ]),
        ]);
        // root + span + simple list (1 + 2) + alternate (1 + 1)
        assert_eq!(SpanTree::new("t", root).node_count(), 7);
    }
}
