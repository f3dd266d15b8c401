//! Data type descriptors
//!
//! Every type lives in the repo's arena and is addressed by a [`TypeIdx`].
//! Containers point at their element types by index, which is what lets
//! structs and document types reference themselves and each other.

use std::fmt;

use crate::constants::{
    TYPE_BOOL, TYPE_BYTE, TYPE_DOUBLE, TYPE_FLOAT, TYPE_INT, TYPE_LONG, TYPE_RAW, TYPE_SHORT,
    TYPE_STRING, TYPE_TENSOR, TYPE_URI,
};
use crate::types::annotation::AnnotationTypeIdx;
use crate::types::document::DocumentType;
use crate::types::field::StructType;

/// Position of a data type in the repo arena.
///
/// Two handles from the same repo are equal exactly when they denote the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdx(pub(crate) u32);

impl TypeIdx {
    /// Raw arena position
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-width and string-like builtin types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// 32-bit signed integer
    Int,
    /// 32-bit float
    Float,
    /// UTF-8 string, may carry span trees
    String,
    /// Opaque bytes
    Raw,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Double,
    /// Boolean
    Bool,
    /// 8-bit signed integer
    Byte,
    /// 16-bit signed integer
    Short,
    /// URI, encoded like a string
    Uri,
}

impl PrimitiveKind {
    /// All primitives with their builtin id and name
    pub const ALL: [(PrimitiveKind, i32, &'static str); 10] = [
        (PrimitiveKind::Int, TYPE_INT, "int"),
        (PrimitiveKind::Float, TYPE_FLOAT, "float"),
        (PrimitiveKind::String, TYPE_STRING, "string"),
        (PrimitiveKind::Raw, TYPE_RAW, "raw"),
        (PrimitiveKind::Long, TYPE_LONG, "long"),
        (PrimitiveKind::Double, TYPE_DOUBLE, "double"),
        (PrimitiveKind::Bool, TYPE_BOOL, "bool"),
        (PrimitiveKind::Byte, TYPE_BYTE, "byte"),
        (PrimitiveKind::Short, TYPE_SHORT, "short"),
        (PrimitiveKind::Uri, TYPE_URI, "uri"),
    ];

    /// Look a primitive up by its config name
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        Self::ALL
            .iter()
            .find(|(_, _, n)| *n == name)
            .map(|(kind, _, _)| *kind)
    }

    /// Builtin id of this primitive
    pub fn id(self) -> i32 {
        Self::ALL
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, id, _)| *id)
            .unwrap_or(TYPE_STRING)
    }
}

/// The shape of a data type
#[derive(Debug, Clone)]
pub enum DataTypeKind {
    /// Builtin scalar or string
    Primitive(PrimitiveKind),
    /// Ordered list of elements
    Array {
        /// Element type
        element: TypeIdx,
    },
    /// Key/value pairs
    Map {
        /// Key type
        key: TypeIdx,
        /// Value type
        value: TypeIdx,
    },
    /// Elements with integer weights
    WeightedSet {
        /// Element type
        element: TypeIdx,
        /// Drop entries whose weight reaches zero on update
        remove_if_zero: bool,
        /// Create missing entries on increment
        create_if_nonexistent: bool,
    },
    /// Named fields
    Struct(StructType),
    /// Index of an annotation in the same span tree
    AnnotationReference {
        /// Referenced annotation type
        annotation_type: AnnotationTypeIdx,
    },
    /// Reference to a document of another type
    DocumentReference {
        /// Target document type
        target: TypeIdx,
    },
    /// Tensor with a type spec such as `tensor(x[3])`
    Tensor {
        /// Tensor type spec
        spec: String,
    },
    /// A document type
    Document(DocumentType),
}

/// A data type: numeric id, name and shape.
#[derive(Debug, Clone)]
pub struct DataType {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) kind: DataTypeKind,
}

impl DataType {
    pub(crate) fn new(id: i32, name: impl Into<String>, kind: DataTypeKind) -> Self {
        Self { id, name: name.into(), kind }
    }

    /// Public numeric id (builtin constant or name hash)
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape of this type
    pub fn kind(&self) -> &DataTypeKind {
        &self.kind
    }

    /// Struct payload, if this is a struct
    pub fn as_struct(&self) -> Option<&StructType> {
        match &self.kind {
            DataTypeKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Document payload, if this is a document type
    pub fn as_document(&self) -> Option<&DocumentType> {
        match &self.kind {
            DataTypeKind::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Primitive kind, if this is a primitive
    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            DataTypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Whether this is the untyped builtin tensor
    pub fn is_builtin_tensor(&self) -> bool {
        self.id == TYPE_TENSOR
    }

    fn discriminant(&self) -> u8 {
        match self.kind {
            DataTypeKind::Primitive(_) => 0,
            DataTypeKind::Array { .. } => 1,
            DataTypeKind::Map { .. } => 2,
            DataTypeKind::WeightedSet { .. } => 3,
            DataTypeKind::Struct(_) => 4,
            DataTypeKind::AnnotationReference { .. } => 5,
            DataTypeKind::DocumentReference { .. } => 6,
            DataTypeKind::Tensor { .. } => 7,
            DataTypeKind::Document(_) => 8,
        }
    }
}

/// Types are equal when id, name and shape class agree.
impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.discriminant() == other.discriminant()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

/// Stable 32-bit id for a type name: first four bytes of its blake3 digest.
pub fn name_hash(name: &str) -> i32 {
    let digest = blake3::hash(name.as_bytes());
    let bytes = digest.as_bytes();
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_stable() {
        assert_eq!(name_hash("music"), name_hash("music"));
        assert_ne!(name_hash("music"), name_hash("books"));
    }

    #[test]
    fn primitive_lookup() {
        assert_eq!(PrimitiveKind::from_name("long"), Some(PrimitiveKind::Long));
        assert_eq!(PrimitiveKind::Short.id(), TYPE_SHORT);
        assert_eq!(PrimitiveKind::from_name("predicate"), None);
    }

    #[test]
    fn equality_uses_id_name_and_shape() {
        let a = DataType::new(7, "x", DataTypeKind::Tensor { spec: "tensor(x[2])".into() });
        let b = DataType::new(7, "x", DataTypeKind::Tensor { spec: "tensor(y[2])".into() });
        let c = DataType::new(7, "x", DataTypeKind::Primitive(PrimitiveKind::Int));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
