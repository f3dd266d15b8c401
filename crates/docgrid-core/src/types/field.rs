use std::collections::{BTreeMap, HashMap};

use crate::constants::MAX_FIELD_ID;
use crate::types::datatype::TypeIdx;

/// A named, typed slot in a struct or document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) id: u32,
    pub(crate) data_type: TypeIdx,
}

impl Field {
    /// Create a field with an explicit id
    pub fn new(name: impl Into<String>, id: u32, data_type: TypeIdx) -> Self {
        Self { name: name.into(), id, data_type }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field id written in struct field tables
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Type of the field's values
    pub fn data_type(&self) -> TypeIdx {
        self.data_type
    }
}

/// Field id derived from the field name when the config leaves it out.
/// Masked so it fits the 1-2-4 byte field-info encoding.
pub fn field_id_from_name(name: &str) -> u32 {
    let digest = blake3::hash(name.as_bytes());
    let bytes = digest.as_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & MAX_FIELD_ID
}

/// Struct payload of a data type.
///
/// `fields` is the visible field set after inheritance is resolved; the fields
/// declared on this struct alone are kept in `own_fields`.
#[derive(Debug, Clone, Default)]
pub struct StructType {
    pub(crate) own_fields: Vec<Field>,
    pub(crate) inherits: Vec<TypeIdx>,
    pub(crate) fields: BTreeMap<String, Field>,
    pub(crate) by_id: HashMap<u32, String>,
}

impl StructType {
    pub(crate) fn with_fields(own_fields: Vec<Field>) -> Self {
        Self { own_fields, ..Default::default() }
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

    /// Number of visible fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Structs this one inherits from
    pub fn inherits(&self) -> &[TypeIdx] {
        &self.inherits
    }

    /// Fields declared directly on this struct
    pub fn own_fields(&self) -> &[Field] {
        &self.own_fields
    }

    /// Add a resolved field. An identical redeclaration is a no-op; anything
    /// else sharing the name or the id is reported back as the existing field.
    pub(crate) fn add_resolved(&mut self, field: Field) -> Result<(), Field> {
        if let Some(existing) = self.fields.get(&field.name) {
            return if *existing == field { Ok(()) } else { Err(existing.clone()) };
        }
        if let Some(name) = self.by_id.get(&field.id) {
            if let Some(existing) = self.fields.get(name) {
                return Err(existing.clone());
            }
        }
        self.by_id.insert(field.id, field.name.clone());
        self.fields.insert(field.name.clone(), field);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_redeclaration_is_deduplicated() {
        let mut s = StructType::default();
        assert!(s.add_resolved(Field::new("title", 10, TypeIdx(2))).is_ok());
        assert!(s.add_resolved(Field::new("title", 10, TypeIdx(2))).is_ok());
        assert_eq!(s.field_count(), 1);
    }

    #[test]
    fn conflicting_redeclaration_is_rejected() {
        let mut s = StructType::default();
        s.add_resolved(Field::new("title", 10, TypeIdx(2))).unwrap();
        let existing = s.add_resolved(Field::new("title", 10, TypeIdx(3))).unwrap_err();
        assert_eq!(existing.data_type(), TypeIdx(2));
        assert!(s.add_resolved(Field::new("other", 10, TypeIdx(2))).is_err());
    }

    #[test]
    fn derived_field_ids_fit_field_table_encoding() {
        for name in ["title", "body", "a_much_longer_field_name_than_usual"] {
            assert!(field_id_from_name(name) <= MAX_FIELD_ID);
        }
    }
}
