//! Document type configuration records
//!
//! A flat list of document type entries. Every declared type carries an `idx`
//! that is unique across the whole config; cross references are by `idx`.
//! `internalid` is the public numeric id; `-1` means "hash the name".

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::error::{RepoError, RepoResult};
use crate::{log_debug, log_info};

/// Sentinel for "no id configured" / "no type"
pub const NO_ID: i32 = -1;

fn no_id() -> i32 {
    NO_ID
}

/// Root of the document type configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumenttypesConfig {
    /// Document type entries
    pub doctype: Vec<DoctypeConfig>,
}

/// One document type and every type it declares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Document type name
    pub name: String,
    /// Public id
    pub internalid: i32,
    /// Inherited document types by idx
    pub inherits: Vec<i32>,
    /// Content struct by idx
    pub contentstruct: i32,
    /// Named field sets
    pub fieldsets: BTreeMap<String, Vec<String>>,
    /// Imported field names
    pub importedfield: Vec<String>,
    /// Builtin types used by this document, bound to an idx
    pub primitivetype: Vec<PrimitiveTypeConfig>,
    /// Array types
    pub arraytype: Vec<ArrayTypeConfig>,
    /// Map types
    pub maptype: Vec<MapTypeConfig>,
    /// Weighted set types
    pub wsettype: Vec<WsetTypeConfig>,
    /// Struct types
    pub structtype: Vec<StructTypeConfig>,
    /// Annotation types
    pub annotationtype: Vec<AnnotationTypeConfig>,
    /// Annotation reference types
    pub annotationref: Vec<AnnotationRefConfig>,
    /// Document reference types
    pub documentref: Vec<DocumentRefConfig>,
    /// Tensor types
    pub tensortype: Vec<TensorTypeConfig>,
}

impl Default for DoctypeConfig {
    fn default() -> Self {
        Self {
            idx: NO_ID,
            name: String::new(),
            internalid: NO_ID,
            inherits: Vec::new(),
            contentstruct: NO_ID,
            fieldsets: BTreeMap::new(),
            importedfield: Vec::new(),
            primitivetype: Vec::new(),
            arraytype: Vec::new(),
            maptype: Vec::new(),
            wsettype: Vec::new(),
            structtype: Vec::new(),
            annotationtype: Vec::new(),
            annotationref: Vec::new(),
            documentref: Vec::new(),
            tensortype: Vec::new(),
        }
    }
}

/// Binds a builtin type name to an idx
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Builtin name (`int`, `string`, `tag`, `tensor`, ...)
    pub name: String,
}

/// Array type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Element type idx
    pub elementtype: i32,
    /// Public id
    #[serde(default = "no_id")]
    pub internalid: i32,
}

/// Map type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Key type idx
    pub keytype: i32,
    /// Value type idx
    pub valuetype: i32,
    /// Public id
    #[serde(default = "no_id")]
    pub internalid: i32,
}

/// Weighted set type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsetTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Element type idx
    pub elementtype: i32,
    /// Remove entries reaching weight zero
    #[serde(default)]
    pub removeifzero: bool,
    /// Create missing entries on increment
    #[serde(default)]
    pub createifnonexistent: bool,
    /// Public id
    #[serde(default = "no_id")]
    pub internalid: i32,
}

/// Struct type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Struct name
    pub name: String,
    /// Public id
    #[serde(default = "no_id")]
    pub internalid: i32,
    /// Inherited structs by idx
    #[serde(default)]
    pub inherits: Vec<i32>,
    /// Declared fields
    #[serde(default)]
    pub field: Vec<StructFieldConfig>,
}

/// Field of a struct type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructFieldConfig {
    /// Field name
    pub name: String,
    /// Field id; `-1` derives it from the name
    #[serde(default = "no_id")]
    pub internalid: i32,
    /// Field type idx
    #[serde(rename = "type")]
    pub type_idx: i32,
}

/// Annotation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Annotation type name
    pub name: String,
    /// Public id
    #[serde(default = "no_id")]
    pub internalid: i32,
    /// Payload type idx, `-1` for none
    #[serde(default = "no_id")]
    pub datatype: i32,
    /// Inherited annotation types by idx
    #[serde(default)]
    pub inherits: Vec<i32>,
}

/// Annotation reference type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRefConfig {
    /// Config-local index
    pub idx: i32,
    /// Referenced annotation type idx
    pub annotationtype: i32,
}

/// Document reference type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRefConfig {
    /// Config-local index
    pub idx: i32,
    /// Target document type idx
    pub targettype: i32,
    /// Public id
    #[serde(default = "no_id")]
    pub internalid: i32,
}

/// Tensor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorTypeConfig {
    /// Config-local index
    pub idx: i32,
    /// Tensor type spec
    pub detailedtype: String,
}

impl DocumenttypesConfig {
    /// Load from a `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RepoError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents)?,
            _ => Self::from_json_str(&contents)?,
        };
        log_info!("Loaded {} document types from {}", config.doctype.len(), path.display());
        Ok(config)
    }

    /// Parse JSON config
    pub fn from_json_str(contents: &str) -> RepoResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| RepoError::config(format!("Failed to parse document type config: {}", e)))
    }

    /// Parse TOML config
    pub fn from_toml_str(contents: &str) -> RepoResult<Self> {
        toml::from_str(contents)
            .map_err(|e| RepoError::config(format!("Failed to parse document type config: {}", e)))
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> RepoResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RepoError::config(format!("Failed to serialize document type config: {}", e)))
    }

    /// Look up a document type entry by name
    pub fn doctype(&self, name: &str) -> Option<&DoctypeConfig> {
        let found = self.doctype.iter().find(|d| d.name == name);
        if found.is_none() {
            log_debug!("No document type '{}' in config", name);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults_fill_missing_ids() {
        let json = r#"{
            "doctype": [{
                "idx": 1, "name": "music", "internalid": 42, "contentstruct": 2,
                "structtype": [{"idx": 2, "name": "music.header",
                                "field": [{"name": "title", "type": 3}]}],
                "primitivetype": [{"idx": 3, "name": "string"}]
            }]
        }"#;
        let config = DocumenttypesConfig::from_json_str(json).unwrap();
        let doc = config.doctype("music").unwrap();
        assert_eq!(doc.internalid, 42);
        assert_eq!(doc.structtype[0].internalid, NO_ID);
        assert_eq!(doc.structtype[0].field[0].internalid, NO_ID);
        assert!(doc.inherits.is_empty());
    }

    #[test]
    fn toml_and_json_agree() {
        let toml_src = r#"
            [[doctype]]
            idx = 1
            name = "music"
            internalid = 42
            contentstruct = 2

            [[doctype.structtype]]
            idx = 2
            name = "music.header"
            internalid = 30
        "#;
        let from_toml = DocumenttypesConfig::from_toml_str(toml_src).unwrap();
        let json = from_toml.to_json_string().unwrap();
        assert_eq!(DocumenttypesConfig::from_json_str(&json).unwrap(), from_toml);
    }

    #[test]
    fn garbage_is_a_config_error() {
        assert!(matches!(
            DocumenttypesConfig::from_json_str("{not json"),
            Err(RepoError::Config(_))
        ));
    }
}
