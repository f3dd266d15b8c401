use std::fmt;
use std::str::FromStr;

use crate::types::error::DecodeError;

/// Location modifier of a document id: documents sharing it land in the same bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// `n=<number>`
    Number(u64),
    /// `g=<group>`
    Group(String),
}

/// Document identifier of the form `id:<namespace>:<doctype>:<modifier>:<local id>`.
///
/// The modifier is empty, `n=<u64>` or `g=<group>`. The local id may itself
/// contain colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId {
    raw: String,
    namespace: String,
    doc_type: String,
    location: Option<Location>,
    local: String,
}

impl DocumentId {
    /// Parse a document id string
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let invalid = || DecodeError::InvalidDocumentId(raw.to_string());
        let mut parts = raw.splitn(5, ':');
        if parts.next() != Some("id") {
            return Err(invalid());
        }
        let namespace = parts.next().ok_or_else(invalid)?;
        let doc_type = parts.next().ok_or_else(invalid)?;
        let modifier = parts.next().ok_or_else(invalid)?;
        let local = parts.next().ok_or_else(invalid)?;
        if namespace.is_empty() || doc_type.is_empty() || local.is_empty() {
            return Err(invalid());
        }

        let location = match modifier.split_once('=') {
            None if modifier.is_empty() => None,
            None => return Err(invalid()),
            Some(("n", number)) => Some(Location::Number(number.parse().map_err(|_| invalid())?)),
            Some(("g", group)) if !group.is_empty() => Some(Location::Group(group.to_string())),
            Some(_) => return Err(invalid()),
        };

        Ok(Self {
            raw: raw.to_string(),
            namespace: namespace.to_string(),
            doc_type: doc_type.to_string(),
            location,
            local: local.to_string(),
        })
    }

    /// The id exactly as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Namespace component
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Document type component
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Location modifier, if any
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Local (user-specified) part
    pub fn local_id(&self) -> &str {
        &self.local
    }
}

impl FromStr for DocumentId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_id() {
        let id = DocumentId::parse("id:ns:music::a:b:c").unwrap();
        assert_eq!(id.namespace(), "ns");
        assert_eq!(id.doc_type(), "music");
        assert_eq!(id.location(), None);
        assert_eq!(id.local_id(), "a:b:c");
        assert_eq!(id.to_string(), "id:ns:music::a:b:c");
    }

    #[test]
    fn parses_location_modifiers() {
        let n = DocumentId::parse("id:ns:music:n=1234:x").unwrap();
        assert_eq!(n.location(), Some(&Location::Number(1234)));
        let g = DocumentId::parse("id:ns:music:g=mygroup:x").unwrap();
        assert_eq!(g.location(), Some(&Location::Group("mygroup".into())));
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "doc:ns:music::x", "id:ns:music", "id::music::x", "id:ns:music::", "id:ns:music:n=abc:x", "id:ns:music:q=1:x", "id:ns:music:g=:x"] {
            assert!(DocumentId::parse(bad).is_err(), "{bad} should not parse");
        }
    }
}
