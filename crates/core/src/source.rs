//! Source-side data model
//!
//! Types describing iRODS data objects and collections as seen by the
//! engine: transferable leaves, tree nodes and descriptive AVU metadata.

use std::collections::BTreeMap;

/// Delimiter between multiple values of the same attribute
pub const VALUE_DELIMITER: &str = "; ";

/// Delimiter between a value and its unit
pub const UNIT_DELIMITER: &str = " ";

/// Content digest algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

/// A content digest with its algorithm
///
/// Source and destination may use different algorithms; comparison is only
/// meaningful when both sides agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: DigestAlgorithm,
    pub bytes: Vec<u8>,
}

impl Digest {
    /// Decode a hex digest string; empty or undecodable input yields `None`
    pub fn from_hex(algorithm: DigestAlgorithm, hex_str: &str) -> Option<Self> {
        if hex_str.is_empty() {
            return None;
        }

        hex::decode(hex_str)
            .ok()
            .map(|bytes| Self { algorithm, bytes })
    }
}

/// A transferable unit from the source tree: one iRODS data object
///
/// Leaves are read-only snapshots taken at expansion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLeaf {
    /// Absolute iRODS path
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Content digest, when the storage layout supports one
    pub digest: Option<Digest>,
}

impl SourceLeaf {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            digest: None,
        }
    }

    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }
}

/// A resolved source reference: either a data object or a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceNode {
    Leaf(SourceLeaf),
    Collection(String),
}

impl SourceNode {
    /// Absolute iRODS path of the node
    pub fn path(&self) -> &str {
        match self {
            SourceNode::Leaf(leaf) => &leaf.path,
            SourceNode::Collection(path) => path,
        }
    }
}

/// An attribute/value/optional-unit triple attached to a data object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avu {
    pub attribute: String,
    pub value: String,
    pub unit: Option<String>,
}

impl Avu {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Collapse AVUs into one human-readable string per attribute
///
/// Each value has its unit appended with [`UNIT_DELIMITER`]; multiple values
/// of the same attribute are joined with [`VALUE_DELIMITER`], in input order.
/// An empty AVU list collapses to an empty map.
pub fn collapse_avus(avus: &[Avu]) -> BTreeMap<String, String> {
    let mut collapsed: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for avu in avus {
        let value = match &avu.unit {
            Some(unit) => format!("{}{}{}", avu.value, UNIT_DELIMITER, unit),
            None => avu.value.clone(),
        };
        collapsed.entry(avu.attribute.clone()).or_default().push(value);
    }

    collapsed
        .into_iter()
        .map(|(key, values)| (key, values.join(VALUE_DELIMITER)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_avus() {
        let avus = vec![
            Avu::new("project", "X"),
            Avu::new("owner", "alice").with_unit("lab1"),
            Avu::new("owner", "bob"),
        ];

        let collapsed = collapse_avus(&avus);
        assert_eq!(collapsed["project"], "X");
        assert_eq!(collapsed["owner"], "alice lab1; bob");
        assert_eq!(collapsed.len(), 2);
    }

    #[test]
    fn test_collapse_empty() {
        assert!(collapse_avus(&[]).is_empty());
    }

    #[test]
    fn test_digest_from_hex() {
        let digest = Digest::from_hex(DigestAlgorithm::Md5, "d41d8cd98f00b204e9800998ecf8427e")
            .expect("valid hex");
        assert_eq!(digest.algorithm, DigestAlgorithm::Md5);
        assert_eq!(digest.bytes.len(), 16);

        assert!(Digest::from_hex(DigestAlgorithm::Md5, "").is_none());
        assert!(Digest::from_hex(DigestAlgorithm::Md5, "not-hex").is_none());
    }

    #[test]
    fn test_source_node_path() {
        let leaf = SourceNode::Leaf(SourceLeaf::new("/zone/data.cram", 42));
        assert_eq!(leaf.path(), "/zone/data.cram");

        let coll = SourceNode::Collection("/zone/project".to_string());
        assert_eq!(coll.path(), "/zone/project");
    }
}
