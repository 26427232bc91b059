use std::fmt;

use serde::Deserialize;

/// Identity of a node within one tree.
///
/// Rows supply string or integer keys. The synthetic root uses the reserved
/// `Root` variant, which no dataset can produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(untagged)]
pub enum NodeKey {
    #[serde(skip_deserializing)]
    Root,
    Int(i64),
    Str(String),
}

impl NodeKey {
    pub fn is_root(&self) -> bool {
        matches!(self, NodeKey::Root)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Root => f.write_str("<root>"),
            NodeKey::Int(n) => write!(f, "{}", n),
            NodeKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        NodeKey::Str(s.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        NodeKey::Str(s)
    }
}

impl From<i64> for NodeKey {
    fn from(n: i64) -> Self {
        NodeKey::Int(n)
    }
}
