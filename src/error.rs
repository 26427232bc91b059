use thiserror::Error;

use crate::tree::NodeKey;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, GridError>;

/// Grid error types.
#[derive(Debug, Error)]
pub enum GridError {
    /// A key that is not present in the current snapshot.
    #[error("Unknown node key: {0}")]
    UnknownKey(NodeKey),

    /// A row key that already lives elsewhere in the tree.
    #[error("Duplicate node key {key} (already a child of {existing_parent})")]
    DuplicateKey {
        key: NodeKey,
        existing_parent: NodeKey,
    },

    /// The grid's event channel closed.
    #[error("Event channel closed")]
    ChannelClosed,

    /// I/O errors while reading a dataset.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed dataset JSON.
    #[error("Dataset error: {0}")]
    Dataset(#[from] serde_json::Error),
}
