//! Persistent tree store: keys, nodes with their loading state, and
//! immutable snapshots.

pub mod key;
pub mod model;
pub mod node;

pub use key::NodeKey;
pub use model::Model;
pub use node::{LoadingState, Node};
