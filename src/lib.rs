//! Expandable, searchable tree-table core.
//!
//! The tree lives in immutable [`Model`] snapshots. A [`TreeGrid`] owns the
//! latest snapshot and reconciles it on every tick: requested loads are
//! dispatched to a [`ChildFetcher`], the breadth-first search advances one
//! node, and the head of the background operation queue takes a step.

pub mod config;
pub mod demo;
pub mod error;
pub mod event;
pub mod grid;
pub mod handler;
pub mod ops;
pub mod search;
pub mod source;
pub mod tree;

pub use error::{GridError, Result};
pub use grid::{GridSettings, TreeGrid, VisibleRow};
pub use handler::{handle_action, Action};
pub use source::{ChildFetcher, GridRow};
pub use tree::{LoadingState, Model, Node, NodeKey};
