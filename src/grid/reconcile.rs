//! Loading-state reconciliation: promote requested nodes and merge fetched
//! children back into the tree.

use tracing::{debug, warn};

use crate::error::{GridError, Result};
use crate::source::GridRow;
use crate::tree::{LoadingState, Model, NodeKey};

/// Result of promoting every `LoadRequested` node to `Loading`.
#[derive(Debug)]
pub struct Promotion<R> {
    /// Snapshot with all promotions applied in one commit.
    pub model: Model<R>,
    /// Rows whose children must now be fetched.
    pub dispatch: Vec<(NodeKey, R)>,
}

/// Move every `LoadRequested` node to `Loading` in a single commit.
pub fn promote_requested<R: GridRow>(model: &Model<R>) -> Promotion<R> {
    let mut updates = Vec::new();
    let mut dispatch = Vec::new();
    for node in model.nodes() {
        if node.loading_state() != LoadingState::LoadRequested {
            continue;
        }
        let Some(row) = node.row() else {
            continue;
        };
        dispatch.push((node.key().clone(), row.clone()));
        updates.push(node.with_loading_state(LoadingState::Loading));
    }

    if !dispatch.is_empty() {
        debug!(count = dispatch.len(), "promoting requested nodes to loading");
    }
    Promotion {
        model: model.upsert_many(updates),
        dispatch,
    }
}

/// Append fetched `rows` under `parent` and mark it `Loaded`.
///
/// Rows whose key already lives elsewhere in the tree are skipped with a
/// warning; the rest still merge.
pub fn merge_children<R: GridRow>(
    model: &Model<R>,
    parent: &NodeKey,
    rows: Vec<R>,
) -> Result<Model<R>> {
    let mut next = model.clone();
    for row in rows {
        match next.add_child(parent, row) {
            Ok(model) => next = model,
            Err(GridError::DuplicateKey {
                key,
                existing_parent,
            }) => {
                warn!(%parent, %key, %existing_parent, "skipping child with duplicate key");
            }
            Err(e) => return Err(e),
        }
    }
    let loaded = next.get(parent)?.with_loading_state(LoadingState::Loaded);
    debug!(%parent, children = loaded.child_ids().len(), "children loaded");
    Ok(next.upsert(loaded))
}
