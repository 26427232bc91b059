use crate::error::Result;
use crate::search::SearchSession;
use crate::source::GridRow;
use crate::tree::{LoadingState, Model, Node, NodeKey};

/// A flattened representation of a tree node for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub key: NodeKey,
    pub depth: usize,
    pub expandable: bool,
    pub expanded: bool,
    /// Expanded but children still pending: a "Loading..." placeholder
    /// follows this row.
    pub loading: bool,
    pub is_match: bool,
    pub is_selected_match: bool,
}

/// Depth-first flattening of the expanded part of the tree, root excluded.
///
/// A node's children are listed only once it is expanded and loaded.
pub fn flatten<R: GridRow>(model: &Model<R>, search: &SearchSession) -> Result<Vec<VisibleRow>> {
    let mut rows = Vec::new();
    for child in model.root().child_ids() {
        flatten_node(model, search, model.get(child)?, &mut rows)?;
    }
    Ok(rows)
}

fn flatten_node<R: GridRow>(
    model: &Model<R>,
    search: &SearchSession,
    node: &Node<R>,
    rows: &mut Vec<VisibleRow>,
) -> Result<()> {
    let key = node.key().clone();
    rows.push(VisibleRow {
        depth: node.depth(),
        expandable: node.is_expandable(),
        expanded: node.is_expanded(),
        loading: node.is_expanded() && node.loading_state().is_pending(),
        is_match: search.is_match(&key),
        is_selected_match: search.is_selected_match(&key),
        key,
    });

    if node.is_expanded() && node.loading_state() == LoadingState::Loaded {
        for child in node.child_ids() {
            flatten_node(model, search, model.get(child)?, rows)?;
        }
    }
    Ok(())
}
