use tracing::debug;

use crate::error::Result;
use crate::grid::TreeGrid;
use crate::source::GridRow;
use crate::tree::NodeKey;

/// A user-driven transition on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Expand(NodeKey),
    Collapse(NodeKey),
    Toggle(NodeKey),
    SetSearchText(String),
    NextResult,
    PrevResult,
    ClearSearch,
    ExpandAll,
    CollapseAll,
}

/// Apply an action, then settle the grid.
pub fn handle_action<R: GridRow>(grid: &mut TreeGrid<R>, action: Action) -> Result<()> {
    debug!(?action, "handle action");
    match action {
        Action::Expand(key) => grid.expand(&key)?,
        Action::Collapse(key) => grid.collapse(&key)?,
        Action::Toggle(key) => {
            grid.toggle(&key)?;
        }
        Action::SetSearchText(text) => grid.set_search_text(text),
        Action::NextResult => {
            grid.next_result()?;
        }
        Action::PrevResult => {
            grid.prev_result()?;
        }
        Action::ClearSearch => grid.clear_search(),
        Action::ExpandAll => {
            grid.expand_all();
        }
        Action::CollapseAll => grid.collapse_all(),
    }
    grid.settle()
}
