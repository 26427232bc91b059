use crate::source::GridRow;
use crate::tree::NodeKey;

/// Per-node child-loading state.
///
/// Intended order: `NotLoaded -> LoadRequested -> Loading -> Loaded`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingState {
    /// Children unknown.
    #[default]
    NotLoaded,
    /// Someone asked for the children; no fetch dispatched yet.
    LoadRequested,
    /// Fetch dispatched, awaiting the result.
    Loading,
    /// Children present and authoritative.
    Loaded,
}

impl LoadingState {
    /// Requested or in flight.
    pub fn is_pending(self) -> bool {
        matches!(self, LoadingState::LoadRequested | LoadingState::Loading)
    }
}

/// One immutable tree entry.
///
/// Nodes never change in place; the `with_*` methods return a copy with one
/// field overwritten, which is then committed through `Model::upsert`.
#[derive(Debug, Clone)]
pub struct Node<R> {
    key: NodeKey,
    parent_id: Option<NodeKey>,
    depth: usize,
    row: Option<R>,
    loading_state: LoadingState,
    is_expanded: bool,
    child_ids: Vec<NodeKey>,
    should_scroll: Option<bool>,
}

impl<R> Node<R> {
    /// The synthetic root: loaded, expanded, no row.
    pub(crate) fn root() -> Self {
        Self {
            key: NodeKey::Root,
            parent_id: None,
            depth: 0,
            row: None,
            loading_state: LoadingState::Loaded,
            is_expanded: true,
            child_ids: Vec::new(),
            should_scroll: None,
        }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// `None` only for the root.
    pub fn parent_id(&self) -> Option<&NodeKey> {
        self.parent_id.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// `None` only for the root.
    pub fn row(&self) -> Option<&R> {
        self.row.as_ref()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading_state
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn child_ids(&self) -> &[NodeKey] {
        &self.child_ids
    }

    pub fn should_scroll(&self) -> Option<bool> {
        self.should_scroll
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl<R: Clone> Node<R> {
    pub fn with_loading_state(&self, loading_state: LoadingState) -> Self {
        Self {
            loading_state,
            ..self.clone()
        }
    }

    pub fn with_expanded(&self, is_expanded: bool) -> Self {
        Self {
            is_expanded,
            ..self.clone()
        }
    }

    pub fn with_should_scroll(&self, should_scroll: bool) -> Self {
        Self {
            should_scroll: Some(should_scroll),
            ..self.clone()
        }
    }

    pub(crate) fn with_child(&self, child: NodeKey) -> Self {
        let mut node = self.clone();
        node.child_ids.push(child);
        node
    }
}

impl<R: GridRow> Node<R> {
    /// A fresh, collapsed, not-yet-loaded child of `parent`.
    pub(crate) fn child_of(parent: &Node<R>, row: R) -> Self {
        Self {
            key: row.key(),
            parent_id: Some(parent.key.clone()),
            depth: parent.depth + 1,
            row: Some(row),
            loading_state: LoadingState::NotLoaded,
            is_expanded: false,
            child_ids: Vec::new(),
            should_scroll: None,
        }
    }

    pub fn is_expandable(&self) -> bool {
        self.row.as_ref().is_some_and(GridRow::is_expandable)
    }

    pub fn matches_search(&self, query: &str) -> bool {
        self.row.as_ref().is_some_and(|row| row.matches_search(query))
    }
}
