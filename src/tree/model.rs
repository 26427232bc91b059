use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{GridError, Result};
use crate::source::GridRow;
use crate::tree::{LoadingState, Node, NodeKey};

/// One immutable snapshot of the whole tree.
///
/// Every mutation returns a new snapshot and leaves `self` untouched. The
/// key map is rebuilt shallowly; node values are shared through `Arc`, so
/// an update to one node never copies unrelated nodes. The generation is
/// bumped on every effective mutation and is what reconciliation watches.
#[derive(Debug, Clone)]
pub struct Model<R> {
    nodes: IndexMap<NodeKey, Arc<Node<R>>>,
    root_id: NodeKey,
    generation: u64,
}

impl<R: GridRow> Default for Model<R> {
    fn default() -> Self {
        Self::create()
    }
}

impl<R: GridRow> Model<R> {
    /// A snapshot holding only the root node.
    pub fn create() -> Self {
        let root = Node::root();
        let root_id = root.key().clone();
        let mut nodes = IndexMap::new();
        nodes.insert(root_id.clone(), Arc::new(root));
        Self {
            nodes,
            root_id,
            generation: 0,
        }
    }

    pub fn root(&self) -> &Arc<Node<R>> {
        self.nodes
            .get(&self.root_id)
            .expect("every snapshot holds its root")
    }

    pub fn root_key(&self) -> &NodeKey {
        &self.root_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up a node. An absent key is a caller error.
    pub fn get(&self, key: &NodeKey) -> Result<&Arc<Node<R>>> {
        self.nodes
            .get(key)
            .ok_or_else(|| GridError::UnknownKey(key.clone()))
    }

    pub fn try_get(&self, key: &NodeKey) -> Option<&Arc<Node<R>>> {
        self.nodes.get(key)
    }

    /// Every node, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node<R>>> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn derive(&self, nodes: IndexMap<NodeKey, Arc<Node<R>>>) -> Self {
        Self {
            nodes,
            root_id: self.root_id.clone(),
            generation: self.generation + 1,
        }
    }

    /// Replace (or insert) the node at `node.key()`.
    ///
    /// Keeping the tree consistent is the caller's job.
    pub fn upsert(&self, node: Node<R>) -> Self {
        self.upsert_many(std::iter::once(node))
    }

    /// Replace several nodes in one commit.
    pub fn upsert_many(&self, nodes: impl IntoIterator<Item = Node<R>>) -> Self {
        let mut iter = nodes.into_iter().peekable();
        if iter.peek().is_none() {
            return self.clone();
        }
        let mut map = self.nodes.clone();
        for node in iter {
            map.insert(node.key().clone(), Arc::new(node));
        }
        self.derive(map)
    }

    /// Append `row` under `parent`.
    ///
    /// Inserting a key that is already among the parent's children returns
    /// the snapshot unchanged.
    pub fn add_child(&self, parent: &NodeKey, row: R) -> Result<Self> {
        let parent = self.get(parent)?;
        let key = row.key();
        if parent.child_ids().contains(&key) {
            return Ok(self.clone());
        }
        if let Some(existing) = self.nodes.get(&key) {
            return Err(GridError::DuplicateKey {
                key,
                existing_parent: existing.parent_id().cloned().unwrap_or(NodeKey::Root),
            });
        }

        let child = Node::child_of(parent, row);
        let parent = parent.with_child(key.clone());

        let mut map = self.nodes.clone();
        map.insert(key, Arc::new(child));
        map.insert(parent.key().clone(), Arc::new(parent));
        Ok(self.derive(map))
    }

    /// `add_child` for each row in order, threading the snapshot through.
    pub fn add_children(&self, parent: &NodeKey, rows: impl IntoIterator<Item = R>) -> Result<Self> {
        let mut model = self.clone();
        for row in rows {
            model = model.add_child(parent, row)?;
        }
        Ok(model)
    }

    /// Keys of every node currently in `state`.
    pub fn keys_in_state(&self, state: LoadingState) -> Vec<NodeKey> {
        self.nodes
            .values()
            .filter(|node| node.loading_state() == state)
            .map(|node| node.key().clone())
            .collect()
    }
}
