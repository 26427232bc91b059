//! Incremental breadth-first search over a lazily loaded tree.
//!
//! The session advances one queued node per step. A node whose children are
//! not loaded yet holds the queue until they are, so matches are always
//! reported in level order of the expandable subtree.

pub mod matcher;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Result;
use crate::source::GridRow;
use crate::tree::{LoadingState, Model, NodeKey};

pub use matcher::MatchMode;

/// Default delay before a running search is reported as "searching".
pub const DEFAULT_SPINNER_DELAY: Duration = Duration::from_secs(1);

/// What one search step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep {
    /// Nothing to do.
    Idle,
    /// The query changed; the traversal restarted from scratch.
    Reset,
    /// The queue head is still loading.
    Waiting(NodeKey),
    /// The queue head needs its children loaded before it can be visited.
    RequestLoad(NodeKey),
    /// The queue head was visited and dequeued. `reveal` is the first match
    /// of the session, when this visit found it.
    Visited {
        key: NodeKey,
        new_matches: usize,
        reveal: Option<NodeKey>,
    },
}

impl SearchStep {
    /// Whether this step changed the session.
    pub fn changed(&self) -> bool {
        matches!(self, SearchStep::Reset | SearchStep::Visited { .. })
    }
}

/// State of the current search.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    query: String,
    changed: bool,
    queue: VecDeque<NodeKey>,
    started_at: Option<Instant>,
    matches: Vec<NodeKey>,
    selected: Option<usize>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the query. The traversal restarts on the next step.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.changed = true;
    }

    /// Reset to an empty query.
    pub fn clear(&mut self) {
        self.set_query(String::new());
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Keys still waiting to be visited, head first.
    pub fn queue(&self) -> &VecDeque<NodeKey> {
        &self.queue
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Matches in discovery order.
    pub fn matches(&self) -> &[NodeKey] {
        &self.matches
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_key(&self) -> Option<&NodeKey> {
        self.selected.and_then(|i| self.matches.get(i))
    }

    pub fn is_match(&self, key: &NodeKey) -> bool {
        self.matches.contains(key)
    }

    pub fn is_selected_match(&self, key: &NodeKey) -> bool {
        self.selected_key() == Some(key)
    }

    /// "current/total" counter, once something is selected.
    pub fn result_label(&self) -> Option<String> {
        match self.selected {
            Some(i) if !self.matches.is_empty() => {
                Some(format!("{}/{}", i + 1, self.matches.len()))
            }
            _ => None,
        }
    }

    /// True while work remains and the search has been running longer than
    /// `delay`. Fast searches never report as searching.
    pub fn is_searching(&self, now: Instant, delay: Duration) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.started_at
            .is_some_and(|started| now.saturating_duration_since(started) > delay)
    }

    /// Advance the search by one step against `model`.
    ///
    /// `can_load` says whether a fetcher exists; without one an unloaded node
    /// can never gain children and is visited as a leaf.
    pub fn step<R: GridRow>(
        &mut self,
        model: &Model<R>,
        now: Instant,
        can_load: bool,
    ) -> Result<SearchStep> {
        if self.changed {
            self.changed = false;
            self.queue.clear();
            if !self.query.is_empty() {
                self.queue.push_back(model.root_key().clone());
            }
            self.matches.clear();
            self.selected = None;
            self.started_at = Some(now);
            debug!(query = %self.query, "search restarted");
            return Ok(SearchStep::Reset);
        }

        let Some(head) = self.queue.front().cloned() else {
            return Ok(SearchStep::Idle);
        };
        if self.query.is_empty() {
            return Ok(SearchStep::Idle);
        }

        let node = model.get(&head)?;
        match node.loading_state() {
            LoadingState::LoadRequested | LoadingState::Loading => {
                return Ok(SearchStep::Waiting(head));
            }
            LoadingState::NotLoaded if can_load => {
                return Ok(SearchStep::RequestLoad(head));
            }
            LoadingState::NotLoaded | LoadingState::Loaded => {}
        }

        self.queue.pop_front();
        let mut new_matches = 0;
        let mut reveal = None;
        for child_id in node.child_ids() {
            let child = model.get(child_id)?;
            if child.matches_search(&self.query) {
                self.matches.push(child_id.clone());
                new_matches += 1;
                if self.selected.is_none() {
                    self.selected = Some(0);
                    reveal = Some(child_id.clone());
                }
                debug!(key = %child_id, "search match");
            }
            if child.is_expandable() {
                self.queue.push_back(child_id.clone());
            }
        }

        Ok(SearchStep::Visited {
            key: head,
            new_matches,
            reveal,
        })
    }

    /// Move the selection forward; returns the newly selected key.
    pub fn select_next(&mut self) -> Option<NodeKey> {
        let i = self.selected?;
        if i + 1 >= self.matches.len() {
            return None;
        }
        self.selected = Some(i + 1);
        self.matches.get(i + 1).cloned()
    }

    /// Move the selection back; returns the newly selected key.
    pub fn select_prev(&mut self) -> Option<NodeKey> {
        let i = self.selected?;
        if i == 0 {
            return None;
        }
        self.selected = Some(i - 1);
        self.matches.get(i - 1).cloned()
    }
}
