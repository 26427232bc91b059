//! "Expand all": repeatedly requests every expandable, unloaded node until
//! nothing is left to load or the time budget runs out.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ops::{Operation, OperationId, OperationQueue, StepContext};
use crate::source::GridRow;
use crate::tree::{LoadingState, NodeKey};

/// Default wall-clock budget for one expand-all run.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(5);

pub const LABEL: &str = "expand_all";

#[derive(Debug, Clone)]
pub struct ExpandAllState {
    awaiting: HashSet<NodeKey>,
    started_at: Instant,
    budget: Duration,
}

impl ExpandAllState {
    /// Starts out waiting on `root` so the first step sweeps the tree.
    pub fn new(root: NodeKey, started_at: Instant, budget: Duration) -> Self {
        Self {
            awaiting: HashSet::from([root]),
            started_at,
            budget,
        }
    }

    /// Nodes whose load has been requested but not yet observed as done.
    pub fn awaiting(&self) -> &HashSet<NodeKey> {
        &self.awaiting
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// Enqueue an expand-all run starting at `now`.
pub fn enqueue<R: GridRow>(
    queue: &mut OperationQueue<R>,
    root: NodeKey,
    now: Instant,
    budget: Duration,
) -> OperationId {
    queue.enqueue(LABEL, ExpandAllState::new(root, now, budget), step::<R>)
}

/// One expand-all step.
///
/// Expandable nodes are expanded, and unloaded ones are moved to
/// `LoadRequested`, in a single commit per step.
pub fn step<R: GridRow>(
    op: Operation<ExpandAllState>,
    ctx: &mut StepContext<'_, R>,
) -> Operation<ExpandAllState> {
    let state = op.state();
    if state.awaiting.is_empty() {
        info!(id = %op.id(), "expand all finished");
        return op.mark_done();
    }

    let elapsed = ctx.now().saturating_duration_since(state.started_at);
    if elapsed > state.budget {
        info!(
            id = %op.id(),
            remaining = state.awaiting.len(),
            "expand all gave up after {:?}",
            state.budget
        );
        return op.mark_done();
    }

    let model = ctx.model();
    let mut awaiting: HashSet<NodeKey> = state
        .awaiting
        .iter()
        .filter(|key| {
            model
                .try_get(key)
                .is_some_and(|node| node.loading_state() != LoadingState::Loaded)
        })
        .cloned()
        .collect();

    let mut updates = Vec::new();
    for node in model.nodes() {
        if !node.is_expandable() {
            continue;
        }
        let request = ctx.can_load()
            && node.loading_state() == LoadingState::NotLoaded
            && !awaiting.contains(node.key());
        if request {
            awaiting.insert(node.key().clone());
            updates.push(
                node.with_expanded(true)
                    .with_loading_state(LoadingState::LoadRequested),
            );
        } else if !node.is_expanded() {
            updates.push(node.with_expanded(true));
        }
    }

    debug!(
        id = %op.id(),
        awaiting = awaiting.len(),
        updated = updates.len(),
        "expand all step"
    );
    let next = model.upsert_many(updates);
    ctx.commit(next);

    let started_at = state.started_at;
    let budget = state.budget;
    if awaiting.is_empty() {
        info!(id = %op.id(), "expand all finished");
        op.mark_done()
    } else {
        op.with_state(ExpandAllState {
            awaiting,
            started_at,
            budget,
        })
    }
}
