//! The grid controller: owns the latest snapshot, the search session and
//! the operation queue, and drives them to convergence on every tick.

pub mod reconcile;
pub mod visible;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::event::{EventHandler, GridEvent, DEFAULT_TICK_RATE};
use crate::ops::{expand_all, OperationId, OperationQueue, StepContext};
use crate::search::{SearchSession, SearchStep, DEFAULT_SPINNER_DELAY};
use crate::source::{ChildFetcher, GridRow};
use crate::tree::{LoadingState, Model, Node, NodeKey};

pub use visible::VisibleRow;

/// Timing and startup knobs for a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSettings {
    /// Expand every first-generation row when the grid is created.
    pub expand_first_generation: bool,
    /// How long a search must run before it reports as searching.
    pub spinner_delay: Duration,
    /// Wall-clock budget for one expand-all run.
    pub expand_all_budget: Duration,
    /// Idle tick interval while waiting on fetches.
    pub tick_rate: Duration,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            expand_first_generation: true,
            spinner_delay: DEFAULT_SPINNER_DELAY,
            expand_all_budget: expand_all::DEFAULT_BUDGET,
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

/// Main grid state.
pub struct TreeGrid<R: GridRow> {
    model: Model<R>,
    search: SearchSession,
    operations: OperationQueue<R>,
    fetcher: Option<Arc<dyn ChildFetcher<R>>>,
    in_flight: HashSet<NodeKey>,
    events: EventHandler<R>,
    settings: GridSettings,
}

impl<R: GridRow> TreeGrid<R> {
    /// Create a grid whose root holds `rows`.
    pub fn new(
        rows: Vec<R>,
        fetcher: Option<Arc<dyn ChildFetcher<R>>>,
        settings: GridSettings,
    ) -> Result<Self> {
        let model = Model::create().add_children(&NodeKey::Root, rows)?;
        let mut grid = Self {
            model,
            search: SearchSession::new(),
            operations: OperationQueue::new(),
            fetcher,
            in_flight: HashSet::new(),
            events: EventHandler::new(settings.tick_rate),
            settings,
        };

        if grid.settings.expand_first_generation {
            let first: Vec<NodeKey> = grid
                .model
                .root()
                .child_ids()
                .iter()
                .filter(|k| grid.model.try_get(k).is_some_and(|n| n.is_expandable()))
                .cloned()
                .collect();
            for key in &first {
                grid.expand(key)?;
            }
        }
        Ok(grid)
    }

    // ── Read-only accessors ─────────────────────────────────────────────

    pub fn model(&self) -> &Model<R> {
        &self.model
    }

    pub fn search(&self) -> &SearchSession {
        &self.search
    }

    pub fn operations(&self) -> &OperationQueue<R> {
        &self.operations
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Whether a child fetcher is configured.
    pub fn can_load(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Keys whose fetch has been dispatched and not yet reported back.
    pub fn in_flight(&self) -> &HashSet<NodeKey> {
        &self.in_flight
    }

    /// The expanded part of the tree, flattened for presentation.
    pub fn visible_rows(&self) -> Result<Vec<VisibleRow>> {
        visible::flatten(&self.model, &self.search)
    }

    /// Whether the search spinner should show.
    pub fn is_searching(&self) -> bool {
        self.is_searching_at(Instant::now())
    }

    pub fn is_searching_at(&self, now: Instant) -> bool {
        self.search.is_searching(now, self.settings.spinner_delay)
    }

    /// Nothing in flight, nothing requested, nothing queued.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
            && self.operations.is_empty()
            && self.search.queue().is_empty()
            && !self.search.is_changed()
            && self
                .model
                .keys_in_state(LoadingState::LoadRequested)
                .is_empty()
    }

    fn commit(&mut self, node: Node<R>) {
        self.model = self.model.upsert(node);
    }

    // ── Expansion ───────────────────────────────────────────────────────

    /// Expand a node, requesting its children if they were never loaded.
    pub fn expand(&mut self, key: &NodeKey) -> Result<()> {
        let node = self.model.get(key)?;
        let mut next = node.with_expanded(true);
        if node.loading_state() == LoadingState::NotLoaded && self.can_load() {
            next = next.with_loading_state(LoadingState::LoadRequested);
        }
        debug!(%key, "expand");
        self.commit(next);
        Ok(())
    }

    /// Collapse a node. Loaded children stay cached.
    pub fn collapse(&mut self, key: &NodeKey) -> Result<()> {
        let next = self.model.get(key)?.with_expanded(false);
        debug!(%key, "collapse");
        self.commit(next);
        Ok(())
    }

    /// Flip expansion, ignored while the node's children are pending.
    pub fn toggle(&mut self, key: &NodeKey) -> Result<bool> {
        let node = self.model.get(key)?;
        if node.loading_state().is_pending() {
            return Ok(false);
        }
        if node.is_expanded() {
            self.collapse(key)?;
        } else {
            self.expand(key)?;
        }
        Ok(true)
    }

    /// Request children without touching expansion.
    pub fn load_children(&mut self, key: &NodeKey) -> Result<bool> {
        let node = self.model.get(key)?;
        if node.loading_state() != LoadingState::NotLoaded || !self.can_load() {
            return Ok(false);
        }
        let next = node.with_loading_state(LoadingState::LoadRequested);
        debug!(%key, "load requested");
        self.commit(next);
        Ok(true)
    }

    /// Flag a node for scrolling and expand all of its ancestors, in one
    /// commit.
    pub fn ensure_visible(&mut self, key: &NodeKey) -> Result<()> {
        let node = self.model.get(key)?;
        let mut updates = vec![node.with_should_scroll(true)];
        let mut parent = node.parent_id().cloned();
        while let Some(parent_key) = parent {
            let ancestor = self.model.get(&parent_key)?;
            if !ancestor.is_expanded() {
                updates.push(ancestor.with_expanded(true));
            }
            parent = ancestor.parent_id().cloned();
        }
        self.model = self.model.upsert_many(updates);
        Ok(())
    }

    /// Keys flagged for scrolling since the last call. The flags are
    /// cleared in one commit.
    pub fn take_scroll_targets(&mut self) -> Vec<NodeKey> {
        let flagged: Vec<Node<R>> = self
            .model
            .nodes()
            .filter(|n| n.should_scroll() == Some(true))
            .map(|n| n.with_should_scroll(false))
            .collect();
        let keys = flagged.iter().map(|n| n.key().clone()).collect();
        self.model = self.model.upsert_many(flagged);
        keys
    }

    /// Collapse every expanded node below the root.
    pub fn collapse_all(&mut self) {
        let updates: Vec<Node<R>> = self
            .model
            .nodes()
            .filter(|n| !n.is_root() && n.is_expanded())
            .map(|n| n.with_expanded(false))
            .collect();
        debug!(count = updates.len(), "collapse all");
        self.model = self.model.upsert_many(updates);
    }

    /// Queue an expand-all run.
    pub fn expand_all(&mut self) -> OperationId {
        expand_all::enqueue(
            &mut self.operations,
            self.model.root_key().clone(),
            Instant::now(),
            self.settings.expand_all_budget,
        )
    }

    // ── Search ──────────────────────────────────────────────────────────

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search.set_query(text);
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
    }

    /// Select the next match and bring it into view.
    pub fn next_result(&mut self) -> Result<bool> {
        match self.search.select_next() {
            Some(key) => {
                self.ensure_visible(&key)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Select the previous match and bring it into view.
    pub fn prev_result(&mut self) -> Result<bool> {
        match self.search.select_prev() {
            Some(key) => {
                self.ensure_visible(&key)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Reconciliation ──────────────────────────────────────────────────

    /// One reactive pass at the current time.
    pub fn tick(&mut self) -> Result<bool> {
        self.tick_at(Instant::now())
    }

    /// One reactive pass: promote and dispatch loads, step the search, step
    /// the head operation. Returns whether anything changed.
    pub fn tick_at(&mut self, now: Instant) -> Result<bool> {
        let generation = self.model.generation();
        let can_load = self.can_load();

        if can_load {
            match Handle::try_current() {
                Ok(runtime) => {
                    let promotion = reconcile::promote_requested(&self.model);
                    self.model = promotion.model;
                    for (key, row) in promotion.dispatch {
                        self.dispatch(&runtime, key, row);
                    }
                }
                Err(_) => {
                    let requested = self.model.keys_in_state(LoadingState::LoadRequested);
                    if !requested.is_empty() {
                        warn!(
                            count = requested.len(),
                            "no tokio runtime; requested loads stay pending"
                        );
                    }
                }
            }
        }

        let step = self.search.step(&self.model, now, can_load)?;
        let mut changed = step.changed();
        match step {
            SearchStep::RequestLoad(key) => {
                self.load_children(&key)?;
            }
            SearchStep::Visited {
                reveal: Some(key), ..
            } => self.ensure_visible(&key)?,
            _ => {}
        }

        let mut ctx = StepContext::new(&mut self.model, now, can_load);
        changed |= self.operations.advance(&mut ctx).changed();

        Ok(changed || self.model.generation() != generation)
    }

    /// Tick until a pass changes nothing.
    pub fn settle(&mut self) -> Result<()> {
        self.settle_at(Instant::now())
    }

    pub fn settle_at(&mut self, now: Instant) -> Result<()> {
        let mut passes = 0usize;
        while self.tick_at(now)? {
            passes += 1;
        }
        if passes > 0 {
            debug!(passes, generation = self.model.generation(), "settled");
        }
        Ok(())
    }

    /// Apply one event, then settle.
    pub fn handle_event(&mut self, event: GridEvent<R>) -> Result<()> {
        match event {
            GridEvent::ChildrenLoaded { key, rows } => {
                self.in_flight.remove(&key);
                match rows {
                    Some(rows) => {
                        self.model = reconcile::merge_children(&self.model, &key, rows)?;
                    }
                    None => warn!(%key, "fetch returned nothing; node stays loading"),
                }
            }
            GridEvent::FetchFailed { key, reason } => {
                self.in_flight.remove(&key);
                warn!(%key, %reason, "fetch failed; node stays loading");
            }
            GridEvent::Tick => {}
        }
        self.settle()
    }

    /// Settle and process events until idle or until `limit` elapses.
    ///
    /// Returns `false` if the limit was hit first, e.g. because a fetch
    /// never resolved.
    pub async fn run_until_idle(&mut self, limit: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + limit;
        self.settle()?;
        while !self.is_idle() {
            let event = match tokio::time::timeout_at(deadline, self.events.next()).await {
                Ok(event) => event?,
                Err(_) => return Ok(false),
            };
            self.handle_event(event)?;
        }
        Ok(true)
    }

    fn dispatch(&mut self, runtime: &Handle, key: NodeKey, row: R) {
        let Some(fetcher) = self.fetcher.clone() else {
            return;
        };
        let tx = self.events.sender();
        self.in_flight.insert(key.clone());
        debug!(%key, "dispatching fetch");

        runtime.spawn(async move {
            // Run the fetch in its own task so a panic surfaces as a JoinError.
            let fetch = tokio::spawn(async move { fetcher.fetch_children(&row).await });
            let event = match fetch.await {
                Ok(rows) => GridEvent::ChildrenLoaded { key, rows },
                Err(e) => GridEvent::FetchFailed {
                    key,
                    reason: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{manager, person, Person, TableFetcher};

    const LIMIT: Duration = Duration::from_secs(2);

    fn key(s: &str) -> NodeKey {
        NodeKey::from(s)
    }

    fn lazy_grid(fetcher: TableFetcher, rows: Vec<Person>) -> TreeGrid<Person> {
        TreeGrid::new(rows, Some(Arc::new(fetcher)), GridSettings::default()).unwrap()
    }

    fn static_grid(rows: Vec<Person>) -> TreeGrid<Person> {
        let settings = GridSettings {
            expand_first_generation: false,
            ..Default::default()
        };
        TreeGrid::new(rows, None, settings).unwrap()
    }

    #[test]
    fn first_generation_is_requested_on_create() {
        let grid = lazy_grid(
            TableFetcher::default(),
            vec![manager("jane", "Jane"), person("ann", "Ann")],
        );
        let jane = grid.model().get(&key("jane")).unwrap();
        assert!(jane.is_expanded());
        assert_eq!(jane.loading_state(), LoadingState::LoadRequested);
    }

    #[test]
    fn expand_without_fetcher_only_expands() {
        let mut grid = static_grid(vec![manager("jane", "Jane")]);
        grid.expand(&key("jane")).unwrap();
        let jane = grid.model().get(&key("jane")).unwrap();
        assert!(jane.is_expanded());
        assert_eq!(jane.loading_state(), LoadingState::NotLoaded);
        assert!(!grid.load_children(&key("jane")).unwrap());
    }

    #[test]
    fn expand_is_a_single_commit() {
        let settings = GridSettings {
            expand_first_generation: false,
            ..Default::default()
        };
        let mut grid = TreeGrid::new(
            vec![manager("jane", "Jane")],
            Some(Arc::new(TableFetcher::default()) as Arc<dyn ChildFetcher<Person>>),
            settings,
        )
        .unwrap();
        let before = grid.model().generation();
        grid.expand(&key("jane")).unwrap();
        assert_eq!(grid.model().generation(), before + 1);
        let jane = grid.model().get(&key("jane")).unwrap();
        assert!(jane.is_expanded());
        assert_eq!(jane.loading_state(), LoadingState::LoadRequested);
    }

    #[test]
    fn unknown_keys_fail_loudly() {
        let mut grid = static_grid(vec![person("ann", "Ann")]);
        assert!(grid.expand(&key("ghost")).is_err());
        assert!(grid.collapse(&key("ghost")).is_err());
        assert!(grid.ensure_visible(&key("ghost")).is_err());
    }

    #[tokio::test]
    async fn fetch_results_merge_and_mark_loaded() {
        let fetcher = TableFetcher::default()
            .with("jane", vec![manager("joe", "Joe"), person("bob", "Billy Bob")]);
        let mut grid = lazy_grid(fetcher, vec![manager("jane", "Jane")]);

        assert!(grid.run_until_idle(LIMIT).await.unwrap());
        let jane = grid.model().get(&key("jane")).unwrap();
        assert_eq!(jane.loading_state(), LoadingState::Loaded);
        assert_eq!(jane.child_ids(), &[key("joe"), key("bob")]);

        let keys: Vec<_> = grid
            .visible_rows()
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec![key("jane"), key("joe"), key("bob")]);
    }

    #[tokio::test]
    async fn none_result_leaves_node_loading() {
        let mut grid = lazy_grid(TableFetcher::default(), vec![manager("jane", "Jane")]);
        assert!(grid.run_until_idle(LIMIT).await.unwrap());
        let jane = grid.model().get(&key("jane")).unwrap();
        assert_eq!(jane.loading_state(), LoadingState::Loading);
        assert!(grid.visible_rows().unwrap()[0].loading);
    }

    #[tokio::test]
    async fn promotion_dispatches_each_node_once() {
        let fetcher = TableFetcher::default()
            .with("jane", vec![person("joe", "Joe")])
            .with("mo", vec![person("lu", "Lu")]);
        let mut grid = lazy_grid(fetcher, vec![manager("jane", "Jane"), manager("mo", "Mo")]);

        grid.tick().unwrap();
        assert_eq!(grid.in_flight().len(), 2);
        for k in ["jane", "mo"] {
            assert_eq!(
                grid.model().get(&key(k)).unwrap().loading_state(),
                LoadingState::Loading
            );
        }
        grid.tick().unwrap();
        assert_eq!(grid.in_flight().len(), 2);

        assert!(grid.run_until_idle(LIMIT).await.unwrap());
        assert_eq!(grid.model().len(), 5);
    }

    #[tokio::test]
    async fn search_loads_hidden_subtree_and_reveals_match() {
        let fetcher = TableFetcher::default()
            .with("jane", vec![manager("joe", "Joe")])
            .with("joe", vec![person("bob", "Billy Bob")]);
        let settings = GridSettings {
            expand_first_generation: false,
            ..Default::default()
        };
        let mut grid = TreeGrid::new(
            vec![manager("jane", "Jane")],
            Some(Arc::new(fetcher) as Arc<dyn ChildFetcher<Person>>),
            settings,
        )
        .unwrap();

        grid.set_search_text("bob");
        assert!(grid.run_until_idle(LIMIT).await.unwrap());

        assert_eq!(grid.search().matches(), &[key("bob")]);
        assert_eq!(grid.search().selected(), Some(0));
        assert_eq!(grid.search().result_label().as_deref(), Some("1/1"));

        let bob = grid.model().get(&key("bob")).unwrap();
        assert_eq!(bob.should_scroll(), Some(true));
        for ancestor in ["jane", "joe"] {
            let node = grid.model().get(&key(ancestor)).unwrap();
            assert!(node.is_expanded());
            assert_eq!(node.loading_state(), LoadingState::Loaded);
        }

        assert_eq!(grid.take_scroll_targets(), vec![key("bob")]);
        assert_eq!(
            grid.model().get(&key("bob")).unwrap().should_scroll(),
            Some(false)
        );
        assert!(grid.take_scroll_targets().is_empty());
    }

    #[tokio::test]
    async fn expand_all_gives_up_on_stalled_fetch() {
        let fetcher = TableFetcher::default().stall("jane");
        let settings = GridSettings {
            expand_first_generation: false,
            ..Default::default()
        };
        let mut grid = TreeGrid::new(
            vec![manager("jane", "Jane")],
            Some(Arc::new(fetcher) as Arc<dyn ChildFetcher<Person>>),
            settings,
        )
        .unwrap();

        grid.expand_all();
        grid.settle().unwrap();
        assert_eq!(grid.operations().len(), 1);
        assert_eq!(
            grid.model().get(&key("jane")).unwrap().loading_state(),
            LoadingState::Loading
        );

        grid.settle_at(Instant::now() + Duration::from_secs(6)).unwrap();
        assert!(grid.operations().is_empty());
        assert_eq!(
            grid.model().get(&key("jane")).unwrap().loading_state(),
            LoadingState::Loading
        );
    }

    #[tokio::test]
    async fn expand_all_loads_whole_tree() {
        let fetcher = TableFetcher::default()
            .with("jane", vec![manager("joe", "Joe"), person("ann", "Ann")])
            .with("joe", vec![person("bob", "Bob")]);
        let settings = GridSettings {
            expand_first_generation: false,
            ..Default::default()
        };
        let mut grid = TreeGrid::new(
            vec![manager("jane", "Jane")],
            Some(Arc::new(fetcher) as Arc<dyn ChildFetcher<Person>>),
            settings,
        )
        .unwrap();

        grid.expand_all();
        assert!(grid.run_until_idle(LIMIT).await.unwrap());
        let keys: Vec<_> = grid
            .visible_rows()
            .unwrap()
            .into_iter()
            .map(|r| r.key.to_string())
            .collect();
        assert_eq!(keys, vec!["jane", "joe", "bob", "ann"]);
    }

    #[test]
    fn navigation_at_boundaries_is_noop() {
        let mut grid = static_grid(vec![person("bob1", "Bob"), person("bob2", "Bobby")]);
        grid.set_search_text("bob");
        grid.settle().unwrap();
        assert_eq!(grid.search().matches().len(), 2);
        assert_eq!(grid.search().selected(), Some(0));

        let generation = grid.model().generation();
        assert!(!grid.prev_result().unwrap());
        assert_eq!(grid.search().selected(), Some(0));
        assert_eq!(grid.model().generation(), generation);

        assert!(grid.next_result().unwrap());
        assert_eq!(grid.search().selected(), Some(1));
        assert_eq!(
            grid.model().get(&key("bob2")).unwrap().should_scroll(),
            Some(true)
        );

        let generation = grid.model().generation();
        assert!(!grid.next_result().unwrap());
        assert_eq!(grid.search().selected(), Some(1));
        assert_eq!(grid.model().generation(), generation);
    }

    #[test]
    fn clear_search_empties_session() {
        let mut grid = static_grid(vec![person("bob", "Bob")]);
        grid.set_search_text("bob");
        grid.settle().unwrap();
        assert_eq!(grid.search().matches().len(), 1);

        grid.clear_search();
        grid.settle().unwrap();
        assert!(grid.search().matches().is_empty());
        assert_eq!(grid.search().selected(), None);
        assert!(grid.search().queue().is_empty());
        assert!(grid.is_idle());
    }

    #[test]
    fn toggle_and_collapse_all() {
        let mut grid = static_grid(vec![manager("jane", "Jane"), manager("mo", "Mo")]);
        assert!(grid.toggle(&key("jane")).unwrap());
        assert!(grid.model().get(&key("jane")).unwrap().is_expanded());
        assert!(grid.toggle(&key("jane")).unwrap());
        assert!(!grid.model().get(&key("jane")).unwrap().is_expanded());

        grid.expand(&key("jane")).unwrap();
        grid.expand(&key("mo")).unwrap();
        grid.collapse_all();
        assert!(grid.model().nodes().filter(|n| !n.is_root()).all(|n| !n.is_expanded()));
        assert!(grid.model().root().is_expanded());
    }

    #[tokio::test]
    async fn spinner_honors_configured_delay() {
        let settings = GridSettings {
            expand_first_generation: false,
            spinner_delay: Duration::from_secs(3),
            ..Default::default()
        };
        let mut grid = TreeGrid::new(
            vec![manager("jane", "Jane")],
            Some(Arc::new(TableFetcher::default().stall("jane")) as Arc<dyn ChildFetcher<Person>>),
            settings,
        )
        .unwrap();

        let t0 = Instant::now();
        grid.set_search_text("zed");
        grid.settle_at(t0).unwrap();
        assert_eq!(grid.search().queue().front(), Some(&key("jane")));

        assert!(!grid.is_searching_at(t0 + Duration::from_millis(1500)));
        assert!(grid.is_searching_at(t0 + Duration::from_secs(4)));
    }

    #[test]
    fn no_runtime_leaves_loads_requested() {
        let mut grid = lazy_grid(
            TableFetcher::default().with("jane", vec![person("joe", "Joe")]),
            vec![manager("jane", "Jane")],
        );
        grid.settle().unwrap();
        assert!(grid.in_flight().is_empty());
        assert_eq!(
            grid.model().get(&key("jane")).unwrap().loading_state(),
            LoadingState::LoadRequested
        );
        assert!(!grid.is_idle());
    }

    #[test]
    fn toggle_ignored_while_pending() {
        let mut grid = lazy_grid(TableFetcher::default(), vec![manager("jane", "Jane")]);
        assert!(!grid.toggle(&key("jane")).unwrap());
        assert!(grid.model().get(&key("jane")).unwrap().is_expanded());
    }

    #[test]
    fn ensure_visible_expands_ancestors_in_one_commit() {
        let mut grid = static_grid(vec![manager("jane", "Jane")]);
        grid.model = grid
            .model
            .add_child(&key("jane"), manager("joe", "Joe"))
            .unwrap()
            .add_child(&key("joe"), person("bob", "Bob"))
            .unwrap();

        let before = grid.model().generation();
        grid.ensure_visible(&key("bob")).unwrap();
        assert_eq!(grid.model().generation(), before + 1);
        for k in ["jane", "joe"] {
            assert!(grid.model().get(&key(k)).unwrap().is_expanded());
        }
        let bob = grid.model().get(&key("bob")).unwrap();
        assert_eq!(bob.should_scroll(), Some(true));
        assert!(!bob.is_expanded());
    }
}
