//! A JSON-backed data source used by the `treegrid` binary.
//!
//! The dataset is a list of records, each optionally carrying its own
//! `children`. Only the top level goes into the grid up front; deeper levels
//! are served through [`StaticSource`] as if they came from a remote service.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::search::MatchMode;
use crate::source::{ChildFetcher, GridRow};
use crate::tree::NodeKey;

/// One entry of the dataset file.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub key: NodeKey,
    pub name: String,
    #[serde(default)]
    pub title: String,
    /// Present (even when empty) for records that can have children.
    pub children: Option<Vec<Record>>,
}

/// Grid row built from a [`Record`], without its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoRow {
    pub key: NodeKey,
    pub name: String,
    pub title: String,
    pub expandable: bool,
    pub match_mode: MatchMode,
}

impl DemoRow {
    fn from_record(record: &Record, match_mode: MatchMode) -> Self {
        Self {
            key: record.key.clone(),
            name: record.name.clone(),
            title: record.title.clone(),
            expandable: record.children.is_some(),
            match_mode,
        }
    }
}

impl GridRow for DemoRow {
    fn key(&self) -> NodeKey {
        self.key.clone()
    }

    fn is_expandable(&self) -> bool {
        self.expandable
    }

    fn matches_search(&self, query: &str) -> bool {
        self.match_mode.matches(&self.name, query) || self.match_mode.matches(&self.title, query)
    }
}

/// Read a dataset file.
pub fn load_dataset(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&content)?;
    debug!(path = %path.display(), top_level = records.len(), "dataset loaded");
    Ok(records)
}

/// Serves children out of a parsed dataset.
#[derive(Debug, Default)]
pub struct StaticSource {
    children: HashMap<NodeKey, Vec<DemoRow>>,
    delay: Duration,
    stalled: HashSet<NodeKey>,
}

impl StaticSource {
    /// Index every record's children and return the top-level rows
    /// alongside the source.
    pub fn from_records(records: &[Record], match_mode: MatchMode) -> (Vec<DemoRow>, Self) {
        let mut source = Self::default();
        let top = records
            .iter()
            .map(|r| DemoRow::from_record(r, match_mode))
            .collect();
        source.index(records, match_mode);
        (top, source)
    }

    fn index(&mut self, records: &[Record], match_mode: MatchMode) {
        for record in records {
            if let Some(kids) = &record.children {
                let rows = kids
                    .iter()
                    .map(|k| DemoRow::from_record(k, match_mode))
                    .collect();
                self.children.insert(record.key.clone(), rows);
                self.index(kids, match_mode);
            }
        }
    }

    /// Sleep this long before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetches for these keys never resolve.
    pub fn with_stalled(mut self, keys: impl IntoIterator<Item = NodeKey>) -> Self {
        self.stalled.extend(keys);
        self
    }
}

#[async_trait]
impl ChildFetcher<DemoRow> for StaticSource {
    async fn fetch_children(&self, row: &DemoRow) -> Option<Vec<DemoRow>> {
        if self.stalled.contains(&row.key) {
            debug!(key = %row.key, "stalling fetch");
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.children.get(&row.key).cloned()
    }
}
