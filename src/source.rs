//! Collaborator contracts supplied by the caller: the row payload and the
//! child fetcher.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::tree::NodeKey;

/// A caller-supplied row payload.
pub trait GridRow: Clone + Debug + Send + Sync + 'static {
    /// Unique key of this row within the tree.
    fn key(&self) -> NodeKey;

    /// Whether this row participates in child loading and search traversal.
    fn is_expandable(&self) -> bool {
        false
    }

    /// Per-row search predicate. Rows without one never match.
    fn matches_search(&self, _query: &str) -> bool {
        false
    }
}

/// Fetches the children of a row.
///
/// `None` means "no children available right now"; the parent then stays
/// in `Loading`.
#[async_trait]
pub trait ChildFetcher<R: GridRow>: Send + Sync {
    async fn fetch_children(&self, row: &R) -> Option<Vec<R>>;
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[derive(Debug, Clone)]
    struct Bare(i64);

    impl GridRow for Bare {
        fn key(&self) -> NodeKey {
            NodeKey::from(self.0)
        }
    }

    #[test]
    fn defaults_never_match_and_are_leaves() {
        let row = Bare(1);
        assert!(!row.is_expandable());
        assert!(!row.matches_search("1"));
    }

    #[tokio::test]
    async fn table_fetcher_answers_known_keys() {
        let fetcher = TableFetcher::default().with("jane", vec![person("joe", "Joe")]);
        let kids = fetcher.fetch_children(&manager("jane", "Jane")).await;
        assert_eq!(kids, Some(vec![person("joe", "Joe")]));
        assert_eq!(fetcher.fetch_children(&manager("x", "X")).await, None);
    }
}
