//! Last-input memoization for [`query`](super::query).

use std::sync::Arc;

use super::engine::{query, FilterMode, QueryState};
use crate::{Asset, Snapshot};

/// One derived view.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView {
    assets: Arc<[Asset]>,
    search_active: bool,
}

impl QueryView {
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// True only when a non-empty search matched nothing. An empty view with
    /// no search text is just an empty snapshot or filter.
    pub fn is_no_results(&self) -> bool {
        self.search_active && self.assets.is_empty()
    }

    /// True when `other` is the same cached result, not merely equal.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.assets, &other.assets)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Snapshot,
    search_text: String,
    filter_mode: FilterMode,
    view: QueryView,
}

impl CacheEntry {
    fn matches(&self, snapshot: &Snapshot, search_text: &str, filter_mode: FilterMode) -> bool {
        self.snapshot.same_as(snapshot)
            && self.filter_mode == filter_mode
            && self.search_text == search_text
    }
}

/// Caches the view for the most recent `(snapshot, search text, filter mode)`.
///
/// Snapshots are compared by identity, so a new refresh always recomputes
/// even when its contents are equal to the previous one. Owned by the
/// consumer; there is no shared cache.
#[derive(Debug, Clone, Default)]
pub struct MemoizedQuery {
    last: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl MemoizedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(
        &mut self,
        snapshot: &Snapshot,
        search_text: &str,
        filter_mode: FilterMode,
    ) -> QueryView {
        if let Some(entry) = &self.last {
            if entry.matches(snapshot, search_text, filter_mode) {
                self.hits += 1;
                return entry.view.clone();
            }
        }

        self.misses += 1;
        let view = QueryView {
            assets: query(snapshot.assets(), search_text, filter_mode).into(),
            search_active: !search_text.is_empty(),
        };
        self.last = Some(CacheEntry {
            snapshot: snapshot.clone(),
            search_text: search_text.to_owned(),
            filter_mode,
            view: view.clone(),
        });
        view
    }

    pub fn query_state(&mut self, snapshot: &Snapshot, state: &QueryState) -> QueryView {
        self.query(snapshot, &state.search_text, state.filter_mode)
    }

    pub const fn hits(&self) -> u64 {
        self.hits
    }

    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Drops the cached view. Counters are kept.
    pub fn clear(&mut self) {
        self.last = None;
    }
}
