//! Everything a presentation layer needs, wired together.

use std::sync::{Arc, Mutex, PoisonError};

use coinwatch_state::{
    FavoritesStore, JsonFileStore, PersistentStore, PreferenceStore, StateHandle,
};

use crate::adapters::CoinGeckoAdapter;
use crate::asset_source::AssetSource;
use crate::config::CoinwatchConfig;
use crate::error::CoreError;
use crate::query::{MarketSummary, MemoizedQuery, QueryState, QueryView};
use crate::scheduler::{RefreshHandle, RefreshScheduler};
use crate::{Asset, Snapshot};

/// Running refresh loop plus the persisted user state.
///
/// Consumers are handed this container explicitly; there is no global
/// instance.
pub struct Coinwatch {
    refresh: RefreshHandle,
    state: StateHandle,
    memo: Mutex<MemoizedQuery>,
}

impl Coinwatch {
    /// Starts against CoinGecko with state stored at `config.state_path`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &CoinwatchConfig) -> Result<Self, CoreError> {
        let source = Arc::new(CoinGeckoAdapter::from_config(config));
        let store = Arc::new(JsonFileStore::new(config.state_path.clone()));
        Self::start_with(source, store, config)
    }

    pub fn start_with(
        source: Arc<dyn AssetSource>,
        store: Arc<dyn PersistentStore>,
        config: &CoinwatchConfig,
    ) -> Result<Self, CoreError> {
        let state = StateHandle::open(store)?;
        let scheduler = RefreshScheduler::from_config(source, config)?;

        Ok(Self {
            refresh: scheduler.start(),
            state,
            memo: Mutex::new(MemoizedQuery::new()),
        })
    }

    pub fn refresh(&self) -> &RefreshHandle {
        &self.refresh
    }

    pub fn favorites(&self) -> FavoritesStore {
        self.state.favorites()
    }

    pub fn preference(&self) -> PreferenceStore {
        self.state.preference()
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn snapshot(&self) -> Snapshot {
        self.refresh.current_snapshot()
    }

    /// View of the current snapshot, reusing the previous result when neither
    /// the snapshot nor the query changed.
    pub fn view(&self, query: &QueryState) -> QueryView {
        let snapshot = self.refresh.current_snapshot();
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .query_state(&snapshot, query)
    }

    /// Favorites present in the current snapshot, in favorite order.
    pub fn favorite_assets(&self) -> Vec<Asset> {
        let snapshot = self.refresh.current_snapshot();
        self.state
            .favorites()
            .list()
            .iter()
            .filter_map(|id| snapshot.find(id).cloned())
            .collect()
    }

    pub fn summary(&self) -> MarketSummary {
        MarketSummary::from_assets(self.refresh.current_snapshot().assets())
    }

    /// Stops refreshing and waits for the loop to exit.
    pub async fn shutdown(self) {
        self.refresh.shutdown().await;
    }
}
