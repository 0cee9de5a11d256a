//! # Coinwatch Core
//!
//! Client-side synchronization and query engine for a ranked crypto market
//! listing.
//!
//! ## Overview
//!
//! - **Asset source** contract with a CoinGecko `/coins/markets` adapter
//! - **Refresh scheduler** that keeps one snapshot fresh on a fixed interval
//! - **Query engine** deriving searchable, filtered views from a snapshot
//! - **Persisted user state** (favorites, dark mode) re-exported from
//!   `coinwatch-state`
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Upstream adapters (CoinGecko) |
//! | [`asset_source`] | Asset source trait and request/error types |
//! | [`config`] | Runtime configuration and environment overrides |
//! | [`domain`] | Domain models (Asset, Snapshot, Currency) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`query`] | Search/filter engine, memoization, market summary |
//! | [`scheduler`] | Periodic refresh with cancellation |
//! | [`session`] | All of the above wired for a presentation layer |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coinwatch_core::{Coinwatch, CoinwatchConfig, FilterMode, QueryState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoinwatchConfig::from_env()?;
//!     let app = Coinwatch::start(&config)?;
//!
//!     let mut updates = app.refresh().subscribe();
//!     updates.wait_for(|state| state.is_ready()).await?;
//!
//!     let view = app.view(&QueryState::new("", FilterMode::Gainers));
//!     for asset in view.assets() {
//!         println!("{:>8} {:+.2}%", asset.symbol, asset.change_24h());
//!     }
//!
//!     app.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   every 120 s   ┌──────────────────┐
//! │ RefreshScheduler│────────────────▶│ AssetSource      │
//! │ (watch channel) │◀────────────────│ (CoinGecko)      │
//! └────────┬────────┘    Vec<Asset>   └────────┬─────────┘
//!          │ Snapshot                          ▼
//!          ▼                          ┌──────────────────┐
//! ┌─────────────────┐                 │ HttpClient       │
//! │ query / Memoized│                 │ (reqwest)        │
//! │ Query           │                 └──────────────────┘
//! └─────────────────┘
//!
//! ┌─────────────────┐   ┌─────────────────┐
//! │ FavoritesStore  │   │ PreferenceStore │   (coinwatch-state)
//! └─────────────────┘   └─────────────────┘
//! ```

pub mod adapters;
pub mod asset_source;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod query;
pub mod scheduler;
pub mod session;

pub use adapters::CoinGeckoAdapter;
pub use asset_source::{
    AssetSource, ListingRequest, SourceError, SourceErrorKind, SourceFuture, MAX_ID_BATCH,
    MAX_PAGE_SIZE,
};
pub use config::{CoinwatchConfig, ConfigError};
pub use domain::{Asset, Currency, Snapshot, Sparkline, UtcDateTime};
pub use error::{CoreError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use query::{query, FilterMode, MarketSummary, MemoizedQuery, QueryState, QueryView};
pub use scheduler::{RefreshHandle, RefreshPhase, RefreshScheduler, RefreshState};
pub use session::Coinwatch;

pub use coinwatch_state::{
    FavoritesStore, JsonFileStore, MemoryStore, PersistentStore, PreferenceStore, StateDocument,
    StateError, StateHandle, STATE_NAMESPACE,
};
