//! Pure listing transforms.
//!
//! | Item | Role |
//! |------|------|
//! | [`query`] | search then filter/sort one snapshot |
//! | [`MemoizedQuery`] | caches the view for the last input tuple |
//! | [`MarketSummary`] | aggregate figures over a snapshot |
//!
//! Nothing here can fail or suspend.

mod engine;
mod memo;
mod summary;

pub use engine::{query, FilterMode, QueryState};
pub use memo::{MemoizedQuery, QueryView};
pub use summary::MarketSummary;
