//! # Domain Models
//!
//! Canonical domain types for coinwatch market listings.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Asset`] | One tracked instrument and its latest metrics |
//! | [`Sparkline`] | Chronological price samples for an asset |
//! | [`Snapshot`] | Ordered asset list from one successful refresh |
//! | [`Currency`] | Validated quote currency (`usd`, `eur`, ...) |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Snapshots are delivered in market-cap-descending order and hold each asset
//! id at most once; [`Snapshot::try_new`] enforces the latter.

mod asset;
mod currency;
mod timestamp;

pub use asset::{Asset, Snapshot, Sparkline};
pub use currency::Currency;
pub use timestamp::UtcDateTime;
