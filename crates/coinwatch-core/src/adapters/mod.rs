//! Upstream listing adapters.

mod coingecko;

pub use coingecko::CoinGeckoAdapter;
