//! Runtime configuration.
//!
//! [`CoinwatchConfig::default`] targets the public CoinGecko v3 API with the
//! settings the dashboard has always used: top 50 assets in USD, refreshed
//! every two minutes. [`CoinwatchConfig::from_env`] layers environment
//! overrides on top.
//!
//! # Environment Variables
//!
//! | Variable | Field | Fallback |
//! |----------|-------|----------|
//! | `COINWATCH_BASE_URL` | `base_url` | - |
//! | `COINWATCH_API_KEY` | `api_key` | `COINGECKO_API_KEY` |
//! | `COINWATCH_CURRENCY` | `currency` | - |
//! | `COINWATCH_PER_PAGE` | `per_page` | - |
//! | `COINWATCH_REFRESH_SECS` | `refresh_interval` | - |
//! | `COINWATCH_TIMEOUT_MS` | `request_timeout` | - |
//! | `COINWATCH_HOME` | `state_path` (as `$COINWATCH_HOME/state.json`) | `$HOME/.coinwatch` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use coinwatch_state::resolve_coinwatch_home;
use thiserror::Error;

use crate::asset_source::{ListingRequest, MAX_PAGE_SIZE};
use crate::{Currency, ValidationError};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);
pub const DEFAULT_PER_PAGE: usize = 50;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("per_page must be between 1 and {max}, got {0}", max = MAX_PAGE_SIZE)]
    PerPageOutOfRange(usize),

    #[error("page numbers start at 1")]
    ZeroPage,

    #[error("refresh interval must be greater than zero")]
    ZeroRefreshInterval,

    #[error("invalid listing request: {0}")]
    InvalidListing(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinwatchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub currency: Currency,
    pub per_page: usize,
    pub page: usize,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub state_path: PathBuf,
}

impl Default for CoinwatchConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            api_key: None,
            currency: Currency::usd(),
            per_page: DEFAULT_PER_PAGE,
            page: 1,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_timeout: Duration::from_secs(10),
            state_path: resolve_coinwatch_home().join("state.json"),
        }
    }
}

impl CoinwatchConfig {
    /// Defaults overridden by `COINWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base_url) = read_env("COINWATCH_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_owned();
        }
        config.api_key = read_env("COINWATCH_API_KEY").or_else(|| read_env("COINGECKO_API_KEY"));

        if let Some(currency) = read_env("COINWATCH_CURRENCY") {
            config.currency = Currency::parse(&currency)?;
        }
        if let Some(per_page) = parse_env::<usize>("COINWATCH_PER_PAGE")? {
            config.per_page = per_page;
        }
        if let Some(secs) = parse_env::<u64>("COINWATCH_REFRESH_SECS")? {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env::<u64>("COINWATCH_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_page == 0 || self.per_page > MAX_PAGE_SIZE {
            return Err(ConfigError::PerPageOutOfRange(self.per_page));
        }
        if self.page == 0 {
            return Err(ConfigError::ZeroPage);
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        Ok(())
    }

    /// The listing page the scheduler refreshes.
    pub fn listing_request(&self) -> Result<ListingRequest, ConfigError> {
        self.validate()?;
        ListingRequest::page(self.currency.clone(), self.per_page, self.page)
            .map_err(|error| ConfigError::InvalidListing(error.message().to_owned()))
    }
}

fn read_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = read_env(name) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|error| ConfigError::InvalidEnv {
            name,
            value: raw.clone(),
            reason: error.to_string(),
        })
}
