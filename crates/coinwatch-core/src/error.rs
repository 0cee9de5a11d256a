use coinwatch_state::StateError;
use thiserror::Error;

use crate::asset_source::SourceError;
use crate::config::ConfigError;

/// Validation errors raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("asset id cannot be empty")]
    EmptyAssetId,
    #[error("asset id '{id}' appears more than once in the snapshot")]
    DuplicateAssetId { id: String },

    #[error("currency cannot be empty")]
    EmptyCurrency,
    #[error("currency length {len} exceeds max {max}")]
    CurrencyTooLong { len: usize, max: usize },
    #[error("currency contains invalid character '{ch}' at index {index}")]
    CurrencyInvalidChar { ch: char, index: usize },

    #[error("invalid filter mode '{value}', expected one of all, gainers, losers, volume")]
    InvalidFilterMode { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}
