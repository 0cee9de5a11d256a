use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError};

/// Chronological price samples, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sparkline(Vec<f64>);

impl Sparkline {
    pub fn new(prices: Vec<f64>) -> Self {
        Self(prices)
    }

    pub fn prices(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.0.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.0.iter().copied().reduce(f64::max)
    }

    /// Last sample minus first sample; `None` with fewer than two samples.
    pub fn trend(&self) -> Option<f64> {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) if self.0.len() > 1 => Some(last - first),
            _ => None,
        }
    }

    /// The most recent `n` samples.
    pub fn tail(&self, n: usize) -> &[f64] {
        &self.0[self.0.len().saturating_sub(n)..]
    }
}

/// One tracked market instrument and its latest known metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub price_change_percentage_24h: Option<f64>,
    pub sparkline: Option<Sparkline>,
    pub market_cap_rank: Option<u32>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
    pub price_change_percentage_1y: Option<f64>,
    pub last_updated: Option<UtcDateTime>,
}

impl Asset {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        current_price: f64,
    ) -> Result<Self, ValidationError> {
        let asset = Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            image: String::new(),
            current_price,
            market_cap: 0.0,
            total_volume: 0.0,
            price_change_percentage_24h: None,
            sparkline: None,
            market_cap_rank: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            ath: None,
            ath_change_percentage: None,
            atl: None,
            atl_change_percentage: None,
            price_change_percentage_7d: None,
            price_change_percentage_30d: None,
            price_change_percentage_1y: None,
            last_updated: None,
        };
        asset.validate()?;
        Ok(asset)
    }

    pub fn with_change_24h(mut self, change: f64) -> Self {
        self.price_change_percentage_24h = Some(change);
        self
    }

    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = market_cap;
        self
    }

    pub fn with_total_volume(mut self, total_volume: f64) -> Self {
        self.total_volume = total_volume;
        self
    }

    pub fn with_sparkline(mut self, prices: Vec<f64>) -> Self {
        self.sparkline = Some(Sparkline::new(prices));
        self
    }

    /// Checks the invariants every asset in a snapshot must hold.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyAssetId);
        }

        validate_non_negative("current_price", self.current_price)?;
        validate_non_negative("market_cap", self.market_cap)?;
        validate_non_negative("total_volume", self.total_volume)?;
        validate_optional_finite("price_change_percentage_24h", self.price_change_percentage_24h)?;
        validate_optional_non_negative("circulating_supply", self.circulating_supply)?;
        validate_optional_non_negative("total_supply", self.total_supply)?;
        validate_optional_non_negative("max_supply", self.max_supply)?;
        Ok(())
    }

    /// 24h change in percent, with an absent value read as `0.0`.
    pub fn change_24h(&self) -> f64 {
        self.price_change_percentage_24h.unwrap_or(0.0)
    }

    pub fn is_gainer(&self) -> bool {
        self.change_24h() > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.change_24h() < 0.0
    }
}

/// Full ordered list of assets from one successful refresh.
///
/// Cheap to clone; the asset list is shared and never mutated. Two snapshots
/// are the *same* (see [`Snapshot::same_as`]) only when they came from the
/// same refresh.
#[derive(Debug, Clone)]
pub struct Snapshot {
    assets: Arc<[Asset]>,
    fetched_at: Option<UtcDateTime>,
}

impl Snapshot {
    /// Builds a snapshot, rejecting invalid assets and repeated ids.
    pub fn try_new(assets: Vec<Asset>, fetched_at: UtcDateTime) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            asset.validate()?;
            if !seen.insert(asset.id.as_str()) {
                return Err(ValidationError::DuplicateAssetId {
                    id: asset.id.clone(),
                });
            }
        }

        Ok(Self {
            assets: assets.into(),
            fetched_at: Some(fetched_at),
        })
    }

    pub fn empty() -> Self {
        Self {
            assets: Arc::from(Vec::new()),
            fetched_at: None,
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Asset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn fetched_at(&self) -> Option<UtcDateTime> {
        self.fetched_at
    }

    pub fn find(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    /// True when both values share the same underlying asset list.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.assets, &other.assets)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) || self.assets == other.assets
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Asset;
    type IntoIter = std::slice::Iter<'a, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
    }
    Ok(())
}
