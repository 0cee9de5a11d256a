use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Asset, ValidationError};

/// Named view transform applied after the text search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Everything, in snapshot order.
    #[default]
    All,
    /// Positive 24h change, strongest first.
    Gainers,
    /// Negative 24h change, weakest first.
    Losers,
    /// Everything, highest 24h volume first.
    Volume,
}

impl FilterMode {
    pub const ALL: [FilterMode; 4] = [Self::All, Self::Gainers, Self::Losers, Self::Volume];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Gainers => "gainers",
            Self::Losers => "losers",
            Self::Volume => "volume",
        }
    }
}

impl Display for FilterMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "gainers" => Ok(Self::Gainers),
            "losers" => Ok(Self::Losers),
            "volume" => Ok(Self::Volume),
            _ => Err(ValidationError::InvalidFilterMode {
                value: value.to_owned(),
            }),
        }
    }
}

/// Caller-owned search text and filter mode. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryState {
    pub search_text: String,
    pub filter_mode: FilterMode,
}

impl QueryState {
    pub fn new(search_text: impl Into<String>, filter_mode: FilterMode) -> Self {
        Self {
            search_text: search_text.into(),
            filter_mode,
        }
    }

    /// True when the search text narrows the view.
    pub fn is_search_active(&self) -> bool {
        !self.search_text.is_empty()
    }

    pub fn apply(&self, assets: &[Asset]) -> Vec<Asset> {
        query(assets, &self.search_text, self.filter_mode)
    }
}

/// Derives the ordered view of `assets` for one search text and filter mode.
///
/// Search keeps assets whose name or symbol contains `search_text`,
/// compared after Unicode lowercasing. Every re-sort is stable, so ties keep
/// their snapshot order. A missing 24h change compares as `0.0`. The input is
/// never modified.
pub fn query(assets: &[Asset], search_text: &str, mode: FilterMode) -> Vec<Asset> {
    let mut rows: Vec<Asset> = if search_text.is_empty() {
        assets.to_vec()
    } else {
        let needle = search_text.to_lowercase();
        assets
            .iter()
            .filter(|asset| matches_search(asset, &needle))
            .cloned()
            .collect()
    };

    match mode {
        FilterMode::All => {}
        FilterMode::Gainers => {
            rows.retain(Asset::is_gainer);
            rows.sort_by(|a, b| b.change_24h().total_cmp(&a.change_24h()));
        }
        FilterMode::Losers => {
            rows.retain(Asset::is_loser);
            rows.sort_by(|a, b| a.change_24h().total_cmp(&b.change_24h()));
        }
        FilterMode::Volume => {
            rows.sort_by(|a, b| b.total_volume.total_cmp(&a.total_volume));
        }
    }

    rows
}

fn matches_search(asset: &Asset, needle: &str) -> bool {
    asset.name.to_lowercase().contains(needle) || asset.symbol.to_lowercase().contains(needle)
}
