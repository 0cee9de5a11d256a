use serde::{Deserialize, Serialize};

use crate::Asset;

/// Aggregate figures for the overview header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub asset_count: usize,
    pub total_market_cap: f64,
    pub total_volume: f64,
    pub gainers: usize,
    pub losers: usize,
    /// Largest positive 24h change; the earliest asset wins a tie.
    pub top_gainer: Option<String>,
    /// Largest negative 24h change; the earliest asset wins a tie.
    pub top_loser: Option<String>,
}

impl MarketSummary {
    pub fn from_assets(assets: &[Asset]) -> Self {
        let mut summary = Self {
            asset_count: assets.len(),
            ..Self::default()
        };
        let mut best: Option<(&Asset, f64)> = None;
        let mut worst: Option<(&Asset, f64)> = None;

        for asset in assets {
            summary.total_market_cap += asset.market_cap;
            summary.total_volume += asset.total_volume;

            let change = asset.change_24h();
            if change > 0.0 {
                summary.gainers += 1;
                if best.map_or(true, |(_, top)| change > top) {
                    best = Some((asset, change));
                }
            } else if change < 0.0 {
                summary.losers += 1;
                if worst.map_or(true, |(_, bottom)| change < bottom) {
                    worst = Some((asset, change));
                }
            }
        }

        summary.top_gainer = best.map(|(asset, _)| asset.id.clone());
        summary.top_loser = worst.map(|(asset, _)| asset.id.clone());
        summary
    }

    /// Share of assets up over 24h, in `0.0..=1.0`; `None` when empty.
    pub fn breadth(&self) -> Option<f64> {
        if self.asset_count == 0 {
            None
        } else {
            Some(self.gainers as f64 / self.asset_count as f64)
        }
    }
}
