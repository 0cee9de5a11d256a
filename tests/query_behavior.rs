//! Behavior-driven tests for the listing query engine
//!
//! These tests verify WHAT a user sees when searching and filtering a
//! snapshot: which assets survive, and in which order.

use coinwatch_core::{
    query, Asset, FilterMode, MarketSummary, MemoizedQuery, QueryState, Snapshot, UtcDateTime,
};

fn asset(id: &str, name: &str, change: Option<f64>, volume: f64) -> Asset {
    let mut asset = Asset::new(id, id, name, 1.0)
        .expect("valid asset")
        .with_total_volume(volume);
    asset.price_change_percentage_24h = change;
    asset
}

fn btc_eth() -> Vec<Asset> {
    vec![
        asset("btc", "Bitcoin", Some(2.5), 500.0),
        asset("eth", "Ethereum", Some(-1.2), 900.0),
    ]
}

fn mixed_market() -> Vec<Asset> {
    vec![
        asset("btc", "Bitcoin", Some(2.5), 500.0),
        asset("eth", "Ethereum", Some(-1.2), 900.0),
        asset("usdt", "Tether", None, 1_200.0),
        asset("sol", "Solana", Some(7.8), 300.0),
        asset("bnb", "BNB", Some(2.5), 300.0),
        asset("xrp", "XRP", Some(-4.0), 150.0),
        asset("doge", "Dogecoin", Some(-1.2), 80.0),
        asset("ada", "Cardano", Some(0.0), 60.0),
    ]
}

fn ids(rows: &[Asset]) -> Vec<&str> {
    rows.iter().map(|asset| asset.id.as_str()).collect()
}

// =============================================================================
// Query: Concrete Scenarios
// =============================================================================

#[test]
fn when_filtering_btc_and_eth_each_mode_returns_the_expected_rows() {
    // Given: Bitcoin up 2.5% with volume 500, Ethereum down 1.2% with volume 900
    let snapshot = btc_eth();

    // When / Then: Each filter mode selects and orders the expected assets
    assert_eq!(ids(&query(&snapshot, "", FilterMode::Gainers)), vec!["btc"]);
    assert_eq!(ids(&query(&snapshot, "", FilterMode::Losers)), vec!["eth"]);
    assert_eq!(
        ids(&query(&snapshot, "", FilterMode::Volume)),
        vec!["eth", "btc"]
    );
    assert_eq!(ids(&query(&snapshot, "eth", FilterMode::All)), vec!["eth"]);
}

#[test]
fn when_search_is_empty_and_mode_is_all_the_snapshot_is_returned_unchanged() {
    // Given: A mixed market
    let snapshot = mixed_market();

    // When: No search and no filter is applied
    let rows = query(&snapshot, "", FilterMode::All);

    // Then: Order and content are identical to the snapshot
    assert_eq!(rows, snapshot);
}

#[test]
fn when_search_text_matches_nothing_the_result_is_empty() {
    // Given: A mixed market
    let snapshot = mixed_market();

    // When: The user searches for a name no asset carries
    // Then: Every filter mode yields nothing
    for mode in FilterMode::ALL {
        assert!(query(&snapshot, "zzz-not-listed", mode).is_empty());
    }
}

#[test]
fn when_search_differs_in_case_the_asset_still_matches() {
    // Given: A mixed market
    let snapshot = mixed_market();

    // When: The user types the name in upper case
    let rows = query(&snapshot, "BITCOIN", FilterMode::All);

    // Then: Bitcoin is found
    assert_eq!(ids(&rows), vec!["btc"]);
}

#[test]
fn when_snapshot_is_empty_every_mode_returns_empty() {
    for mode in FilterMode::ALL {
        assert!(query(&[], "", mode).is_empty());
        assert!(query(&[], "btc", mode).is_empty());
    }
}

// =============================================================================
// Query: Ordering Properties
// =============================================================================

#[test]
fn gainers_are_all_positive_and_sorted_descending() {
    let rows = query(&mixed_market(), "", FilterMode::Gainers);

    assert!(rows.iter().all(|asset| asset.change_24h() > 0.0));
    assert!(rows
        .windows(2)
        .all(|pair| pair[0].change_24h() >= pair[1].change_24h()));
    // btc precedes bnb on the tie at 2.5 because it comes first in the snapshot
    assert_eq!(ids(&rows), vec!["sol", "btc", "bnb"]);
}

#[test]
fn losers_are_all_negative_and_sorted_ascending() {
    let rows = query(&mixed_market(), "", FilterMode::Losers);

    assert!(rows.iter().all(|asset| asset.change_24h() < 0.0));
    assert!(rows
        .windows(2)
        .all(|pair| pair[0].change_24h() <= pair[1].change_24h()));
    assert_eq!(ids(&rows), vec!["xrp", "eth", "doge"]);
}

#[test]
fn volume_keeps_every_asset_sorted_descending() {
    let snapshot = mixed_market();
    let rows = query(&snapshot, "", FilterMode::Volume);

    assert_eq!(rows.len(), snapshot.len());
    assert!(rows
        .windows(2)
        .all(|pair| pair[0].total_volume >= pair[1].total_volume));
    // sol and bnb tie at 300
    assert_eq!(
        ids(&rows),
        vec!["usdt", "eth", "btc", "sol", "bnb", "xrp", "doge", "ada"]
    );
}

#[test]
fn when_change_is_missing_the_asset_is_treated_as_flat() {
    // Given: Tether has no 24h change
    let snapshot = mixed_market();

    // When: Gainers and losers are requested
    let gainers = query(&snapshot, "", FilterMode::Gainers);
    let losers = query(&snapshot, "", FilterMode::Losers);

    // Then: Tether appears in neither and nothing panics
    assert!(!ids(&gainers).contains(&"usdt"));
    assert!(!ids(&losers).contains(&"usdt"));
}

#[test]
fn query_never_modifies_its_input() {
    let snapshot = mixed_market();
    let before = snapshot.clone();

    for mode in FilterMode::ALL {
        let _ = query(&snapshot, "o", mode);
    }

    assert_eq!(snapshot, before);
}

// =============================================================================
// Query: Memoization and Summary
// =============================================================================

#[test]
fn when_inputs_are_unchanged_the_memoized_view_is_reused() {
    // Given: One snapshot and a memoized query
    let snapshot = Snapshot::try_new(mixed_market(), UtcDateTime::now()).expect("valid");
    let mut memo = MemoizedQuery::new();
    let state = QueryState::new("coin", FilterMode::Losers);

    // When: The same view is requested twice
    let first = memo.query_state(&snapshot, &state);
    let second = memo.query_state(&snapshot, &state);

    // Then: The second request is served from the cache
    assert!(first.same_as(&second));
    assert_eq!(ids(first.assets()), vec!["doge"]);
    assert_eq!((memo.hits(), memo.misses()), (1, 1));

    // And: A new refresh invalidates the cache
    let refreshed = Snapshot::try_new(mixed_market(), UtcDateTime::now()).expect("valid");
    let third = memo.query_state(&refreshed, &state);
    assert!(!first.same_as(&third));
    assert_eq!(first, third);
    assert_eq!(memo.misses(), 2);
}

#[test]
fn market_summary_counts_gainers_and_losers() {
    let summary = MarketSummary::from_assets(&mixed_market());

    assert_eq!(summary.asset_count, 8);
    assert_eq!(summary.gainers, 3);
    assert_eq!(summary.losers, 3);
    assert_eq!(summary.top_gainer.as_deref(), Some("sol"));
    assert_eq!(summary.top_loser.as_deref(), Some("xrp"));
    assert_eq!(summary.total_volume, 3_490.0);
}
