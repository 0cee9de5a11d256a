//! Behavior-driven tests for the CoinGecko asset source
//!
//! These tests verify HOW upstream responses are turned into assets or
//! classified errors. No network is used: a scripted transport replays the
//! responses.

use coinwatch_core::{
    AssetSource, CoinGeckoAdapter, CoinwatchConfig, Currency, HttpClient, HttpError, HttpFuture,
    HttpRequest, HttpResponse, ListingRequest, SourceErrorKind,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedHttpClient {
    replies: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn new(replies: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.requests.lock().expect("requests lock").push(request);
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("no scripted reply")));
        Box::pin(async move { reply })
    }
}

fn adapter(client: Arc<ScriptedHttpClient>) -> CoinGeckoAdapter {
    let config = CoinwatchConfig {
        base_url: String::from("https://api.example.test/api/v3"),
        ..CoinwatchConfig::default()
    };
    CoinGeckoAdapter::with_http_client(client, &config)
}

const LISTING: &str = r#"[
    {
        "id": "bitcoin",
        "symbol": "btc",
        "name": "Bitcoin",
        "image": "https://assets.example.test/bitcoin.png",
        "current_price": 67187.33,
        "market_cap": 1322146207452,
        "market_cap_rank": 1,
        "total_volume": 500,
        "price_change_percentage_24h": 2.5,
        "last_updated": "2024-03-14T09:26:53.589Z",
        "sparkline_in_7d": { "price": [66000.0, 66500.0, 67187.33] }
    },
    {
        "id": "ethereum",
        "symbol": "eth",
        "name": "Ethereum",
        "image": "https://assets.example.test/ethereum.png",
        "current_price": 3512.8,
        "market_cap": 421840000000,
        "market_cap_rank": 2,
        "total_volume": 900,
        "price_change_percentage_24h": -1.2,
        "last_updated": "2024-03-14T09:26:41.102Z",
        "sparkline_in_7d": { "price": [3600.0, 3550.0, 3512.8] }
    }
]"#;

// =============================================================================
// Asset Source: Valid Responses
// =============================================================================

#[tokio::test]
async fn when_upstream_returns_a_listing_assets_keep_market_cap_order() {
    // Given: An upstream that returns Bitcoin then Ethereum
    let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(LISTING))]);
    let adapter = adapter(client.clone());

    // When: The top of the listing is fetched
    let assets = adapter
        .fetch_top(50, Currency::usd())
        .await
        .expect("listing should decode");

    // Then: Assets arrive in upstream order with their metrics
    let ids: Vec<&str> = assets.iter().map(|asset| asset.id.as_str()).collect();
    assert_eq!(ids, vec!["bitcoin", "ethereum"]);
    assert!(assets[1].is_loser());
    assert_eq!(
        assets[0].sparkline.as_ref().and_then(|line| line.trend()),
        Some(67187.33 - 66000.0)
    );

    // And: The request asked for ordering, sparkline, and change windows
    let request = &client.requests()[0];
    assert_eq!(request.query_param("order"), Some("market_cap_desc"));
    assert_eq!(request.query_param("sparkline"), Some("true"));
    assert!(request
        .query_param("price_change_percentage")
        .is_some_and(|windows| windows.contains("24h")));
}

#[tokio::test]
async fn when_a_later_page_is_requested_the_page_number_is_sent() {
    let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("[]"))]);
    let adapter = adapter(client.clone());

    let request = ListingRequest::page(Currency::usd(), 25, 3).expect("valid request");
    let assets = adapter.fetch_listing(request).await.expect("empty page");

    assert!(assets.is_empty());
    let sent = &client.requests()[0];
    assert_eq!(sent.query_param("per_page"), Some("25"));
    assert_eq!(sent.query_param("page"), Some("3"));
}

#[tokio::test]
async fn when_ids_are_looked_up_they_are_sent_as_one_batch() {
    let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(LISTING))]);
    let adapter = adapter(client.clone());

    let assets = adapter
        .fetch_by_ids(vec![String::from("bitcoin"), String::from("ethereum")])
        .await
        .expect("lookup should decode");

    assert_eq!(assets.len(), 2);
    assert_eq!(
        client.requests()[0].query_param("ids"),
        Some("bitcoin,ethereum")
    );
}

// =============================================================================
// Asset Source: Error Classification
// =============================================================================

#[tokio::test]
async fn when_upstream_is_unavailable_a_network_error_is_returned() {
    // Given: An upstream answering 500, then failing to connect
    let client = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::with_status(500, "internal error")),
        Err(HttpError::timeout("deadline elapsed")),
    ]);
    let adapter = adapter(client);

    // When: Two fetches are attempted
    let first = adapter.fetch_top(50, Currency::usd()).await;
    let second = adapter.fetch_top(50, Currency::usd()).await;

    // Then: Both surface as network errors without retries
    assert_eq!(
        first.expect_err("status error").kind(),
        SourceErrorKind::Network
    );
    let timeout = second.expect_err("timeout");
    assert_eq!(timeout.kind(), SourceErrorKind::Network);
    assert!(timeout.message().contains("timed out"));
}

#[tokio::test]
async fn when_upstream_rate_limits_the_error_is_retryable() {
    let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::with_status(429, ""))]);

    let error = adapter(client)
        .fetch_top(50, Currency::usd())
        .await
        .expect_err("rate limited");

    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    assert!(error.is_network());
    assert!(error.retryable());
}

#[tokio::test]
async fn when_payload_is_malformed_a_decode_error_is_returned() {
    // Given: Upstream payloads that are not a valid listing
    let client = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json("<html>maintenance</html>")),
        Ok(HttpResponse::ok_json(
            r#"[{"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": -1}]"#,
        )),
    ]);
    let adapter = adapter(client);

    // When / Then: Both are decode errors that are not worth retrying
    for _ in 0..2 {
        let error = adapter
            .fetch_top(50, Currency::usd())
            .await
            .expect_err("malformed payload");
        assert_eq!(error.kind(), SourceErrorKind::Decode);
        assert!(!error.retryable());
    }
}

#[tokio::test]
async fn when_detail_lookup_is_empty_not_found_is_returned() {
    let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("[]"))]);

    let error = adapter(client)
        .fetch_one("delisted-coin")
        .await
        .expect_err("not found");

    assert_eq!(error.kind(), SourceErrorKind::NotFound);
    assert!(error.message().contains("delisted-coin"));
}

#[tokio::test]
async fn when_detail_id_is_blank_nothing_is_sent() {
    let client = ScriptedHttpClient::new(Vec::new());
    let adapter = adapter(client.clone());

    let error = adapter.fetch_one("   ").await.expect_err("blank id");

    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    assert!(client.requests().is_empty());
}
