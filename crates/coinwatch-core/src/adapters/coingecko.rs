use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::asset_source::{
    AssetSource, ListingRequest, SourceError, SourceFuture, MAX_ID_BATCH,
};
use crate::config::CoinwatchConfig;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{Asset, Currency, Sparkline, UtcDateTime, ValidationError};

/// Change windows requested from `/coins/markets` alongside the 24h figure.
const PRICE_CHANGE_WINDOWS: &str = "24h,7d,30d,1y";

/// CoinGecko `/coins/markets` adapter.
#[derive(Clone)]
pub struct CoinGeckoAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    currency: Currency,
    timeout_ms: u64,
}

impl CoinGeckoAdapter {
    /// Adapter with the given transport, talking to `base_url`.
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth: HttpAuth::None,
            currency: Currency::usd(),
            timeout_ms: 10_000,
        }
    }

    /// Production adapter built from configuration, using reqwest.
    pub fn from_config(config: &CoinwatchConfig) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), config)
    }

    /// Adapter built from configuration with a caller-supplied transport.
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, config: &CoinwatchConfig) -> Self {
        let auth = config
            .api_key
            .as_deref()
            .map(HttpAuth::coingecko_demo_key)
            .unwrap_or(HttpAuth::None);

        Self {
            auth,
            currency: config.currency.clone(),
            timeout_ms: u64::try_from(config.request_timeout.as_millis()).unwrap_or(u64::MAX),
            ..Self::new(http_client, config.base_url.clone())
        }
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Quote currency used by id lookups.
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    fn markets_request(&self, currency: &Currency, per_page: usize, page: usize) -> HttpRequest {
        HttpRequest::get(format!("{}/coins/markets", self.base_url))
            .with_query("vs_currency", currency.as_str())
            .with_query("order", "market_cap_desc")
            .with_query("per_page", per_page.to_string())
            .with_query("page", page.to_string())
            .with_query("sparkline", "true")
            .with_query("price_change_percentage", PRICE_CHANGE_WINDOWS)
            .with_query("locale", "en")
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms)
    }

    fn ids_request(&self, ids: &[String]) -> HttpRequest {
        self.markets_request(&self.currency, ids.len(), 1)
            .with_query("ids", ids.join(","))
    }

    async fn execute_markets(&self, request: HttpRequest) -> Result<Vec<Asset>, SourceError> {
        tracing::debug!(url = %request.full_url(), "requesting coingecko markets");

        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                SourceError::network(format!("coingecko request timed out: {}", error.message()))
            } else {
                SourceError::network(format!("coingecko transport error: {}", error.message()))
            }
        })?;

        if response.status == 429 {
            return Err(SourceError::rate_limited(
                "coingecko rate limit reached (status 429)",
            ));
        }
        if !response.is_success() {
            return Err(SourceError::network(format!(
                "coingecko upstream returned status {}",
                response.status
            )));
        }

        let payload: Vec<CoinGeckoMarket> = serde_json::from_str(&response.body)
            .map_err(|error| SourceError::decode(format!("malformed coingecko payload: {error}")))?;

        let mut seen = HashSet::with_capacity(payload.len());
        payload
            .into_iter()
            .map(|raw| {
                if !seen.insert(raw.id.clone()) {
                    return Err(validation_to_error(ValidationError::DuplicateAssetId {
                        id: raw.id,
                    }));
                }
                normalize_market(raw)
            })
            .collect()
    }
}

impl AssetSource for CoinGeckoAdapter {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    fn fetch_listing<'a>(&'a self, request: ListingRequest) -> SourceFuture<'a, Vec<Asset>> {
        Box::pin(async move {
            let http_request =
                self.markets_request(&request.currency, request.per_page, request.page);
            self.execute_markets(http_request).await
        })
    }

    fn fetch_by_ids<'a>(&'a self, ids: Vec<String>) -> SourceFuture<'a, Vec<Asset>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Err(SourceError::invalid_request(
                    "id lookup requires at least one asset id",
                ));
            }
            if ids.len() > MAX_ID_BATCH {
                return Err(SourceError::invalid_request(format!(
                    "id lookup accepts at most {MAX_ID_BATCH} ids, got {}",
                    ids.len()
                )));
            }
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(SourceError::invalid_request("asset ids must not be blank"));
            }

            self.execute_markets(self.ids_request(&ids)).await
        })
    }

    fn fetch_one<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Asset> {
        Box::pin(async move {
            let id = id.trim();
            if id.is_empty() {
                return Err(SourceError::invalid_request("asset id must not be blank"));
            }

            let assets = self
                .execute_markets(self.ids_request(&[id.to_owned()]))
                .await?;

            assets
                .into_iter()
                .find(|asset| asset.id == id)
                .ok_or_else(|| SourceError::not_found(id))
        })
    }
}

/// Raw `/coins/markets` entry. Numeric fields are nullable upstream.
#[derive(Debug, Deserialize)]
struct CoinGeckoMarket {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    current_price: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    total_volume: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    circulating_supply: Option<f64>,
    #[serde(default)]
    total_supply: Option<f64>,
    #[serde(default)]
    max_supply: Option<f64>,
    #[serde(default)]
    ath: Option<f64>,
    #[serde(default)]
    ath_change_percentage: Option<f64>,
    #[serde(default)]
    atl: Option<f64>,
    #[serde(default)]
    atl_change_percentage: Option<f64>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    sparkline_in_7d: Option<SparklinePayload>,
    #[serde(default)]
    price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    price_change_percentage_30d_in_currency: Option<f64>,
    #[serde(default)]
    price_change_percentage_1y_in_currency: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SparklinePayload {
    #[serde(default)]
    price: Vec<f64>,
}

fn normalize_market(raw: CoinGeckoMarket) -> Result<Asset, SourceError> {
    let current_price = raw.current_price.ok_or_else(|| {
        SourceError::decode(format!("asset '{}' has no current_price", raw.id))
    })?;

    let last_updated = raw
        .last_updated
        .as_deref()
        .map(UtcDateTime::parse)
        .transpose()
        .map_err(validation_to_error)?;

    let asset = Asset {
        id: raw.id,
        symbol: raw.symbol,
        name: raw.name,
        image: raw.image.unwrap_or_default(),
        current_price,
        market_cap: raw.market_cap.unwrap_or(0.0),
        total_volume: raw.total_volume.unwrap_or(0.0),
        price_change_percentage_24h: raw.price_change_percentage_24h,
        sparkline: raw
            .sparkline_in_7d
            .map(|payload| Sparkline::new(payload.price)),
        market_cap_rank: raw.market_cap_rank,
        circulating_supply: raw.circulating_supply,
        total_supply: raw.total_supply,
        max_supply: raw.max_supply,
        ath: raw.ath,
        ath_change_percentage: raw.ath_change_percentage,
        atl: raw.atl,
        atl_change_percentage: raw.atl_change_percentage,
        price_change_percentage_7d: raw.price_change_percentage_7d_in_currency,
        price_change_percentage_30d: raw.price_change_percentage_30d_in_currency,
        price_change_percentage_1y: raw.price_change_percentage_1y_in_currency,
        last_updated,
    };

    asset.validate().map_err(validation_to_error)?;
    Ok(asset)
}

fn validation_to_error(error: ValidationError) -> SourceError {
    SourceError::decode(format!("invalid coingecko asset: {error}"))
}
