//! Asset source trait and request/error types.
//!
//! [`AssetSource`] is the stateless gateway to a remote, read-only market
//! listing. It performs no retries and no caching: every failure is handed to
//! the caller as a [`SourceError`].
//!
//! # Operations
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | [`fetch_listing`](AssetSource::fetch_listing) | [`ListingRequest`] | `Vec<Asset>` (market-cap descending) |
//! | [`fetch_top`](AssetSource::fetch_top) | limit + currency | `Vec<Asset>` |
//! | [`fetch_by_ids`](AssetSource::fetch_by_ids) | asset ids | `Vec<Asset>` |
//! | [`fetch_one`](AssetSource::fetch_one) | asset id | [`Asset`] |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Asset, Currency};

/// Largest page the listing endpoint serves in one request.
pub const MAX_PAGE_SIZE: usize = 50;

/// Largest id batch accepted by [`AssetSource::fetch_by_ids`].
pub const MAX_ID_BATCH: usize = 10;

/// Source error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Transport failure or non-success status.
    Network,
    /// HTTP 429 from the upstream; a network error that is worth retrying later.
    RateLimited,
    /// Payload could not be parsed or failed validation.
    Decode,
    /// A detail lookup returned no matching entry.
    NotFound,
    /// The request was rejected before being sent.
    InvalidRequest,
}

/// Structured error returned by asset sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Network,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Decode,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(id: &str) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: format!("asset '{id}' was not found upstream"),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// True for transport and status failures, rate limiting included.
    pub const fn is_network(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Network | SourceErrorKind::RateLimited
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Network => "source.network",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Decode => "source.decode",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// One page of the market-cap-descending listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub currency: Currency,
    pub per_page: usize,
    pub page: usize,
}

impl ListingRequest {
    /// First page of `per_page` assets quoted in `currency`.
    pub fn new(currency: Currency, per_page: usize) -> Result<Self, SourceError> {
        Self::page(currency, per_page, 1)
    }

    pub fn page(currency: Currency, per_page: usize, page: usize) -> Result<Self, SourceError> {
        if per_page == 0 || per_page > MAX_PAGE_SIZE {
            return Err(SourceError::invalid_request(format!(
                "listing page size must be between 1 and {MAX_PAGE_SIZE}, got {per_page}"
            )));
        }
        if page == 0 {
            return Err(SourceError::invalid_request(
                "listing page number starts at 1",
            ));
        }
        Ok(Self {
            currency,
            per_page,
            page,
        })
    }
}

/// Boxed future returned by [`AssetSource`] operations.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Remote listing gateway.
///
/// Implementations must be `Send + Sync`; the refresh scheduler shares one
/// source across its background tasks.
pub trait AssetSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches one listing page ordered by market cap, descending, with
    /// sparkline and 24h change data included.
    ///
    /// # Errors
    ///
    /// - [`SourceErrorKind::Network`] / [`SourceErrorKind::RateLimited`] on
    ///   transport failure or non-success status
    /// - [`SourceErrorKind::Decode`] on a malformed payload
    fn fetch_listing<'a>(&'a self, request: ListingRequest) -> SourceFuture<'a, Vec<Asset>>;

    /// Fetches the listing entries for `ids`, in upstream order.
    ///
    /// # Errors
    ///
    /// [`SourceErrorKind::InvalidRequest`] for an empty batch or one larger than
    /// [`MAX_ID_BATCH`], otherwise as [`fetch_listing`](AssetSource::fetch_listing).
    fn fetch_by_ids<'a>(&'a self, ids: Vec<String>) -> SourceFuture<'a, Vec<Asset>>;

    /// Fetches the latest data for a single asset.
    ///
    /// # Errors
    ///
    /// [`SourceErrorKind::NotFound`] when the upstream returns no entry for
    /// `id`, otherwise as [`fetch_listing`](AssetSource::fetch_listing).
    fn fetch_one<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Asset>;

    /// Convenience form of [`fetch_listing`](AssetSource::fetch_listing) for
    /// the first page.
    fn fetch_top<'a>(&'a self, limit: usize, currency: Currency) -> SourceFuture<'a, Vec<Asset>> {
        match ListingRequest::new(currency, limit) {
            Ok(request) => self.fetch_listing(request),
            Err(error) => Box::pin(async move { Err(error) }),
        }
    }
}
