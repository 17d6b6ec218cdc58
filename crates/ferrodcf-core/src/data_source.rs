//! Data source traits and request/response types.
//!
//! The valuation core never performs I/O. Everything it consumes arrives
//! through the two contracts defined here:
//!
//! | Trait | Request | Response | Description |
//! |-------|---------|----------|-------------|
//! | [`FinancialsSource`] | [`FinancialsRequest`] | [`FinancialHistory`] | Annual statements, quote, shares, beta |
//! | [`RateSource`] | - | [`RateObservation`] | Risk-free rate |
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrodcf_core::{FinancialsRequest, FinancialsSource, Ticker, YahooAdapter};
//!
//! async fn latest_fcff_inputs(adapter: &YahooAdapter) -> Result<(), ferrodcf_core::SourceError> {
//!     let request = FinancialsRequest::new(Ticker::parse("AAPL")?);
//!     let history = adapter.financials(request).await?;
//!     println!("{} periods for {}", history.len(), history.ticker);
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{FinancialHistory, ProviderId, Ticker, UtcDateTime};

/// Health state reported by adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool) -> Self {
        Self {
            state,
            rate_available,
        }
    }

    pub const fn healthy() -> Self {
        Self::new(HealthState::Healthy, true)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    TickerNotFound,
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured source error. Carried through the valuation layer unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn ticker_not_found(ticker: &Ticker) -> Self {
        Self {
            kind: SourceErrorKind::TickerNotFound,
            message: format!("ticker '{ticker}' was not found"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
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

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
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

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::TickerNotFound => "source.ticker_not_found",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Request payload for statement history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancialsRequest {
    pub ticker: Ticker,
    /// Day the data is requested for; part of the cache key.
    pub as_of: Date,
}

impl FinancialsRequest {
    pub fn new(ticker: Ticker) -> Self {
        Self {
            ticker,
            as_of: UtcDateTime::now().date(),
        }
    }

    pub fn with_as_of(mut self, as_of: Date) -> Self {
        self.as_of = as_of;
        self
    }
}

/// One observation of a rate series, as a decimal (0.0425 = 4.25 %).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    pub source: ProviderId,
    pub series_id: String,
    pub observed_on: String,
    pub rate: f64,
}

/// Statement history provider.
///
/// Implementations must be `Send + Sync`; the CLI shares one instance across
/// every recomputation of an interactive session.
pub trait FinancialsSource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Fetches the annual statement history of `req.ticker`.
    ///
    /// # Errors
    ///
    /// [`SourceErrorKind::TickerNotFound`] when the provider does not know the
    /// ticker; any other kind for transport or payload problems.
    fn financials<'a>(
        &'a self,
        req: FinancialsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FinancialHistory, SourceError>> + Send + 'a>>;

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}

/// Risk-free rate provider.
pub trait RateSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn risk_free_rate<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RateObservation, SourceError>> + Send + 'a>>;
}
