//! # ferrodcf Core
//!
//! Discounted cash flow valuation of a listed company from its historical
//! statements.
//!
//! ## Overview
//!
//! - **Domain models** for statement snapshots and histories
//! - **Valuation pipeline**: FCFF, WACC, projection, discounting, equity bridge
//!   and a WACC × terminal growth sensitivity grid
//! - **Data sources** for statements (Yahoo Finance) and the risk-free rate (FRED)
//! - **Transport plumbing**: HTTP client, retry, circuit breaker, throttling, cache
//! - **Response envelope** with metadata and structured errors
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo Finance and FRED adapters |
//! | [`cache`] | Bounded TTL cache of statement histories |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | TOML settings with environment overrides |
//! | [`data_source`] | Source traits and request/error types |
//! | [`domain`] | Ticker, snapshots, histories, timestamps |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`retry`] | Retry with backoff |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Client-side rate limiting |
//! | [`valuation`] | The valuation pipeline |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrodcf_core::{
//!     value_company, AssumptionSet, FinancialsRequest, FinancialsSource, MarketInputs, Ticker,
//!     YahooAdapter,
//! };
//!
//! let adapter = YahooAdapter::default();
//! let history = adapter
//!     .financials(FinancialsRequest::new(Ticker::parse("AAPL")?))
//!     .await?;
//! let valuation = value_company(
//!     &history,
//!     &AssumptionSet::new(10, 0.14, 0.05)?,
//!     &MarketInputs::from_market_return(0.0425, 1.2, 0.09),
//! )?;
//! println!("fair value: {:.2}", valuation.result.fair_value_per_share);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / User     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  CachedSource   │────▶│ FinancialsCache  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Yahoo / FRED    │────▶│ HTTP Client      │
//! │ adapters        │     │ retry + breaker  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ valuation       │
//! │ (pure, sync)    │
//! └─────────────────┘
//! ```
//!
//! The valuation module never performs I/O. Provider failures reach it only as
//! [`SourceError`] values, which [`ValuationError`] carries through unchanged.

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod source;
pub mod throttling;
pub mod valuation;

// Adapter implementations
pub use adapters::{FredAdapter, YahooAdapter, YahooAuthManager};

// Caching
pub use cache::{CacheMode, CachedFetch, CachedSource, FinancialsCache};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::{ConfigError, LogFormat, Settings};

// Data source traits and types
pub use data_source::{
    FinancialsRequest, FinancialsSource, HealthState, HealthStatus, RateObservation, RateSource,
    SourceError, SourceErrorKind,
};

// Domain models
pub use domain::{validate_currency_code, FinancialHistory, FinancialSnapshot, Ticker, UtcDateTime};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};

// Error types
pub use error::{CoreError, ValidationError, ValuationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::RequestThrottle;

// Valuation pipeline
pub use valuation::{
    sensitivity_for, value_company, AssumptionSet, BaseFcffMethod, MarketInputs, RateAxis,
    SensitivityGrid, Valuation, ValuationResult, MAX_HORIZON_YEARS,
};
