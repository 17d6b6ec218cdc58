use thiserror::Error;

use crate::config::ConfigError;
use crate::data_source::{SourceError, SourceErrorKind};

/// Validation and contract errors exposed by `ferrodcf-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker contains invalid character {ch:?} at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of yahoo, fred")]
    InvalidProvider { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("currency must be a 3-letter ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be within [{min}, {max}), got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("trace_id must be 32 lowercase hex characters and not all zeros")]
    InvalidTraceId,
    #[error("source_chain must contain at least one provider")]
    EmptySourceChain,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Failure of a single valuation computation.
///
/// Every variant is terminal for the computation that raised it. Provider
/// failures are carried through untouched so the caller sees the original
/// classification and message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValuationError {
    #[error("insufficient data: {required} period(s) required, {available} available")]
    DataInsufficient { required: usize, available: usize },

    #[error("invalid input '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("{0}")]
    TickerNotFound(SourceError),

    #[error("{0}")]
    DataProvider(SourceError),
}

impl ValuationError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::DataInsufficient { .. } => "valuation.data_insufficient",
            Self::InvalidInput { .. } => "valuation.invalid_input",
            Self::TickerNotFound(_) => "source.ticker_not_found",
            Self::DataProvider(error) => error.code(),
        }
    }
}

impl From<SourceError> for ValuationError {
    fn from(error: SourceError) -> Self {
        match error.kind() {
            SourceErrorKind::TickerNotFound => Self::TickerNotFound(error),
            _ => Self::DataProvider(error),
        }
    }
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
