use ferrodcf_core::{ConfigError, SourceError, ValidationError, ValuationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error(transparent)]
    DataProvider(#[from] SourceError),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Argument(_) => 2,
            Self::Valuation(ValuationError::TickerNotFound(_) | ValuationError::DataProvider(_)) => 4,
            Self::Valuation(_) => 3,
            Self::DataProvider(_) => 4,
            Self::Serialization(_) => 5,
            Self::StrictModeViolation { .. } => 6,
            Self::Io(_) => 10,
        }
    }
}

/// Exit code for a response whose envelope carries errors.
pub fn exit_code_for_error_code(code: &str) -> u8 {
    if code.starts_with("source.") {
        4
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrodcf_core::Ticker;

    #[test]
    fn valuation_input_and_provider_failures_have_distinct_codes() {
        let input = CliError::from(ValuationError::invalid_input("shares_outstanding", "zero"));
        assert_eq!(input.exit_code(), 3);

        let ticker = Ticker::parse("NOPE").expect("ticker");
        let missing = CliError::from(ValuationError::from(SourceError::ticker_not_found(&ticker)));
        assert_eq!(missing.exit_code(), 4);

        assert_eq!(CliError::Argument(String::from("x")).exit_code(), 2);
    }

    #[test]
    fn envelope_error_codes_map_by_prefix() {
        assert_eq!(exit_code_for_error_code("source.unavailable"), 4);
        assert_eq!(exit_code_for_error_code("valuation.invalid_input"), 3);
    }
}
