use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_TICKER_LEN: usize = 20;

/// Upper-cased ticker symbol as typed by the user.
///
/// Only obviously malformed input is rejected here. Whether a ticker exists
/// (`BRK-B`, `0700.HK`, `^GSPC`, ...) is for the data provider to decide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTicker);
        }

        let len = trimmed.chars().count();
        if len > MAX_TICKER_LEN {
            return Err(ValidationError::TickerTooLong {
                len,
                max: MAX_TICKER_LEN,
            });
        }

        if let Some((index, ch)) = trimmed
            .chars()
            .enumerate()
            .find(|(_, ch)| ch.is_whitespace() || ch.is_control() || matches!(ch, '/' | '?' | '#' | '&'))
        {
            return Err(ValidationError::TickerInvalidChar { ch, index });
        }

        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Ticker {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let ticker = Ticker::parse("  msft ").expect("ticker should parse");
        assert_eq!(ticker.as_str(), "MSFT");
    }

    #[test]
    fn accepts_provider_specific_shapes() {
        for raw in ["BRK-B", "0700.hk", "^GSPC", "RDS.A"] {
            assert!(Ticker::parse(raw).is_ok(), "{raw} should be accepted");
        }
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert_eq!(Ticker::parse("   "), Err(ValidationError::EmptyTicker));
    }

    #[test]
    fn rejects_inner_whitespace_and_url_characters() {
        assert!(matches!(
            Ticker::parse("MS FT"),
            Err(ValidationError::TickerInvalidChar { ch: ' ', index: 2 })
        ));
        assert!(matches!(
            Ticker::parse("AAPL?x=1"),
            Err(ValidationError::TickerInvalidChar { ch: '?', .. })
        ));
    }

    #[test]
    fn rejects_overlong_input() {
        let err = Ticker::parse("ABCDEFGHIJKLMNOPQRSTU").expect_err("21 chars must fail");
        assert_eq!(err, ValidationError::TickerTooLong { len: 21, max: 20 });
    }
}
