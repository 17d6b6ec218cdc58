//! # Domain Models
//!
//! Inputs of the valuation pipeline as delivered by a data source.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Normalized ticker symbol |
//! | [`FinancialSnapshot`] | Statement line items for one fiscal period |
//! | [`FinancialHistory`] | Ordered snapshots for one ticker |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Construction validates finiteness and sign constraints so the pipeline
//! only has to deal with economically invalid inputs (zero shares, diverging
//! terminal growth), never with NaN.

mod financials;
mod ticker;
mod timestamp;

pub use financials::{validate_currency_code, FinancialHistory, FinancialSnapshot};
pub use ticker::Ticker;
pub use timestamp::UtcDateTime;
