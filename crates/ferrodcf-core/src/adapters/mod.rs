//! Provider adapters.
//!
//! Each adapter runs against the real upstream when built with a live
//! [`HttpClient`](crate::http_client::HttpClient) and serves deterministic
//! data when the client reports `is_mock()`.

pub mod fred;
pub mod yahoo;

pub use fred::{FredAdapter, TEN_YEAR_TREASURY};
pub use yahoo::{YahooAdapter, YahooAuthManager};
