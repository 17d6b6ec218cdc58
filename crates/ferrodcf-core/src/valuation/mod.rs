//! # Valuation
//!
//! Pure DCF computations. No I/O happens here: data sources fill a
//! [`FinancialHistory`](crate::FinancialHistory) and [`value_company`] turns it
//! into a [`Valuation`].
//!
//! ## Pipeline
//!
//! 1. [`fcff_history`] computes FCFF per fiscal period, [`base_fcff`] picks the
//!    starting value.
//! 2. [`compute_wacc`] derives the discount rate from the latest period and
//!    [`MarketInputs`].
//! 3. [`project`] grows the base FCFF over the horizon, [`discount`] brings each
//!    year to present value.
//! 4. [`terminal_value`] applies Gordon growth at the end of the horizon.
//! 5. [`value_per_share`] bridges enterprise value to equity per share.
//!
//! [`sensitivity`] re-runs steps 3–5 over a WACC × terminal-growth grid.

mod assumptions;
mod bridge;
mod discount;
mod fcff;
mod pipeline;
mod projection;
mod sensitivity;
mod wacc;

pub use assumptions::{AssumptionSet, BaseFcffMethod, MarketInputs, MAX_HORIZON_YEARS};
pub use bridge::{value_per_share, EquityBridge};
pub use discount::{discount, discount_factor, discounted_terminal_value, terminal_value};
pub use fcff::{base_fcff, compute_fcff, fcff_history, fcff_point, BaseFcff, FcffPoint};
pub use pipeline::{value_company, ProjectedCashFlow, Valuation, ValuationResult};
pub use projection::project;
pub use sensitivity::{sensitivity, sensitivity_for, RateAxis, SensitivityGrid};
pub use wacc::{compute_wacc, cost_of_equity, CostOfDebtSource, WaccBreakdown, DEFAULT_COST_OF_DEBT};
