use serde::{Deserialize, Serialize};

use crate::valuation::BaseFcffMethod;
use crate::{FinancialSnapshot, ValuationError};

/// FCFF of one historical period with its components, for trend display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FcffPoint {
    pub fiscal_year: i32,
    pub nopat: f64,
    pub depreciation_amortization: f64,
    pub capital_expenditure: f64,
    pub change_in_nwc: f64,
    pub fcff: f64,
}

/// Starting value of the projection and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseFcff {
    pub value: f64,
    pub periods_requested: usize,
    pub periods_used: usize,
}

/// `EBIT × (1 − t) + D&A − CapEx − ΔNWC`
pub fn compute_fcff(snapshot: &FinancialSnapshot) -> f64 {
    fcff_point(snapshot).fcff
}

pub fn fcff_point(snapshot: &FinancialSnapshot) -> FcffPoint {
    let nopat = snapshot.ebit * (1.0 - snapshot.tax_rate);
    FcffPoint {
        fiscal_year: snapshot.fiscal_year(),
        nopat,
        depreciation_amortization: snapshot.depreciation_amortization,
        capital_expenditure: snapshot.capital_expenditure,
        change_in_nwc: snapshot.change_in_nwc,
        fcff: nopat + snapshot.depreciation_amortization
            - snapshot.capital_expenditure
            - snapshot.change_in_nwc,
    }
}

/// One FCFF per period, oldest first.
pub fn fcff_history(snapshots: &[FinancialSnapshot]) -> Result<Vec<FcffPoint>, ValuationError> {
    if snapshots.is_empty() {
        return Err(ValuationError::DataInsufficient {
            required: 1,
            available: 0,
        });
    }
    Ok(snapshots.iter().map(fcff_point).collect())
}

pub fn base_fcff(history: &[FcffPoint], method: BaseFcffMethod) -> Result<BaseFcff, ValuationError> {
    let requested = match method {
        BaseFcffMethod::Latest => 1,
        BaseFcffMethod::TrailingAverage(0) => {
            return Err(ValuationError::invalid_input(
                "base_method",
                "trailing average needs at least one period",
            ))
        }
        BaseFcffMethod::TrailingAverage(periods) => periods,
    };

    if history.is_empty() {
        return Err(ValuationError::DataInsufficient {
            required: 1,
            available: 0,
        });
    }

    let used = requested.min(history.len());
    let window = &history[history.len() - used..];
    let value = window.iter().map(|point| point.fcff).sum::<f64>() / used as f64;

    Ok(BaseFcff {
        value,
        periods_requested: requested,
        periods_used: used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn snapshot(year: i32, ebit: f64) -> FinancialSnapshot {
        FinancialSnapshot {
            fiscal_period_end: date!(2020 - 12 - 31)
                .replace_year(year)
                .expect("valid year"),
            revenue: 10_000.0,
            ebit,
            tax_rate: 0.25,
            depreciation_amortization: 100.0,
            capital_expenditure: 150.0,
            change_in_nwc: 50.0,
            interest_expense: None,
            total_debt: 0.0,
            cash_and_equivalents: 0.0,
            shares_outstanding: 1.0,
            market_price: None,
        }
    }

    #[test]
    fn reference_fcff_is_650() {
        assert_eq!(compute_fcff(&snapshot(2024, 1_000.0)), 650.0);
    }

    #[test]
    fn breakdown_exposes_nopat() {
        let point = fcff_point(&snapshot(2024, 1_000.0));
        assert_eq!(point.fiscal_year, 2024);
        assert_eq!(point.nopat, 750.0);
    }

    #[test]
    fn empty_history_is_insufficient() {
        let err = fcff_history(&[]).expect_err("must fail");
        assert_eq!(
            err,
            ValuationError::DataInsufficient {
                required: 1,
                available: 0
            }
        );
    }

    #[test]
    fn trailing_average_uses_most_recent_periods() {
        let history = fcff_history(&[
            snapshot(2021, 0.0),
            snapshot(2022, 1_000.0),
            snapshot(2023, 2_000.0),
            snapshot(2024, 3_000.0),
        ])
        .expect("history");

        // last three years: 650, 1400, 2150
        let base = base_fcff(&history, BaseFcffMethod::TrailingAverage(3)).expect("base");
        assert_eq!(base.periods_used, 3);
        assert!((base.value - 1_400.0).abs() < 1e-9);

        let latest = base_fcff(&history, BaseFcffMethod::Latest).expect("latest");
        assert_eq!(latest.value, 2_150.0);
    }

    #[test]
    fn trailing_average_clamps_to_available_history() {
        let history = fcff_history(&[snapshot(2024, 1_000.0)]).expect("history");
        let base = base_fcff(&history, BaseFcffMethod::TrailingAverage(5)).expect("base");
        assert_eq!(base.periods_requested, 5);
        assert_eq!(base.periods_used, 1);
        assert_eq!(base.value, 650.0);
    }
}
