use serde::{Deserialize, Serialize};

use crate::valuation::assumptions::ensure_finite;
use crate::ValuationError;

/// Enterprise value to per-share value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityBridge {
    pub enterprise_value: f64,
    pub total_debt: f64,
    pub cash: f64,
    pub net_debt: f64,
    pub equity_value: f64,
    pub shares_outstanding: f64,
    pub value_per_share: f64,
}

pub fn value_per_share(
    sum_discounted_fcff: f64,
    discounted_terminal_value: f64,
    total_debt: f64,
    cash: f64,
    shares_outstanding: f64,
) -> Result<EquityBridge, ValuationError> {
    ensure_finite("sum_discounted_fcff", sum_discounted_fcff)?;
    ensure_finite("discounted_terminal_value", discounted_terminal_value)?;
    ensure_finite("total_debt", total_debt)?;
    ensure_finite("cash", cash)?;
    ensure_finite("shares_outstanding", shares_outstanding)?;
    if shares_outstanding <= 0.0 {
        return Err(ValuationError::invalid_input(
            "shares_outstanding",
            format!("shares outstanding must be positive, got {shares_outstanding}"),
        ));
    }

    let enterprise_value = sum_discounted_fcff + discounted_terminal_value;
    let equity_value = enterprise_value - total_debt + cash;

    Ok(EquityBridge {
        enterprise_value,
        total_debt,
        cash,
        net_debt: total_debt - cash,
        equity_value,
        shares_outstanding,
        value_per_share: equity_value / shares_outstanding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracts_debt_and_adds_cash() {
        let bridge = value_per_share(1_000.0, 4_000.0, 800.0, 300.0, 50.0).expect("bridge");
        assert_eq!(bridge.enterprise_value, 5_000.0);
        assert_eq!(bridge.net_debt, 500.0);
        assert_eq!(bridge.equity_value, 4_500.0);
        assert_eq!(bridge.value_per_share, 90.0);
    }

    #[test]
    fn zero_shares_is_invalid_not_infinite() {
        let err = value_per_share(1_000.0, 4_000.0, 0.0, 0.0, 0.0).expect_err("must fail");
        assert!(matches!(
            err,
            ValuationError::InvalidInput { field: "shares_outstanding", .. }
        ));
    }

    #[test]
    fn negative_equity_is_reported_as_is() {
        let bridge = value_per_share(100.0, 100.0, 1_000.0, 0.0, 10.0).expect("bridge");
        assert_eq!(bridge.value_per_share, -80.0);
    }
}
