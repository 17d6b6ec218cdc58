use serde::{Deserialize, Serialize};

use crate::valuation::MarketInputs;
use crate::{FinancialSnapshot, ValuationError};

/// Pre-tax cost of debt used when neither the caller nor the statements
/// provide one.
pub const DEFAULT_COST_OF_DEBT: f64 = 0.02;

/// Where the pre-tax cost of debt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostOfDebtSource {
    Supplied,
    InterestExpense,
    Default,
}

/// WACC together with every intermediate used to derive it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaccBreakdown {
    pub market_cap: f64,
    pub total_debt: f64,
    pub equity_weight: f64,
    pub debt_weight: f64,
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    pub cost_of_equity: f64,
    pub cost_of_debt: f64,
    pub cost_of_debt_source: CostOfDebtSource,
    pub tax_rate: f64,
    pub after_tax_cost_of_debt: f64,
    pub wacc: f64,
}

impl WaccBreakdown {
    /// Gordon growth only converges when the discount rate exceeds growth.
    pub fn ensure_exceeds(&self, terminal_growth: f64) -> Result<(), ValuationError> {
        if self.wacc <= terminal_growth {
            return Err(ValuationError::invalid_input(
                "terminal_growth",
                format!(
                    "terminal growth {:.4} must be below WACC {:.4}; terminal value would diverge",
                    terminal_growth, self.wacc
                ),
            ));
        }
        Ok(())
    }
}

/// CAPM: `rf + β × ERP`.
pub fn cost_of_equity(inputs: &MarketInputs) -> f64 {
    inputs.risk_free_rate + inputs.beta * inputs.equity_risk_premium
}

pub fn compute_wacc(
    snapshot: &FinancialSnapshot,
    inputs: &MarketInputs,
) -> Result<WaccBreakdown, ValuationError> {
    inputs.validate()?;

    let market_cap = snapshot.market_cap().ok_or_else(|| {
        ValuationError::invalid_input(
            "market_price",
            format!(
                "no market price for fiscal period ending {}; market capitalization is undefined",
                snapshot.fiscal_period_end
            ),
        )
    })?;
    let total_debt = snapshot.total_debt;
    let capital = market_cap + total_debt;
    if capital <= 0.0 {
        return Err(ValuationError::invalid_input(
            "market_cap",
            "market capitalization and total debt are both zero; capital weights are undefined",
        ));
    }

    let equity_weight = market_cap / capital;
    let debt_weight = total_debt / capital;

    let (cost_of_debt, cost_of_debt_source) = resolve_cost_of_debt(snapshot, inputs);
    let tax_rate = inputs.tax_rate.unwrap_or(snapshot.tax_rate);
    let after_tax_cost_of_debt = cost_of_debt * (1.0 - tax_rate);
    let cost_of_equity = cost_of_equity(inputs);

    let wacc = equity_weight * cost_of_equity + debt_weight * after_tax_cost_of_debt;
    if !(wacc > 0.0 && wacc < 1.0) {
        return Err(ValuationError::invalid_input(
            "wacc",
            format!("discount rate {wacc:.4} is outside (0, 1)"),
        ));
    }

    tracing::debug!(
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        equity_weight,
        "computed discount rate"
    );

    Ok(WaccBreakdown {
        market_cap,
        total_debt,
        equity_weight,
        debt_weight,
        risk_free_rate: inputs.risk_free_rate,
        beta: inputs.beta,
        equity_risk_premium: inputs.equity_risk_premium,
        cost_of_equity,
        cost_of_debt,
        cost_of_debt_source,
        tax_rate,
        after_tax_cost_of_debt,
        wacc,
    })
}

fn resolve_cost_of_debt(
    snapshot: &FinancialSnapshot,
    inputs: &MarketInputs,
) -> (f64, CostOfDebtSource) {
    if let Some(supplied) = inputs.cost_of_debt {
        return (supplied, CostOfDebtSource::Supplied);
    }

    match snapshot.interest_expense {
        Some(interest) if interest > 0.0 && snapshot.total_debt > 0.0 => (
            interest / snapshot.total_debt,
            CostOfDebtSource::InterestExpense,
        ),
        _ => (DEFAULT_COST_OF_DEBT, CostOfDebtSource::Default),
    }
}
