use serde::{Deserialize, Serialize};

use crate::valuation::{
    base_fcff, compute_wacc, discount, discount_factor, discounted_terminal_value, fcff_history,
    project, terminal_value, value_per_share, AssumptionSet, BaseFcff, CostOfDebtSource,
    FcffPoint, MarketInputs, WaccBreakdown,
};
use crate::{FinancialHistory, Ticker, ValuationError};

/// One forecast year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCashFlow {
    pub year_offset: u32,
    pub fiscal_year: i32,
    pub fcff: f64,
    pub discount_factor: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: Ticker,
    pub currency: String,
    pub base_fiscal_year: i32,
    pub wacc: WaccBreakdown,
    pub base_fcff: BaseFcff,
    pub sum_discounted_fcff: f64,
    pub terminal_value: f64,
    pub discounted_terminal_value: f64,
    pub enterprise_value: f64,
    pub total_debt: f64,
    pub cash: f64,
    pub net_debt: f64,
    pub equity_value: f64,
    pub shares_outstanding: f64,
    pub fair_value_per_share: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_price: Option<f64>,
    /// `fair / price - 1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upside: Option<f64>,
}

/// Full output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub assumptions: AssumptionSet,
    pub result: ValuationResult,
    pub projections: Vec<ProjectedCashFlow>,
    pub fcff_history: Vec<FcffPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Valuation {
    pub fn projected_fcff(&self) -> Vec<f64> {
        self.projections.iter().map(|year| year.fcff).collect()
    }
}

/// Runs FCFF history → WACC → projection → discounting → terminal value →
/// equity bridge. Pure: identical inputs give identical output.
pub fn value_company(
    history: &FinancialHistory,
    assumptions: &AssumptionSet,
    market: &MarketInputs,
) -> Result<Valuation, ValuationError> {
    assumptions.validate()?;
    market.validate()?;

    let fcff_history = fcff_history(&history.snapshots)?;
    let latest = history.latest().ok_or(ValuationError::DataInsufficient {
        required: 1,
        available: 0,
    })?;
    let base = base_fcff(&fcff_history, assumptions.base_method)?;

    let wacc = compute_wacc(latest, market)?;
    wacc.ensure_exceeds(assumptions.terminal_growth)?;
    let rate = wacc.wacc;

    let projected = project(base.value, assumptions.fcff_growth, assumptions.horizon_years)?;
    let present_values = discount(&projected, rate)?;
    let base_fiscal_year = latest.fiscal_year();
    let projections = projected
        .iter()
        .zip(&present_values)
        .zip(1_u32..)
        .map(|((fcff, present_value), year_offset)| ProjectedCashFlow {
            year_offset,
            fiscal_year: i32::try_from(year_offset)
                .map_or(i32::MAX, |offset| base_fiscal_year.saturating_add(offset)),
            fcff: *fcff,
            discount_factor: discount_factor(rate, year_offset),
            present_value: *present_value,
        })
        .collect::<Vec<_>>();

    let last_fcff = projected.last().copied().unwrap_or(base.value);
    let terminal = terminal_value(last_fcff, assumptions.terminal_growth, rate)?;
    let discounted_terminal = discounted_terminal_value(terminal, rate, assumptions.horizon_years);
    let sum_discounted_fcff = present_values.iter().sum::<f64>();

    let bridge = value_per_share(
        sum_discounted_fcff,
        discounted_terminal,
        latest.total_debt,
        latest.cash_and_equivalents,
        latest.shares_outstanding,
    )?;

    let market_price = latest.market_price;
    let upside = market_price
        .filter(|price| *price > 0.0)
        .map(|price| bridge.value_per_share / price - 1.0);

    let mut warnings = history.data_notes.clone();
    warnings.extend(collect_warnings(&base, &wacc, bridge.value_per_share));

    tracing::debug!(
        ticker = %history.ticker,
        wacc = rate,
        enterprise_value = bridge.enterprise_value,
        fair_value_per_share = bridge.value_per_share,
        "valuation complete"
    );

    Ok(Valuation {
        assumptions: *assumptions,
        result: ValuationResult {
            ticker: history.ticker.clone(),
            currency: history.currency.clone(),
            base_fiscal_year,
            wacc,
            base_fcff: base,
            sum_discounted_fcff,
            terminal_value: terminal,
            discounted_terminal_value: discounted_terminal,
            enterprise_value: bridge.enterprise_value,
            total_debt: bridge.total_debt,
            cash: bridge.cash,
            net_debt: bridge.net_debt,
            equity_value: bridge.equity_value,
            shares_outstanding: bridge.shares_outstanding,
            fair_value_per_share: bridge.value_per_share,
            market_price,
            upside,
        },
        projections,
        fcff_history,
        warnings,
    })
}

fn collect_warnings(base: &BaseFcff, wacc: &WaccBreakdown, fair_value: f64) -> Vec<String> {
    let mut warnings = Vec::new();
    if base.periods_used < base.periods_requested {
        warnings.push(format!(
            "base FCFF averaged over {} period(s); {} requested",
            base.periods_used, base.periods_requested
        ));
    }
    if base.value < 0.0 {
        warnings.push(String::from(
            "base FCFF is negative; projected cash flows and terminal value are negative",
        ));
    }
    if wacc.cost_of_debt_source == CostOfDebtSource::Default && wacc.total_debt > 0.0 {
        warnings.push(format!(
            "no interest expense reported; pre-tax cost of debt defaulted to {:.2}%",
            wacc.cost_of_debt * 100.0
        ));
    }
    if fair_value < 0.0 {
        warnings.push(String::from(
            "equity value is negative: net debt exceeds enterprise value",
        ));
    }
    warnings
}
