use serde::{Deserialize, Serialize};

use crate::ValuationError;

/// Longest forecast horizon accepted anywhere: config, flags or sessions.
pub const MAX_HORIZON_YEARS: u32 = 100;

/// How the starting FCFF of the projection is chosen from history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method", content = "periods")]
pub enum BaseFcffMethod {
    /// Most recent fiscal period only.
    Latest,
    /// Mean of the most recent `n` periods (fewer if history is shorter).
    TrailingAverage(usize),
}

impl Default for BaseFcffMethod {
    fn default() -> Self {
        Self::TrailingAverage(3)
    }
}

/// User-tunable projection parameters. Rates are decimals (0.05 = 5 %).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSet {
    pub horizon_years: u32,
    pub fcff_growth: f64,
    pub terminal_growth: f64,
    #[serde(default)]
    pub base_method: BaseFcffMethod,
}

impl Default for AssumptionSet {
    fn default() -> Self {
        Self {
            horizon_years: 10,
            fcff_growth: 0.14,
            terminal_growth: 0.05,
            base_method: BaseFcffMethod::default(),
        }
    }
}

impl AssumptionSet {
    pub fn new(
        horizon_years: u32,
        fcff_growth: f64,
        terminal_growth: f64,
    ) -> Result<Self, ValuationError> {
        let assumptions = Self {
            horizon_years,
            fcff_growth,
            terminal_growth,
            base_method: BaseFcffMethod::default(),
        };
        assumptions.validate()?;
        Ok(assumptions)
    }

    pub fn with_base_method(mut self, base_method: BaseFcffMethod) -> Self {
        self.base_method = base_method;
        self
    }

    /// Range checks that do not depend on the discount rate. Convergence
    /// against WACC is checked once WACC is known.
    pub fn validate(&self) -> Result<(), ValuationError> {
        ensure_horizon(self.horizon_years)?;
        ensure_finite("fcff_growth", self.fcff_growth)?;
        if self.fcff_growth < -1.0 {
            return Err(ValuationError::invalid_input(
                "fcff_growth",
                format!("growth rate {} is below -100%", self.fcff_growth),
            ));
        }
        ensure_finite("terminal_growth", self.terminal_growth)?;
        if self.terminal_growth <= -1.0 {
            return Err(ValuationError::invalid_input(
                "terminal_growth",
                format!("terminal growth {} must be above -100%", self.terminal_growth),
            ));
        }
        if let BaseFcffMethod::TrailingAverage(0) = self.base_method {
            return Err(ValuationError::invalid_input(
                "base_method",
                "trailing average needs at least one period",
            ));
        }
        Ok(())
    }
}

pub(crate) fn ensure_horizon(horizon_years: u32) -> Result<(), ValuationError> {
    if !(1..=MAX_HORIZON_YEARS).contains(&horizon_years) {
        return Err(ValuationError::invalid_input(
            "horizon_years",
            format!("forecast horizon {horizon_years} is outside 1..={MAX_HORIZON_YEARS} years"),
        ));
    }
    Ok(())
}

/// Capital-market inputs for the discount rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketInputs {
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    /// Pre-tax cost of debt. Derived from interest expense when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_of_debt: Option<f64>,
    /// Overrides the snapshot's effective tax rate for the debt shield.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
}

impl MarketInputs {
    pub fn new(risk_free_rate: f64, beta: f64, equity_risk_premium: f64) -> Self {
        Self {
            risk_free_rate,
            beta,
            equity_risk_premium,
            cost_of_debt: None,
            tax_rate: None,
        }
    }

    /// ERP taken as `market_return - risk_free_rate`.
    pub fn from_market_return(risk_free_rate: f64, beta: f64, market_return: f64) -> Self {
        Self::new(risk_free_rate, beta, market_return - risk_free_rate)
    }

    pub fn with_cost_of_debt(mut self, cost_of_debt: f64) -> Self {
        self.cost_of_debt = Some(cost_of_debt);
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = Some(tax_rate);
        self
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        ensure_finite("risk_free_rate", self.risk_free_rate)?;
        ensure_finite("beta", self.beta)?;
        ensure_finite("equity_risk_premium", self.equity_risk_premium)?;
        if let Some(cost_of_debt) = self.cost_of_debt {
            ensure_finite("cost_of_debt", cost_of_debt)?;
            if cost_of_debt < 0.0 {
                return Err(ValuationError::invalid_input(
                    "cost_of_debt",
                    "cost of debt cannot be negative",
                ));
            }
        }
        if let Some(tax_rate) = self.tax_rate {
            ensure_finite("tax_rate", tax_rate)?;
            if !(0.0..1.0).contains(&tax_rate) {
                return Err(ValuationError::invalid_input(
                    "tax_rate",
                    format!("tax rate {tax_rate} must be within [0, 1)"),
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), ValuationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValuationError::invalid_input(field, "value must be finite"))
    }
}
