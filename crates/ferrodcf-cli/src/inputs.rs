//! Resolution of assumption and market inputs from flags, settings and
//! provider data. Flags win over settings; settings win over provider data.

use ferrodcf_core::config::{AssumptionSettings, MarketSettings};
use ferrodcf_core::{
    AssumptionSet, FinancialHistory, MarketInputs, ProviderId, RateSource, ValuationError,
};
use serde::Serialize;

use crate::cli::AssumptionArgs;

const DEFAULT_BETA: f64 = 1.0;

/// Converts a percentage flag to a decimal rate.
pub fn pct(value: f64) -> f64 {
    value / 100.0
}

pub fn resolve_assumptions(
    settings: &AssumptionSettings,
    args: &AssumptionArgs,
) -> Result<AssumptionSet, ValuationError> {
    let mut resolved = *settings;
    if let Some(years) = args.years {
        resolved.horizon_years = years;
    }
    if let Some(growth) = args.growth_pct {
        resolved.fcff_growth = pct(growth);
    }
    if let Some(terminal) = args.terminal_growth_pct {
        resolved.terminal_growth = pct(terminal);
    }
    if let Some(base_years) = args.base_years {
        resolved.base_years = base_years;
    }

    let assumptions = resolved.to_assumption_set();
    assumptions.validate()?;
    Ok(assumptions)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RiskFreeSource {
    Flag,
    Config,
    Fred {
        series_id: String,
        observed_on: String,
    },
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaSource {
    Flag,
    Config,
    Provider,
    Default,
}

/// Capital-market assumptions as the user sees them. The equity risk premium
/// is derived, so changing the risk-free rate keeps the market return fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAssumptions {
    pub risk_free_rate: f64,
    pub risk_free_source: RiskFreeSource,
    pub market_return: f64,
    pub beta: f64,
    pub beta_source: BetaSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_of_debt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
}

impl MarketAssumptions {
    pub fn to_inputs(&self) -> MarketInputs {
        let mut inputs =
            MarketInputs::from_market_return(self.risk_free_rate, self.beta, self.market_return);
        if let Some(cost_of_debt) = self.cost_of_debt {
            inputs = inputs.with_cost_of_debt(cost_of_debt);
        }
        if let Some(tax_rate) = self.tax_rate {
            inputs = inputs.with_tax_rate(tax_rate);
        }
        inputs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketResolution {
    pub market: MarketAssumptions,
    pub warnings: Vec<String>,
    /// Providers called while resolving, in call order.
    pub consulted: Vec<ProviderId>,
}

/// Never fails: an unreachable rate source degrades to the configured
/// fallback with a warning.
pub async fn resolve_market(
    settings: &MarketSettings,
    args: &AssumptionArgs,
    history: &FinancialHistory,
    rates: &dyn RateSource,
) -> MarketResolution {
    let mut warnings = Vec::new();
    let mut consulted = Vec::new();

    let (risk_free_rate, risk_free_source) = match (args.risk_free_pct, settings.risk_free_rate) {
        (Some(flag), _) => (pct(flag), RiskFreeSource::Flag),
        (None, Some(configured)) => (configured, RiskFreeSource::Config),
        (None, None) => {
            consulted.push(rates.id());
            match rates.risk_free_rate().await {
                Ok(observation) => (
                    observation.rate,
                    RiskFreeSource::Fred {
                        series_id: observation.series_id,
                        observed_on: observation.observed_on,
                    },
                ),
                Err(error) => {
                    warnings.push(format!(
                        "risk-free rate unavailable ({error}); using fallback {:.2}%",
                        settings.fallback_risk_free_rate * 100.0
                    ));
                    (settings.fallback_risk_free_rate, RiskFreeSource::Fallback)
                }
            }
        }
    };

    let (beta, beta_source) = match (args.beta, settings.beta, history.beta) {
        (Some(flag), _, _) => (flag, BetaSource::Flag),
        (None, Some(configured), _) => (configured, BetaSource::Config),
        (None, None, Some(reported)) => (reported, BetaSource::Provider),
        (None, None, None) => {
            warnings.push(format!(
                "no beta reported for {}; using {DEFAULT_BETA:.2}",
                history.ticker
            ));
            (DEFAULT_BETA, BetaSource::Default)
        }
    };

    let market = MarketAssumptions {
        risk_free_rate,
        risk_free_source,
        market_return: args.market_return_pct.map_or(settings.market_return, pct),
        beta,
        beta_source,
        cost_of_debt: args.cost_of_debt_pct.map(pct).or(settings.cost_of_debt),
        tax_rate: args.tax_rate_pct.map(pct),
    };

    MarketResolution {
        market,
        warnings,
        consulted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    use ferrodcf_core::{BaseFcffMethod, FredAdapter, RateObservation, SourceError, Ticker};

    struct DownRateSource;

    impl RateSource for DownRateSource {
        fn id(&self) -> ProviderId {
            ProviderId::Fred
        }

        fn risk_free_rate<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<RateObservation, SourceError>> + Send + 'a>>
        {
            Box::pin(async { Err(SourceError::unavailable("fred returned status 503")) })
        }
    }

    fn history(beta: Option<f64>) -> FinancialHistory {
        FinancialHistory::new(Ticker::parse("ACME").expect("ticker"), "USD", Vec::new(), beta)
            .expect("history")
    }

    #[test]
    fn percent_flags_override_settings() {
        let args = AssumptionArgs {
            years: Some(5),
            growth_pct: Some(8.0),
            terminal_growth_pct: Some(2.5),
            base_years: Some(1),
            ..AssumptionArgs::default()
        };
        let assumptions =
            resolve_assumptions(&AssumptionSettings::default(), &args).expect("valid");

        assert_eq!(assumptions.horizon_years, 5);
        assert!((assumptions.fcff_growth - 0.08).abs() < 1e-12);
        assert!((assumptions.terminal_growth - 0.025).abs() < 1e-12);
        assert_eq!(assumptions.base_method, BaseFcffMethod::Latest);
    }

    #[test]
    fn horizon_outside_one_to_a_hundred_is_invalid_input() {
        for years in [0, 101, u32::MAX] {
            let args = AssumptionArgs {
                years: Some(years),
                ..AssumptionArgs::default()
            };
            assert!(matches!(
                resolve_assumptions(&AssumptionSettings::default(), &args),
                Err(ValuationError::InvalidInput { field: "horizon_years", .. })
            ));
        }
    }

    #[tokio::test]
    async fn rate_comes_from_fred_and_beta_from_provider() {
        let resolution = resolve_market(
            &MarketSettings::default(),
            &AssumptionArgs::default(),
            &history(Some(1.3)),
            &FredAdapter::default(),
        )
        .await;

        assert!(resolution.warnings.is_empty());
        assert_eq!(resolution.consulted, vec![ProviderId::Fred]);
        assert!(matches!(
            resolution.market.risk_free_source,
            RiskFreeSource::Fred { .. }
        ));
        assert_eq!(resolution.market.beta, 1.3);
        assert_eq!(resolution.market.beta_source, BetaSource::Provider);
        assert_eq!(resolution.market.market_return, 0.09);
    }

    #[tokio::test]
    async fn unreachable_rate_source_falls_back_with_warning() {
        let resolution = resolve_market(
            &MarketSettings::default(),
            &AssumptionArgs::default(),
            &history(None),
            &DownRateSource,
        )
        .await;

        assert_eq!(resolution.market.risk_free_rate, 0.0425);
        assert_eq!(resolution.market.risk_free_source, RiskFreeSource::Fallback);
        assert_eq!(resolution.market.beta_source, BetaSource::Default);
        assert_eq!(resolution.warnings.len(), 2);
        assert!(resolution.warnings[0].contains("fallback 4.25%"));
    }

    #[tokio::test]
    async fn flags_skip_the_rate_lookup() {
        let args = AssumptionArgs {
            risk_free_pct: Some(3.0),
            beta: Some(0.8),
            cost_of_debt_pct: Some(5.0),
            ..AssumptionArgs::default()
        };
        let resolution =
            resolve_market(&MarketSettings::default(), &args, &history(Some(1.3)), &DownRateSource)
                .await;

        assert!(resolution.consulted.is_empty());
        assert!(resolution.warnings.is_empty());
        let inputs = resolution.market.to_inputs();
        assert!((inputs.risk_free_rate - 0.03).abs() < 1e-12);
        assert!((inputs.equity_risk_premium - 0.06).abs() < 1e-12);
        assert_eq!(inputs.beta, 0.8);
        assert_eq!(inputs.cost_of_debt, Some(0.05));
    }
}
