//! Behavior-driven tests for end-to-end valuation journeys
//!
//! These tests follow what a user does: fetch statements, pick assumptions,
//! value the company, then explore how sensitive the answer is.

use ferrodcf_core::{
    adapters::{FredAdapter, YahooAdapter},
    data_source::{FinancialsRequest, FinancialsSource, RateSource},
    envelope::{Envelope, EnvelopeMeta, SCHEMA_VERSION},
    sensitivity_for, value_company, AssumptionSet, BaseFcffMethod, FinancialHistory, MarketInputs,
    ProviderId, RateAxis, Ticker, Valuation,
};

async fn offline_history(symbol: &str) -> FinancialHistory {
    YahooAdapter::default()
        .financials(FinancialsRequest::new(
            Ticker::parse(symbol).expect("valid ticker"),
        ))
        .await
        .expect("catalogued ticker")
}

async fn offline_market(history: &FinancialHistory) -> MarketInputs {
    let observation = FredAdapter::default()
        .risk_free_rate()
        .await
        .expect("offline rate");
    MarketInputs::from_market_return(observation.rate, history.beta.unwrap_or(1.0), 0.09)
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= 1e-6 * expected.abs().max(1.0)
}

async fn default_valuation(symbol: &str) -> Valuation {
    let history = offline_history(symbol).await;
    let market = offline_market(&history).await;
    value_company(&history, &AssumptionSet::default(), &market).expect("valuation")
}

// =============================================================================
// Journey: value a company with default assumptions
// =============================================================================

#[tokio::test]
async fn user_values_a_company_with_default_assumptions_and_sees_every_stage() {
    // Given: Offline statements and the fixed offline risk-free rate
    // When: The user values AAPL with the default assumptions
    let valuation = default_valuation("AAPL").await;

    // Then: The horizon, projections and bridge are all present and consistent
    let result = &valuation.result;
    assert_eq!(valuation.assumptions.horizon_years, 10);
    assert_eq!(valuation.projections.len(), 10);
    for (offset, year) in valuation.projections.iter().enumerate() {
        assert_eq!(year.fiscal_year, result.base_fiscal_year + offset as i32 + 1);
        assert!(year.present_value < year.fcff, "discounting must shrink positive FCFF");
    }
    assert!(result.wacc.wacc > valuation.assumptions.terminal_growth);
    assert!(result.fair_value_per_share > 0.0);
    assert!(close(
        result.enterprise_value,
        result.sum_discounted_fcff + result.discounted_terminal_value
    ));
    assert!(close(result.equity_value, result.enterprise_value - result.net_debt));
}

#[tokio::test]
async fn user_sees_upside_relative_to_the_current_price() {
    let valuation = default_valuation("KO").await;
    let result = &valuation.result;

    let price = result.market_price.expect("offline data carries a price");
    let upside = result.upside.expect("upside follows from the price");
    assert!(close(upside, result.fair_value_per_share / price - 1.0));
}

#[tokio::test]
async fn user_sees_the_historical_fcff_trend_behind_the_base() {
    // Given: Several fiscal years of statements
    let history = offline_history("MSFT").await;
    let market = offline_market(&history).await;

    // When: The base is averaged over three years
    let assumptions = AssumptionSet::default().with_base_method(BaseFcffMethod::TrailingAverage(3));
    let valuation = value_company(&history, &assumptions, &market).expect("valuation");

    // Then: The base is the mean of the last three FCFF values
    let trend = &valuation.fcff_history;
    assert_eq!(trend.len(), history.len());
    let last_three = &trend[trend.len() - 3..];
    let mean = last_three.iter().map(|point| point.fcff).sum::<f64>() / 3.0;
    assert!(close(valuation.result.base_fcff.value, mean));
    assert_eq!(valuation.result.base_fcff.periods_used, 3);
}

// =============================================================================
// Journey: adjust assumptions and compare
// =============================================================================

#[tokio::test]
async fn user_raises_growth_and_the_fair_value_rises() {
    let history = offline_history("NVDA").await;
    let market = offline_market(&history).await;

    let cautious = AssumptionSet::new(10, 0.05, 0.03).expect("valid");
    let bullish = AssumptionSet::new(10, 0.20, 0.03).expect("valid");

    let low = value_company(&history, &cautious, &market).expect("valuation");
    let high = value_company(&history, &bullish, &market).expect("valuation");

    assert!(high.result.fair_value_per_share > low.result.fair_value_per_share);
    assert_eq!(high.result.wacc, low.result.wacc, "growth must not move the discount rate");
}

#[tokio::test]
async fn user_raises_the_market_return_and_the_fair_value_falls() {
    let history = offline_history("AAPL").await;
    let assumptions = AssumptionSet::new(10, 0.08, 0.03).expect("valid");

    let calm = MarketInputs::from_market_return(0.0425, 1.2, 0.08);
    let demanding = MarketInputs::from_market_return(0.0425, 1.2, 0.11);

    let calm = value_company(&history, &assumptions, &calm).expect("valuation");
    let demanding = value_company(&history, &assumptions, &demanding).expect("valuation");

    assert!(demanding.result.wacc.wacc > calm.result.wacc.wacc);
    assert!(demanding.result.fair_value_per_share < calm.result.fair_value_per_share);
}

// =============================================================================
// Journey: sensitivity grid
// =============================================================================

#[tokio::test]
async fn user_explores_the_grid_and_finds_the_base_case_in_it() {
    // Given: A default valuation
    let valuation = default_valuation("AAPL").await;
    let base_wacc = valuation.result.wacc.wacc;

    // When: The classic grid is built around it
    let wacc_axis = RateAxis::default_wacc(base_wacc).expect("axis");
    let grid = sensitivity_for(&valuation, &wacc_axis, &RateAxis::default_terminal_growth())
        .expect("grid");

    // Then: The centre row and the 5 % column reproduce the base valuation
    assert_eq!(grid.wacc_values.len(), 5);
    assert_eq!(grid.terminal_growth_values, vec![0.035, 0.04, 0.045, 0.05, 0.055]);
    let centre = grid.cell(2, 3).expect("defined cell");
    assert!(close(centre, valuation.result.fair_value_per_share));

    // And: Value falls as WACC rises along every defined column
    for column in 0..grid.terminal_growth_values.len() {
        let values = (0..grid.wacc_values.len())
            .filter_map(|row| grid.cell(row, column))
            .collect::<Vec<_>>();
        assert!(values.windows(2).all(|pair| pair[1] < pair[0]));
    }
}

#[tokio::test]
async fn user_stretches_the_grid_past_convergence_and_sees_gaps_not_garbage() {
    let valuation = default_valuation("KO").await;

    let wacc_axis = RateAxis::new(0.03, 0.06, 0.01).expect("axis");
    let growth_axis = RateAxis::new(0.02, 0.05, 0.01).expect("axis");
    let grid = sensitivity_for(&valuation, &wacc_axis, &growth_axis).expect("grid");

    for (row, wacc) in grid.wacc_values.iter().enumerate() {
        for (column, growth) in grid.terminal_growth_values.iter().enumerate() {
            match grid.cell(row, column) {
                Some(value) => assert!(wacc > growth && value.is_finite()),
                None => assert!(wacc <= growth),
            }
        }
    }
    assert!(grid.undefined_cells() > 0);
}

// =============================================================================
// Journey: machine-readable output
// =============================================================================

#[tokio::test]
async fn user_receives_the_valuation_inside_a_versioned_envelope() {
    let valuation = default_valuation("SAP.DE").await;

    let meta = EnvelopeMeta::new(
        "req-00000001",
        vec![ProviderId::Yahoo, ProviderId::Fred],
        12,
        false,
    )
    .expect("valid meta");
    let envelope = Envelope::success(meta, &valuation);
    let json = serde_json::to_value(&envelope).expect("serializable");

    assert_eq!(json["meta"]["schema_version"], SCHEMA_VERSION);
    assert_eq!(json["meta"]["source_chain"], serde_json::json!(["yahoo", "fred"]));
    assert_eq!(json["data"]["result"]["currency"], "EUR");
    assert!(json.get("errors").is_none());
}
