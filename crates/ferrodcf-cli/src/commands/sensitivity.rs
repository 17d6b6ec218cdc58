use std::time::Instant;

use ferrodcf_core::{
    sensitivity_for, value_company, ProviderId, RateAxis, SensitivityGrid, Ticker, ValuationError,
};
use serde::Serialize;

use crate::cli::SensitivityArgs;
use crate::error::CliError;
use crate::inputs::pct;
use crate::output::views;

use super::{elapsed_ms, CommandResult, Context, Prepared};

#[derive(Debug, Serialize)]
struct SensitivityResponseData<'a> {
    ticker: &'a Ticker,
    currency: &'a str,
    base_wacc: f64,
    base_terminal_growth: f64,
    base_fair_value_per_share: f64,
    grid: &'a SensitivityGrid,
}

pub async fn run(args: &SensitivityArgs, context: &Context) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let ticker = Ticker::parse(&args.ticker)?;

    let prepared = match context.prepare(&ticker, &args.assumptions).await {
        Ok(prepared) => prepared,
        Err(error) => return CommandResult::failure(&error, vec![ProviderId::Yahoo]),
    };

    let result = match build(args, &prepared) {
        Ok((grid, mut warnings, base)) => {
            let currency = prepared.history.currency.as_str();
            let data = serde_json::to_value(SensitivityResponseData {
                ticker: &prepared.history.ticker,
                currency,
                base_wacc: base.0,
                base_terminal_growth: prepared.assumptions.terminal_growth,
                base_fair_value_per_share: base.1,
                grid: &grid,
            })?;
            let undefined = grid.undefined_cells();
            if undefined > 0 {
                warnings.push(format!(
                    "{undefined} grid cell(s) undefined where WACC does not exceed terminal growth"
                ));
            }
            CommandResult::ok(data, prepared.source_chain.clone())
                .with_tables(vec![views::sensitivity_table(&grid, currency)])
                .with_warnings(warnings)
        }
        Err(error) => CommandResult::failure(&error, prepared.source_chain.clone())?,
    };

    Ok(result
        .with_warnings(prepared.warnings)
        .with_cache_hit(prepared.cache_hit)
        .with_latency(elapsed_ms(started)))
}

/// Grid, valuation warnings and the base (WACC, fair value) it is centred on.
fn build(
    args: &SensitivityArgs,
    prepared: &Prepared,
) -> Result<(SensitivityGrid, Vec<String>, (f64, f64)), ValuationError> {
    let valuation = value_company(
        &prepared.history,
        &prepared.assumptions,
        &prepared.market.to_inputs(),
    )?;
    let base_wacc = valuation.result.wacc.wacc;

    let wacc_axis = RateAxis::around(base_wacc, pct(args.wacc_span_pct), pct(args.wacc_step_pct))?;
    let growth_axis = RateAxis::new(
        pct(args.growth_from_pct),
        pct(args.growth_to_pct),
        pct(args.growth_step_pct),
    )?;
    let grid = sensitivity_for(&valuation, &wacc_axis, &growth_axis)?;

    Ok((
        grid,
        valuation.warnings,
        (base_wacc, valuation.result.fair_value_per_share),
    ))
}
