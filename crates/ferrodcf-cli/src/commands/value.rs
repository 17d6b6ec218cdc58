use std::time::Instant;

use ferrodcf_core::{value_company, ProviderId, Ticker, Valuation};
use serde::Serialize;

use crate::cli::ValueArgs;
use crate::error::CliError;
use crate::inputs::MarketAssumptions;
use crate::output::views;

use super::{elapsed_ms, CommandResult, Context};

#[derive(Debug, Serialize)]
struct ValueResponseData<'a> {
    market_inputs: &'a MarketAssumptions,
    valuation: &'a Valuation,
}

pub async fn run(args: &ValueArgs, context: &Context) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let ticker = Ticker::parse(&args.ticker)?;

    let prepared = match context.prepare(&ticker, &args.assumptions).await {
        Ok(prepared) => prepared,
        Err(error) => return CommandResult::failure(&error, vec![ProviderId::Yahoo]),
    };

    let mut warnings = prepared.warnings;
    let result = match value_company(
        &prepared.history,
        &prepared.assumptions,
        &prepared.market.to_inputs(),
    ) {
        Ok(mut valuation) => {
            warnings.append(&mut valuation.warnings);
            let data = serde_json::to_value(ValueResponseData {
                market_inputs: &prepared.market,
                valuation: &valuation,
            })?;
            CommandResult::ok(data, prepared.source_chain)
                .with_tables(views::valuation_tables(&valuation, &prepared.market))
        }
        Err(error) => {
            warnings.extend(prepared.history.data_notes.iter().cloned());
            CommandResult::failure(&error, prepared.source_chain)?
        }
    };

    Ok(result
        .with_warnings(warnings)
        .with_cache_hit(prepared.cache_hit)
        .with_latency(elapsed_ms(started)))
}
