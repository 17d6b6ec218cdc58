use std::time::Instant;

use ferrodcf_core::valuation::{base_fcff, fcff_history, BaseFcff, FcffPoint};
use ferrodcf_core::{ProviderId, Ticker, ValuationError};
use serde::Serialize;

use crate::cli::FcffArgs;
use crate::error::CliError;
use crate::output::views;

use super::{elapsed_ms, CommandResult, Context};

#[derive(Debug, Serialize)]
struct FcffResponseData<'a> {
    ticker: &'a Ticker,
    currency: &'a str,
    history: &'a [FcffPoint],
    base_fcff: BaseFcff,
}

pub async fn run(args: &FcffArgs, context: &Context) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let ticker = Ticker::parse(&args.ticker)?;
    let source_chain = vec![ProviderId::Yahoo];

    let fetched = match context.fetch(&ticker, args.refresh).await {
        Ok(fetched) => fetched,
        Err(error) => {
            return CommandResult::failure(&ValuationError::from(error), source_chain);
        }
    };

    let base_method = context.settings.assumptions.to_assumption_set().base_method;
    let computed = fcff_history(&fetched.history.snapshots).and_then(|history| {
        let base = base_fcff(&history, base_method)?;
        Ok((history, base))
    });

    let result = match computed {
        Ok((history, base)) => {
            let data = serde_json::to_value(FcffResponseData {
                ticker: &fetched.history.ticker,
                currency: &fetched.history.currency,
                history: &history,
                base_fcff: base,
            })?;
            let mut warnings = fetched.history.data_notes.clone();
            if base.periods_used < base.periods_requested {
                warnings.push(format!(
                    "only {} fiscal period(s) available; {} requested for the base FCFF",
                    base.periods_used, base.periods_requested
                ));
            }
            CommandResult::ok(data, source_chain)
                .with_tables(vec![views::fcff_table(&history)])
                .with_warnings(warnings)
        }
        Err(error) => CommandResult::failure(&error, source_chain)?
            .with_warnings(fetched.history.data_notes.clone()),
    };

    Ok(result
        .with_cache_hit(fetched.cache_hit)
        .with_latency(elapsed_ms(started)))
}
