//! Line-driven valuation session.
//!
//! Statements are fetched once; every `set` re-runs the full pipeline on the
//! held history, so each change is answered without network access.

use std::io::Write;
use std::time::Instant;

use ferrodcf_core::{
    sensitivity_for, value_company, AssumptionSet, BaseFcffMethod, FinancialHistory, RateAxis,
    SensitivityGrid, Ticker, Valuation, ValuationError, MAX_HORIZON_YEARS,
};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::cli::InteractiveArgs;
use crate::error::CliError;
use crate::inputs::{pct, BetaSource, MarketAssumptions, RiskFreeSource};
use crate::output::views;

use super::{elapsed_ms, CommandResult, Context};

const PROMPT: &str = "dcf> ";

const HELP: &str = "\
commands:
  set <field> <value>   change an input and revalue (rates in percent)
  show                  full valuation tables
  grid                  WACC x terminal growth sensitivity
  reset                 restore the starting inputs
  help                  this text
  quit                  end the session
fields:
  years, growth, terminal-growth, base-years,
  risk-free, market-return, beta, cost-of-debt, tax-rate";

/// Adjustable input, as named on the `set` command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Years,
    Growth,
    TerminalGrowth,
    BaseYears,
    RiskFree,
    MarketReturn,
    Beta,
    CostOfDebt,
    TaxRate,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        let field = match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "years" | "horizon" => Self::Years,
            "growth" | "g" => Self::Growth,
            "terminal-growth" | "tg" => Self::TerminalGrowth,
            "base-years" => Self::BaseYears,
            "risk-free" | "rf" => Self::RiskFree,
            "market-return" | "mr" => Self::MarketReturn,
            "beta" => Self::Beta,
            "cost-of-debt" | "kd" => Self::CostOfDebt,
            "tax-rate" | "tax" => Self::TaxRate,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue(String),
    Quit,
}

pub struct Session {
    history: FinancialHistory,
    initial: (AssumptionSet, MarketAssumptions),
    assumptions: AssumptionSet,
    market: MarketAssumptions,
    last: Result<Valuation, ValuationError>,
}

impl Session {
    pub fn new(
        history: FinancialHistory,
        assumptions: AssumptionSet,
        market: MarketAssumptions,
    ) -> Self {
        let last = value_company(&history, &assumptions, &market.to_inputs());
        Self {
            history,
            initial: (assumptions, market.clone()),
            assumptions,
            market,
            last,
        }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.history.ticker
    }

    pub fn last(&self) -> Result<&Valuation, &ValuationError> {
        self.last.as_ref()
    }

    pub fn status_line(&self) -> String {
        match &self.last {
            Ok(valuation) => views::summary_line(valuation),
            Err(error) => format!("error: {error}"),
        }
    }

    pub fn handle(&mut self, line: &str) -> Reply {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Reply::Continue(String::new());
        };

        match command.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => Reply::Quit,
            "help" | "?" => Reply::Continue(String::from(HELP)),
            "show" => Reply::Continue(self.show()),
            "grid" => Reply::Continue(self.grid()),
            "reset" => {
                let (assumptions, market) = self.initial.clone();
                self.assumptions = assumptions;
                self.market = market;
                self.revalue();
                Reply::Continue(self.status_line())
            }
            "set" => {
                let (Some(name), Some(raw), None) = (words.next(), words.next(), words.next())
                else {
                    return Reply::Continue(String::from("usage: set <field> <value>"));
                };
                match self.set(name, raw) {
                    Ok(()) => Reply::Continue(self.status_line()),
                    Err(message) => Reply::Continue(message),
                }
            }
            other => Reply::Continue(format!("unknown command '{other}'; type 'help'")),
        }
    }

    fn set(&mut self, name: &str, raw: &str) -> Result<(), String> {
        let field = Field::parse(name).ok_or_else(|| format!("unknown field '{name}'"))?;
        let value = raw
            .trim_end_matches('%')
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("'{raw}' is not a number"))?;

        let mut assumptions = self.assumptions;
        match field {
            Field::Years | Field::BaseYears if value < 0.0 || value.fract() != 0.0 => {
                return Err(format!("'{raw}' is not a whole number"));
            }
            Field::Years => {
                assumptions.horizon_years = u32::try_from(value as u64)
                    .ok()
                    .filter(|years| (1..=MAX_HORIZON_YEARS).contains(years))
                    .ok_or_else(|| {
                        format!("'{raw}' is outside 1..={MAX_HORIZON_YEARS} years")
                    })?;
            }
            Field::BaseYears => {
                assumptions.base_method = if value <= 1.0 {
                    BaseFcffMethod::Latest
                } else {
                    BaseFcffMethod::TrailingAverage(value as usize)
                };
            }
            Field::Growth => assumptions.fcff_growth = pct(value),
            Field::TerminalGrowth => assumptions.terminal_growth = pct(value),
            Field::RiskFree => {
                self.market.risk_free_rate = pct(value);
                self.market.risk_free_source = RiskFreeSource::Flag;
            }
            Field::MarketReturn => self.market.market_return = pct(value),
            Field::Beta => {
                self.market.beta = value;
                self.market.beta_source = BetaSource::Flag;
            }
            Field::CostOfDebt => self.market.cost_of_debt = Some(pct(value)),
            Field::TaxRate => self.market.tax_rate = Some(pct(value)),
        }
        self.assumptions = assumptions;
        self.revalue();
        Ok(())
    }

    fn revalue(&mut self) {
        let started = Instant::now();
        self.last = value_company(&self.history, &self.assumptions, &self.market.to_inputs());
        tracing::debug!(
            ticker = %self.history.ticker,
            ok = self.last.is_ok(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "revalued"
        );
    }

    fn show(&self) -> String {
        match &self.last {
            Ok(valuation) => {
                let mut rendered = views::valuation_tables(valuation, &self.market)
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n");
                for warning in &valuation.warnings {
                    rendered.push_str(&format!("warning: {warning}\n"));
                }
                rendered.trim_end().to_owned()
            }
            Err(error) => format!("error: {error}"),
        }
    }

    fn grid(&self) -> String {
        match self.sensitivity() {
            Ok(grid) => views::sensitivity_table(&grid, &self.history.currency)
                .to_string()
                .trim_end()
                .to_owned(),
            Err(error) => format!("error: {error}"),
        }
    }

    fn sensitivity(&self) -> Result<SensitivityGrid, ValuationError> {
        let valuation = self.last.as_ref().map_err(Clone::clone)?;
        let wacc_axis = RateAxis::default_wacc(valuation.result.wacc.wacc)?;
        sensitivity_for(valuation, &wacc_axis, &RateAxis::default_terminal_growth())
    }
}

/// Reads commands until `quit` or end of input. Returns the number of
/// commands handled.
pub async fn drive<R, W>(
    session: &mut Session,
    reader: R,
    writer: &mut W,
) -> Result<usize, CliError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    write!(writer, "{PROMPT}")?;
    writer.flush()?;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            write!(writer, "{PROMPT}")?;
            writer.flush()?;
            continue;
        }
        handled += 1;
        match session.handle(&line) {
            Reply::Quit => break,
            Reply::Continue(output) => {
                writeln!(writer, "{output}")?;
                write!(writer, "{PROMPT}")?;
                writer.flush()?;
            }
        }
    }
    writeln!(writer)?;
    Ok(handled)
}

pub async fn run(args: &InteractiveArgs, context: &Context) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let ticker = Ticker::parse(&args.ticker)?;
    let prepared = context.prepare(&ticker, &args.assumptions).await?;

    let mut session = Session::new(prepared.history, prepared.assumptions, prepared.market);
    let mut stdout = std::io::stdout();
    writeln!(
        stdout,
        "{} loaded; type 'help' for commands\n{}",
        session.ticker(),
        session.status_line()
    )?;
    for warning in &prepared.warnings {
        writeln!(stdout, "warning: {warning}")?;
    }

    let commands = drive(&mut session, BufReader::new(tokio::io::stdin()), &mut stdout).await?;

    let data = json!({
        "ticker": session.ticker(),
        "commands": commands,
        "assumptions": session.assumptions,
        "market_inputs": session.market,
        "fair_value_per_share": session
            .last()
            .ok()
            .map(|valuation| valuation.result.fair_value_per_share),
    });

    Ok(CommandResult::ok(data, prepared.source_chain)
        .with_warnings(prepared.warnings)
        .with_cache_hit(prepared.cache_hit)
        .with_latency(elapsed_ms(started)))
}
