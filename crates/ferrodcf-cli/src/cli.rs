//! CLI argument definitions for ferrodcf.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `value` | Full DCF valuation of one ticker |
//! | `fcff` | Historical free cash flow to the firm |
//! | `sensitivity` | Fair value over a WACC × terminal growth grid |
//! | `interactive` | Line-driven session that revalues on every change |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as failures |
//! | `--offline` | `false` | Use deterministic built-in data |
//! | `--config` | | TOML settings file |
//!
//! Rates on the command line are percentages (`--growth-pct 14` is 14 %).
//!
//! # Examples
//!
//! ```bash
//! ferrodcf value AAPL --format table
//! ferrodcf value MSFT --growth-pct 10 --terminal-growth-pct 3 --pretty
//! ferrodcf sensitivity KO --wacc-span-pct 2
//! ferrodcf interactive AAPL --offline
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferrodcf_core::{LogFormat, Settings};

/// ferrodcf - discounted cash flow valuation from public statements
#[derive(Debug, Parser)]
#[command(
    name = "ferrodcf",
    author,
    version,
    about = "Discounted cash flow valuation calculator",
    long_about = "ferrodcf fetches a company's annual statements, derives free cash flow to \
the firm, estimates WACC with CAPM and values the company with a growing-perpetuity \
terminal value.\n\
\n\
Use 'ferrodcf <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 6).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Serve deterministic built-in statements instead of calling Yahoo and FRED.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    /// Settings file (TOML). Falls back to $FERRODCF_CONFIG.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log line format.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Upstream request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flags sit above file and environment settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(level) = &self.log_level {
            settings.logging.level = level.trim().to_ascii_lowercase();
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format.into();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.provider.timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables.
    Table,
    /// Single JSON envelope.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Value a company: WACC, enterprise value, equity value and fair value per share.
    ///
    /// # Examples
    ///
    ///   ferrodcf value AAPL
    ///   ferrodcf value AAPL --years 5 --growth-pct 8 --format table
    Value(ValueArgs),

    /// Show historical FCFF and its components per fiscal year.
    ///
    /// # Examples
    ///
    ///   ferrodcf fcff MSFT --format table
    Fcff(FcffArgs),

    /// Fair value per share over a WACC × terminal growth grid.
    ///
    /// # Examples
    ///
    ///   ferrodcf sensitivity AAPL
    ///   ferrodcf sensitivity AAPL --growth-from-pct 2 --growth-to-pct 4
    Sensitivity(SensitivityArgs),

    /// Interactive session: change assumptions and see the valuation update.
    ///
    /// Commands inside the session: set <field> <value>, show, grid, reset, help, quit.
    Interactive(InteractiveArgs),
}

/// Assumption overrides shared by the valuation commands. Rates in percent.
#[derive(Debug, Clone, Default, Args)]
pub struct AssumptionArgs {
    /// Forecast horizon in years.
    #[arg(long)]
    pub years: Option<u32>,

    /// Annual FCFF growth over the horizon, in percent.
    #[arg(long, allow_hyphen_values = true)]
    pub growth_pct: Option<f64>,

    /// Perpetual growth after the horizon, in percent.
    #[arg(long, allow_hyphen_values = true)]
    pub terminal_growth_pct: Option<f64>,

    /// Expected market return, in percent.
    #[arg(long, allow_hyphen_values = true)]
    pub market_return_pct: Option<f64>,

    /// Risk-free rate, in percent. Skips the Treasury yield lookup.
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_pct: Option<f64>,

    /// Equity beta. Defaults to the provider-reported beta.
    #[arg(long, allow_hyphen_values = true)]
    pub beta: Option<f64>,

    /// Pre-tax cost of debt, in percent.
    #[arg(long)]
    pub cost_of_debt_pct: Option<f64>,

    /// Tax rate for the debt shield, in percent. Defaults to the reported effective rate.
    #[arg(long)]
    pub tax_rate_pct: Option<f64>,

    /// Fiscal years averaged for the starting FCFF (1 = latest only).
    #[arg(long)]
    pub base_years: Option<usize>,

    /// Ignore cached statements and fetch again.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct ValueArgs {
    /// Ticker symbol, e.g. AAPL.
    pub ticker: String,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,
}

#[derive(Debug, Args)]
pub struct FcffArgs {
    /// Ticker symbol, e.g. AAPL.
    pub ticker: String,

    /// Ignore cached statements and fetch again.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct SensitivityArgs {
    /// Ticker symbol, e.g. AAPL.
    pub ticker: String,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    /// WACC range either side of the computed WACC, in percent.
    #[arg(long, default_value_t = 1.0)]
    pub wacc_span_pct: f64,

    /// WACC step, in percent.
    #[arg(long, default_value_t = 0.5)]
    pub wacc_step_pct: f64,

    /// First terminal growth column, in percent.
    #[arg(long, default_value_t = 3.5, allow_hyphen_values = true)]
    pub growth_from_pct: f64,

    /// Last terminal growth column, in percent.
    #[arg(long, default_value_t = 5.5, allow_hyphen_values = true)]
    pub growth_to_pct: f64,

    /// Terminal growth step, in percent.
    #[arg(long, default_value_t = 0.5)]
    pub growth_step_pct: f64,
}

#[derive(Debug, Args)]
pub struct InteractiveArgs {
    /// Ticker symbol, e.g. AAPL.
    pub ticker: String,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,
}
