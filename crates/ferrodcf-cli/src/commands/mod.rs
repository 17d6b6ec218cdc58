mod fcff;
mod interactive;
mod sensitivity;
mod value;

use std::sync::Arc;
use std::time::Instant;

use ferrodcf_core::{
    AssumptionSet, CacheMode, CachedFetch, CachedSource, Envelope, EnvelopeError, FinancialHistory,
    FinancialsRequest, FredAdapter, HttpClient, NoopHttpClient, ProviderId, ReqwestHttpClient,
    Settings, SourceError, Ticker, ValuationError, YahooAdapter,
};
use serde_json::Value;

use crate::cli::{AssumptionArgs, Cli, Command};
use crate::error::CliError;
use crate::inputs::{resolve_assumptions, resolve_market, MarketAssumptions};
use crate::metadata::Metadata;
use crate::output::Table;

pub struct CommandResult {
    pub data: Value,
    pub tables: Vec<Table>,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub source_chain: Vec<ProviderId>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<ProviderId>) -> Self {
        Self {
            data,
            tables: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            cache_hit: false,
            source_chain,
        }
    }

    /// Response for a valuation that could not be computed. The error goes
    /// into the envelope and `data` is null.
    pub fn failure(
        error: &ValuationError,
        source_chain: Vec<ProviderId>,
    ) -> Result<Self, CliError> {
        Ok(Self::ok(Value::Null, source_chain).with_errors(vec![envelope_error(error)?]))
    }

    pub fn with_tables(mut self, tables: Vec<Table>) -> Self {
        self.tables.extend(tables);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_cache_hit(mut self, cache_hit: bool) -> Self {
        self.cache_hit = cache_hit;
        self
    }
}

pub struct CommandOutput {
    pub envelope: Envelope<Value>,
    pub tables: Vec<Table>,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub fn envelope_error(error: &ValuationError) -> Result<EnvelopeError, CliError> {
    let envelope_error = EnvelopeError::new(error.code(), error.to_string())?;
    Ok(match error {
        ValuationError::InvalidInput { field, .. } => {
            envelope_error.with_retryable(false).with_field(*field)
        }
        ValuationError::DataInsufficient { .. } => envelope_error.with_retryable(false),
        ValuationError::TickerNotFound(source) | ValuationError::DataProvider(source) => {
            envelope_error.with_retryable(source.retryable())
        }
    })
}

/// Collaborators shared by all commands of one invocation.
pub struct Context {
    pub settings: Settings,
    financials: CachedSource<YahooAdapter>,
    rates: FredAdapter,
}

/// Inputs of one valuation once flags, settings and provider data are merged.
pub struct Prepared {
    pub history: FinancialHistory,
    pub assumptions: AssumptionSet,
    pub market: MarketAssumptions,
    pub warnings: Vec<String>,
    pub source_chain: Vec<ProviderId>,
    pub cache_hit: bool,
}

impl Context {
    pub fn new(settings: Settings, offline: bool) -> Self {
        let http_client: Arc<dyn HttpClient> = if offline {
            Arc::new(NoopHttpClient)
        } else {
            Arc::new(ReqwestHttpClient::new())
        };
        Self::with_http_client(settings, http_client)
    }

    pub fn with_http_client(settings: Settings, http_client: Arc<dyn HttpClient>) -> Self {
        let yahoo = YahooAdapter::from_settings(Arc::clone(&http_client), &settings.provider);
        let rates = FredAdapter::from_settings(http_client, &settings.provider);
        let financials = CachedSource::new(yahoo, settings.cache.build());
        Self {
            settings,
            financials,
            rates,
        }
    }

    pub async fn fetch(&self, ticker: &Ticker, refresh: bool) -> Result<CachedFetch, SourceError> {
        let mode = if refresh {
            CacheMode::Refresh
        } else {
            CacheMode::Use
        };
        self.financials
            .fetch_with_mode(FinancialsRequest::new(ticker.clone()), mode)
            .await
    }

    pub async fn prepare(
        &self,
        ticker: &Ticker,
        args: &AssumptionArgs,
    ) -> Result<Prepared, ValuationError> {
        let assumptions = resolve_assumptions(&self.settings.assumptions, args)?;
        let fetched = self.fetch(ticker, args.refresh).await?;
        let resolution =
            resolve_market(&self.settings.market, args, &fetched.history, &self.rates).await;

        let mut source_chain = vec![ProviderId::Yahoo];
        source_chain.extend(resolution.consulted);

        Ok(Prepared {
            history: fetched.history,
            assumptions,
            market: resolution.market,
            warnings: resolution.warnings,
            source_chain,
            cache_hit: fetched.cache_hit,
        })
    }
}

pub async fn run(cli: &Cli, settings: Settings) -> Result<CommandOutput, CliError> {
    let context = Context::new(settings, cli.offline);
    run_with_context(&cli.command, &context).await
}

pub async fn run_with_context(
    command: &Command,
    context: &Context,
) -> Result<CommandOutput, CliError> {
    let started = Instant::now();
    let command_result = match command {
        Command::Value(args) => value::run(args, context).await?,
        Command::Fcff(args) => fcff::run(args, context).await?,
        Command::Sensitivity(args) => sensitivity::run(args, context).await?,
        Command::Interactive(args) => interactive::run(args, context).await?,
    };
    let total_ms = elapsed_ms(started);

    let CommandResult {
        data,
        tables,
        warnings,
        errors,
        latency_ms,
        cache_hit,
        source_chain,
    } = command_result;

    let meta = Metadata::new(source_chain, latency_ms.max(total_ms), cache_hit)?
        .with_warnings(warnings)
        .into_envelope_meta()?;

    let envelope = Envelope::with_errors(meta, data, errors)?;
    Ok(CommandOutput { envelope, tables })
}
