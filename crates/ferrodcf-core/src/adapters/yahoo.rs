use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use time::macros::format_description;
use time::{Date, Month};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::ProviderSettings;
use crate::data_source::{
    FinancialsRequest, FinancialsSource, HealthState, HealthStatus, SourceError,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, NoopHttpClient};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::throttling::RequestThrottle;
use crate::{FinancialHistory, FinancialSnapshot, ProviderId, Ticker};

const REFERER: &str = "https://finance.yahoo.com/";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const TIMESERIES_URL: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";
const SUMMARY_MODULES: &str = "price,defaultKeyStatistics,financialData,summaryDetail";

/// Statutory US rate, used when a period reports no effective rate.
const FALLBACK_TAX_RATE: f64 = 0.21;
const HISTORY_YEARS: i64 = 6;

/// Yahoo cookie/crumb session.
///
/// The crumb is fetched once per hour, after a visit to `fc.yahoo.com` has put
/// a session cookie in the client's jar. A cookie supplied through settings
/// (`YAHOO_COOKIE`) is sent explicitly instead.
#[derive(Debug)]
pub struct YahooAuthManager {
    cookie_override: Option<String>,
    ttl: Duration,
    state: tokio::sync::Mutex<AuthState>,
}

#[derive(Debug, Default)]
struct AuthState {
    crumb: Option<String>,
    refreshed_at: Option<Instant>,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl YahooAuthManager {
    pub fn new(cookie_override: Option<String>) -> Self {
        Self {
            cookie_override,
            ttl: Duration::from_secs(3_600),
            state: tokio::sync::Mutex::new(AuthState::default()),
        }
    }

    pub fn auth(&self) -> HttpAuth {
        self.cookie_override
            .clone()
            .map_or(HttpAuth::None, HttpAuth::Cookie)
    }

    /// Cached crumb, refreshed when missing or older than the TTL. Holding the
    /// lock across the refresh keeps concurrent callers from racing it.
    pub async fn crumb(
        &self,
        http_client: &dyn HttpClient,
        timeout_ms: u64,
    ) -> Result<String, SourceError> {
        let mut state = self.state.lock().await;
        let fresh = state
            .refreshed_at
            .is_some_and(|refreshed_at| refreshed_at.elapsed() < self.ttl);
        if let (true, Some(crumb)) = (fresh, &state.crumb) {
            return Ok(crumb.clone());
        }

        let crumb = self.fetch_crumb(http_client, timeout_ms).await?;
        state.crumb = Some(crumb.clone());
        state.refreshed_at = Some(Instant::now());
        tracing::debug!("refreshed yahoo crumb");
        Ok(crumb)
    }

    pub async fn invalidate(&self) {
        *self.state.lock().await = AuthState::default();
    }

    async fn fetch_crumb(
        &self,
        http_client: &dyn HttpClient,
        timeout_ms: u64,
    ) -> Result<String, SourceError> {
        if self.cookie_override.is_none() {
            let cookie_request = HttpRequest::get(COOKIE_URL)
                .with_header("referer", REFERER)
                .with_timeout_ms(timeout_ms);
            http_client.execute(cookie_request).await.map_err(|error| {
                SourceError::unavailable(format!(
                    "failed to fetch yahoo session cookie: {}",
                    error.message()
                ))
            })?;
        }

        for url in CRUMB_URLS {
            let request = HttpRequest::get(url)
                .with_header("referer", REFERER)
                .with_auth(&self.auth())
                .with_timeout_ms(timeout_ms);
            let Ok(response) = http_client.execute(request).await else {
                continue;
            };
            if response.status == 429 {
                return Err(SourceError::rate_limited(
                    "yahoo rate limited the crumb request",
                ));
            }
            if let Some(crumb) = parse_crumb(&response) {
                return Ok(crumb);
            }
        }

        Err(SourceError::unavailable(
            "failed to obtain a yahoo crumb from any endpoint",
        ))
    }
}

fn parse_crumb(response: &HttpResponse) -> Option<String> {
    let body = response.body.trim();
    let looks_valid = response.is_success()
        && !body.is_empty()
        && body.len() < 100
        && !body.contains(char::is_whitespace)
        && !body.contains('<');
    looks_valid.then(|| body.to_owned())
}

/// Yahoo Finance statements and quote data.
///
/// Uses the real API when built with a non-mock [`HttpClient`]; otherwise
/// serves deterministic statements for a small catalogue of tickers.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    auth_manager: Arc<YahooAuthManager>,
    circuit_breaker: Arc<CircuitBreaker>,
    throttle: RequestThrottle,
    retry: RetryConfig,
    timeout_ms: u64,
    use_real_api: bool,
}

impl std::fmt::Debug for YahooAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooAdapter")
            .field("use_real_api", &self.use_real_api)
            .field("timeout_ms", &self.timeout_ms)
            .field("circuit_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            auth_manager: Arc::new(YahooAuthManager::default()),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                "yahoo",
                CircuitBreakerConfig::default(),
            )),
            throttle: RequestThrottle::default(),
            retry: RetryConfig::default(),
            timeout_ms: 10_000,
            use_real_api,
        }
    }

    pub fn from_settings(http_client: Arc<dyn HttpClient>, settings: &ProviderSettings) -> Self {
        Self {
            auth_manager: Arc::new(YahooAuthManager::new(settings.yahoo_cookie.clone())),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                "yahoo",
                settings.circuit_breaker_config(),
            )),
            throttle: settings.throttle(),
            retry: settings.retry_config(),
            timeout_ms: settings.timeout_ms,
            ..Self::with_http_client(http_client)
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_real(&self) -> bool {
        self.use_real_api
    }

    /// Tickers served in offline mode.
    pub fn fake_catalog() -> Vec<&'static str> {
        FAKE_PROFILES.iter().map(|profile| profile.symbol).collect()
    }

    async fn fetch_real(&self, req: &FinancialsRequest) -> Result<FinancialHistory, SourceError> {
        let ticker = &req.ticker;
        let symbol = urlencoding::encode(ticker.as_str()).into_owned();

        let summary_body = self
            .get_authenticated(ticker, |crumb| {
                format!(
                    "{QUOTE_SUMMARY_URL}/{symbol}?modules={SUMMARY_MODULES}&crumb={}",
                    urlencoding::encode(crumb)
                )
            })
            .await?;
        let summary = parse_quote_summary(ticker, &summary_body)?;

        let period2 = req.as_of.midnight().assume_utc().unix_timestamp() + 86_400;
        let period1 = period2 - HISTORY_YEARS * 366 * 86_400;
        let types = LineItem::ALL
            .iter()
            .map(|item| item.series_name())
            .collect::<Vec<_>>()
            .join(",");
        let timeseries_body = self
            .get_authenticated(ticker, |crumb| {
                format!(
                    "{TIMESERIES_URL}/{symbol}?symbol={symbol}&type={types}&period1={period1}&period2={period2}&crumb={}",
                    urlencoding::encode(crumb)
                )
            })
            .await?;
        let statements = parse_timeseries(&timeseries_body)?;

        build_history(ticker.clone(), &summary, statements)
    }

    /// GET with crumb; refreshes the session once on 401/403.
    async fn get_authenticated<F>(&self, ticker: &Ticker, build_url: F) -> Result<String, SourceError>
    where
        F: Fn(&str) -> String,
    {
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "yahoo circuit breaker is open; skipping upstream call",
            ));
        }

        let crumb = self
            .auth_manager
            .crumb(self.http_client.as_ref(), self.timeout_ms)
            .await?;
        let mut response = self.send(&build_url(&crumb)).await?;

        if matches!(response.status, 401 | 403) {
            tracing::debug!(status = response.status, "yahoo session rejected; refreshing");
            self.auth_manager.invalidate().await;
            let crumb = self
                .auth_manager
                .crumb(self.http_client.as_ref(), self.timeout_ms)
                .await?;
            response = self.send(&build_url(&crumb)).await?;
        }

        match response.status {
            200..=299 => {
                self.circuit_breaker.record_success();
                Ok(response.body)
            }
            404 => {
                self.circuit_breaker.record_success();
                Err(SourceError::ticker_not_found(ticker))
            }
            429 => {
                self.circuit_breaker.record_failure();
                Err(SourceError::rate_limited("yahoo returned status 429"))
            }
            status => {
                self.circuit_breaker.record_failure();
                Err(SourceError::unavailable(format!(
                    "yahoo returned status {status}"
                )))
            }
        }
    }

    async fn send(&self, url: &str) -> Result<HttpResponse, SourceError> {
        self.throttle.acquire().await;
        let request = HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_auth(&self.auth_manager.auth())
            .with_timeout_ms(self.timeout_ms);
        execute_with_retry(self.http_client.as_ref(), &request, &self.retry)
            .await
            .map_err(|error| {
                self.circuit_breaker.record_failure();
                SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
            })
    }

    async fn fetch_fake(&self, req: &FinancialsRequest) -> Result<FinancialHistory, SourceError> {
        self.probe_upstream().await?;

        let profile = FAKE_PROFILES
            .iter()
            .find(|profile| profile.symbol == req.ticker.as_str())
            .ok_or_else(|| SourceError::ticker_not_found(&req.ticker))?;
        profile.history(&req.ticker)
    }

    /// Sends one request through the mock transport so that breaker behaviour
    /// matches real mode.
    async fn probe_upstream(&self) -> Result<(), SourceError> {
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "yahoo circuit breaker is open; skipping upstream call",
            ));
        }

        let request = HttpRequest::get(QUOTE_SUMMARY_URL)
            .with_auth(&self.auth_manager.auth())
            .with_timeout_ms(self.timeout_ms);
        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
        })?;

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(SourceError::unavailable(format!(
                "yahoo returned status {}",
                response.status
            )));
        }
        self.circuit_breaker.record_success();
        Ok(())
    }
}

impl FinancialsSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn financials<'a>(
        &'a self,
        req: FinancialsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FinancialHistory, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(ticker = %req.ticker, real = self.use_real_api, "fetching financials");
            let started = Instant::now();
            let result = if self.use_real_api {
                self.fetch_real(&req).await
            } else {
                self.fetch_fake(&req).await
            };
            match &result {
                Ok(history) => tracing::info!(
                    ticker = %req.ticker,
                    periods = history.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "fetched financials"
                ),
                Err(error) => tracing::warn!(ticker = %req.ticker, %error, "financials fetch failed"),
            }
            result
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            match self.circuit_breaker.state() {
                CircuitState::Closed => HealthStatus::healthy(),
                CircuitState::HalfOpen => HealthStatus::new(HealthState::Degraded, true),
                CircuitState::Open => HealthStatus::new(HealthState::Unhealthy, false),
            }
        })
    }
}

// ============================================================================
// quoteSummary payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryResult {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(rename = "defaultKeyStatistics", default)]
    key_statistics: Option<KeyStatisticsModule>,
    #[serde(rename = "financialData", default)]
    financial_data: Option<FinancialDataModule>,
    #[serde(rename = "summaryDetail", default)]
    summary_detail: Option<SummaryDetailModule>,
}

#[derive(Debug, Default, Deserialize)]
struct PriceModule {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<RawValue>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KeyStatisticsModule {
    #[serde(rename = "sharesOutstanding", default)]
    shares_outstanding: Option<RawValue>,
    #[serde(default)]
    beta: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct FinancialDataModule {
    #[serde(rename = "currentPrice", default)]
    current_price: Option<RawValue>,
    #[serde(rename = "totalDebt", default)]
    total_debt: Option<RawValue>,
    #[serde(rename = "totalCash", default)]
    total_cash: Option<RawValue>,
    #[serde(rename = "financialCurrency", default)]
    financial_currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryDetailModule {
    #[serde(default)]
    beta: Option<RawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`; missing values are `{}`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(value: Option<&RawValue>) -> Option<f64> {
    value.and_then(|value| value.raw).filter(|value| value.is_finite())
}

/// Current market data applied to the latest fiscal period.
#[derive(Debug, Clone, Default, PartialEq)]
struct MarketSummary {
    price: Option<f64>,
    currency: Option<String>,
    shares_outstanding: Option<f64>,
    beta: Option<f64>,
    total_debt: Option<f64>,
    total_cash: Option<f64>,
}

fn parse_quote_summary(ticker: &Ticker, body: &str) -> Result<MarketSummary, SourceError> {
    let response: QuoteSummaryResponse = serde_json::from_str(body).map_err(|error| {
        SourceError::internal(format!("failed to parse yahoo quoteSummary: {error}"))
    })?;

    if let Some(error) = response.quote_summary.error {
        let code = error.code.unwrap_or_default();
        let description = error.description.unwrap_or_default();
        if code.eq_ignore_ascii_case("not found") || description.contains("not found") {
            return Err(SourceError::ticker_not_found(ticker));
        }
        return Err(SourceError::unavailable(format!(
            "yahoo quoteSummary error: {code} {description}"
        )));
    }

    let result = response
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| SourceError::ticker_not_found(ticker))?;

    let price = result.price.unwrap_or_default();
    let stats = result.key_statistics.unwrap_or_default();
    let financial = result.financial_data.unwrap_or_default();
    let detail = result.summary_detail.unwrap_or_default();

    Ok(MarketSummary {
        price: raw(price.regular_market_price.as_ref())
            .or_else(|| raw(financial.current_price.as_ref())),
        currency: financial.financial_currency.or(price.currency),
        shares_outstanding: raw(stats.shares_outstanding.as_ref()),
        beta: raw(detail.beta.as_ref()).or_else(|| raw(stats.beta.as_ref())),
        total_debt: raw(financial.total_debt.as_ref()),
        total_cash: raw(financial.total_cash.as_ref()),
    })
}

// ============================================================================
// fundamentals-timeseries payload
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LineItem {
    Revenue,
    Ebit,
    TaxRate,
    DepreciationAmortization,
    CapitalExpenditure,
    ChangeInWorkingCapital,
    InterestExpense,
    TotalDebt,
    Cash,
    SharesOutstanding,
}

impl LineItem {
    const ALL: [Self; 10] = [
        Self::Revenue,
        Self::Ebit,
        Self::TaxRate,
        Self::DepreciationAmortization,
        Self::CapitalExpenditure,
        Self::ChangeInWorkingCapital,
        Self::InterestExpense,
        Self::TotalDebt,
        Self::Cash,
        Self::SharesOutstanding,
    ];

    const FCFF_COMPONENTS: [Self; 4] = [
        Self::Ebit,
        Self::DepreciationAmortization,
        Self::CapitalExpenditure,
        Self::ChangeInWorkingCapital,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Ebit => "EBIT",
            Self::TaxRate => "tax rate",
            Self::DepreciationAmortization => "depreciation and amortization",
            Self::CapitalExpenditure => "capital expenditure",
            Self::ChangeInWorkingCapital => "change in working capital",
            Self::InterestExpense => "interest expense",
            Self::TotalDebt => "total debt",
            Self::Cash => "cash",
            Self::SharesOutstanding => "shares outstanding",
        }
    }

    const fn series_name(self) -> &'static str {
        match self {
            Self::Revenue => "annualTotalRevenue",
            Self::Ebit => "annualEBIT",
            Self::TaxRate => "annualTaxRateForCalcs",
            Self::DepreciationAmortization => "annualDepreciationAndAmortization",
            Self::CapitalExpenditure => "annualCapitalExpenditure",
            Self::ChangeInWorkingCapital => "annualChangeInWorkingCapital",
            Self::InterestExpense => "annualInterestExpense",
            Self::TotalDebt => "annualTotalDebt",
            Self::Cash => "annualCashAndCashEquivalents",
            Self::SharesOutstanding => "annualOrdinarySharesNumber",
        }
    }

    fn from_series_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.series_name() == name)
    }
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: TimeseriesBody,
}

#[derive(Debug, Deserialize)]
struct TimeseriesBody {
    #[serde(default)]
    result: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

type Statements = BTreeMap<Date, HashMap<LineItem, f64>>;

/// Each result object carries one series under a key named after its type,
/// so the payload is walked dynamically.
fn parse_timeseries(body: &str) -> Result<Statements, SourceError> {
    let response: TimeseriesResponse = serde_json::from_str(body).map_err(|error| {
        SourceError::internal(format!("failed to parse yahoo timeseries: {error}"))
    })?;
    if let Some(error) = response.timeseries.error.filter(|error| !error.is_null()) {
        return Err(SourceError::unavailable(format!(
            "yahoo timeseries error: {error}"
        )));
    }

    let date_format = format_description!("[year]-[month]-[day]");
    let mut statements = Statements::new();
    for result in &response.timeseries.result {
        let Some(series_name) = result["meta"]["type"][0].as_str() else {
            continue;
        };
        let Some(item) = LineItem::from_series_name(series_name) else {
            continue;
        };
        let Some(points) = result[series_name].as_array() else {
            continue;
        };

        for point in points {
            let as_of = point["asOfDate"]
                .as_str()
                .and_then(|raw| Date::parse(raw, &date_format).ok());
            let value = point["reportedValue"]["raw"].as_f64();
            if let (Some(as_of), Some(value)) = (as_of, value.filter(|value| value.is_finite())) {
                statements.entry(as_of).or_default().insert(item, value);
            }
        }
    }
    Ok(statements)
}

/// Periods missing any FCFF component are skipped rather than zero-filled.
/// Every value that is substituted or clamped leaves a note on the history.
/// An empty result is returned as an empty history; the valuation reports it
/// as insufficient data.
fn build_history(
    ticker: Ticker,
    summary: &MarketSummary,
    statements: Statements,
) -> Result<FinancialHistory, SourceError> {
    let mut notes = Vec::new();
    let complete = statements
        .into_iter()
        .filter(|(fiscal_period_end, items)| {
            let missing = LineItem::FCFF_COMPONENTS
                .into_iter()
                .filter(|item| !items.contains_key(item))
                .map(LineItem::label)
                .collect::<Vec<_>>();
            if missing.is_empty() {
                return true;
            }
            // a period with no EBIT at all is usually a fiscal year not yet reported
            if missing.len() < LineItem::FCFF_COMPONENTS.len() {
                notes.push(format!(
                    "fiscal {} skipped: {} not reported",
                    fiscal_period_end.year(),
                    missing.join(", ")
                ));
            }
            false
        })
        .collect::<Vec<_>>();
    let latest_date = complete.last().map(|(date, _)| *date);

    let mut snapshots = Vec::with_capacity(complete.len());
    for (fiscal_period_end, items) in complete {
        let year = fiscal_period_end.year();
        let is_latest = Some(fiscal_period_end) == latest_date;
        let get = |item: LineItem| items.get(&item).copied();
        let component = |item: LineItem| get(item).unwrap_or_default();
        let current = |live: Option<f64>, item: LineItem| {
            if is_latest {
                live.or_else(|| get(item))
            } else {
                get(item)
            }
        };

        let tax_rate = match get(LineItem::TaxRate) {
            Some(rate) if (0.0..=0.99).contains(&rate) => rate,
            Some(rate) => {
                let clamped = rate.clamp(0.0, 0.99);
                notes.push(format!(
                    "fiscal {year}: reported tax rate {:.2}% clamped to {:.2}%",
                    rate * 100.0,
                    clamped * 100.0
                ));
                clamped
            }
            None => {
                notes.push(format!(
                    "fiscal {year}: tax rate not reported; {:.0}% assumed",
                    FALLBACK_TAX_RATE * 100.0
                ));
                FALLBACK_TAX_RATE
            }
        };

        let revenue = get(LineItem::Revenue).unwrap_or_else(|| {
            notes.push(format!("fiscal {year}: revenue not reported; shown as 0"));
            0.0
        });

        // balance-sheet items only feed the equity bridge, which reads the latest period
        let mut balance = |live: Option<f64>, item: LineItem| match current(live, item) {
            Some(value) if value >= 0.0 => value,
            Some(value) => {
                if is_latest {
                    notes.push(format!(
                        "fiscal {year}: negative {} {value} treated as 0",
                        item.label()
                    ));
                }
                0.0
            }
            None => {
                if is_latest {
                    notes.push(format!("fiscal {year}: {} not reported; 0 assumed", item.label()));
                }
                0.0
            }
        };
        let total_debt = balance(summary.total_debt, LineItem::TotalDebt);
        let cash_and_equivalents = balance(summary.total_cash, LineItem::Cash);
        let shares_outstanding = balance(summary.shares_outstanding, LineItem::SharesOutstanding);

        snapshots.push(FinancialSnapshot {
            fiscal_period_end,
            revenue,
            ebit: component(LineItem::Ebit),
            tax_rate,
            depreciation_amortization: component(LineItem::DepreciationAmortization),
            capital_expenditure: component(LineItem::CapitalExpenditure).abs(),
            // cash-flow statement sign: negative means working capital absorbed cash
            change_in_nwc: -component(LineItem::ChangeInWorkingCapital),
            interest_expense: get(LineItem::InterestExpense).map(f64::abs),
            total_debt,
            cash_and_equivalents,
            shares_outstanding,
            market_price: if is_latest { summary.price } else { None },
        });
    }

    let currency = summary.currency.as_deref().unwrap_or_else(|| {
        notes.push(String::from("reporting currency not reported; USD assumed"));
        "USD"
    });
    let history = FinancialHistory::new(ticker, currency, snapshots, summary.beta)
        .map_err(|error| SourceError::internal(format!("invalid yahoo statement data: {error}")))?;
    Ok(history.with_data_notes(notes))
}

// ============================================================================
// Offline catalogue
// ============================================================================

/// Latest-year figures; earlier years are derived by deflating revenue.
struct FakeProfile {
    symbol: &'static str,
    currency: &'static str,
    fiscal_month: Month,
    fiscal_day: u8,
    revenue: f64,
    revenue_growth: f64,
    ebit_margin: f64,
    tax_rate: f64,
    da_ratio: f64,
    capex_ratio: f64,
    nwc_ratio: f64,
    interest_expense: Option<f64>,
    total_debt: f64,
    cash: f64,
    shares: f64,
    price: f64,
    beta: f64,
}

const FAKE_LATEST_YEAR: i32 = 2024;
const FAKE_YEARS: i32 = 4;

const FAKE_PROFILES: [FakeProfile; 5] = [
    FakeProfile {
        symbol: "AAPL",
        currency: "USD",
        fiscal_month: Month::September,
        fiscal_day: 28,
        revenue: 391.0e9,
        revenue_growth: 0.04,
        ebit_margin: 0.31,
        tax_rate: 0.16,
        da_ratio: 0.029,
        capex_ratio: 0.024,
        nwc_ratio: 0.01,
        interest_expense: Some(3.9e9),
        total_debt: 97.0e9,
        cash: 65.0e9,
        shares: 15.2e9,
        price: 225.0,
        beta: 1.2,
    },
    FakeProfile {
        symbol: "MSFT",
        currency: "USD",
        fiscal_month: Month::June,
        fiscal_day: 30,
        revenue: 245.0e9,
        revenue_growth: 0.12,
        ebit_margin: 0.45,
        tax_rate: 0.18,
        da_ratio: 0.09,
        capex_ratio: 0.18,
        nwc_ratio: 0.02,
        interest_expense: Some(2.9e9),
        total_debt: 67.0e9,
        cash: 75.0e9,
        shares: 7.43e9,
        price: 420.0,
        beta: 0.9,
    },
    FakeProfile {
        symbol: "KO",
        currency: "USD",
        fiscal_month: Month::December,
        fiscal_day: 31,
        revenue: 47.1e9,
        revenue_growth: 0.03,
        ebit_margin: 0.29,
        tax_rate: 0.19,
        da_ratio: 0.023,
        capex_ratio: 0.045,
        nwc_ratio: 0.01,
        interest_expense: Some(1.6e9),
        total_debt: 45.0e9,
        cash: 10.8e9,
        shares: 4.31e9,
        price: 62.0,
        beta: 0.6,
    },
    FakeProfile {
        symbol: "NVDA",
        currency: "USD",
        fiscal_month: Month::January,
        fiscal_day: 26,
        revenue: 130.5e9,
        revenue_growth: 0.6,
        ebit_margin: 0.62,
        tax_rate: 0.13,
        da_ratio: 0.013,
        capex_ratio: 0.025,
        nwc_ratio: 0.05,
        interest_expense: None,
        total_debt: 10.3e9,
        cash: 43.2e9,
        shares: 24.4e9,
        price: 135.0,
        beta: 1.7,
    },
    FakeProfile {
        symbol: "SAP.DE",
        currency: "EUR",
        fiscal_month: Month::December,
        fiscal_day: 31,
        revenue: 34.2e9,
        revenue_growth: 0.09,
        ebit_margin: 0.21,
        tax_rate: 0.3,
        da_ratio: 0.05,
        capex_ratio: 0.025,
        nwc_ratio: 0.01,
        interest_expense: Some(0.3e9),
        total_debt: 9.0e9,
        cash: 9.6e9,
        shares: 1.17e9,
        price: 230.0,
        beta: 1.1,
    },
];

impl FakeProfile {
    fn history(&self, ticker: &Ticker) -> Result<FinancialHistory, SourceError> {
        let seed = ticker_seed(ticker);
        let snapshots = (0..FAKE_YEARS)
            .map(|years_back| {
                let year = FAKE_LATEST_YEAR - years_back;
                let fiscal_period_end =
                    Date::from_calendar_date(year, self.fiscal_month, self.fiscal_day)
                        .map_err(|error| SourceError::internal(error.to_string()))?;
                let revenue = self.revenue / (1.0 + self.revenue_growth).powi(years_back);
                // small per-ticker wobble so years are not exact multiples
                let wobble = 1.0 + ((seed >> (years_back * 3)) % 7) as f64 / 100.0;
                let is_latest = years_back == 0;

                Ok(FinancialSnapshot {
                    fiscal_period_end,
                    revenue,
                    ebit: revenue * self.ebit_margin,
                    tax_rate: self.tax_rate,
                    depreciation_amortization: revenue * self.da_ratio,
                    capital_expenditure: revenue * self.capex_ratio * wobble,
                    change_in_nwc: revenue * self.nwc_ratio * wobble,
                    interest_expense: self.interest_expense,
                    total_debt: self.total_debt,
                    cash_and_equivalents: self.cash,
                    shares_outstanding: self.shares,
                    market_price: is_latest.then_some(self.price),
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        FinancialHistory::new(ticker.clone(), self.currency, snapshots, Some(self.beta))
            .map_err(|error| SourceError::internal(error.to_string()))
    }
}

fn ticker_seed(ticker: &Ticker) -> u64 {
    ticker.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::HttpError;
    use std::sync::Mutex;

    /// Replies by URL prefix and records every request.
    struct RoutedHttpClient {
        routes: Vec<(&'static str, HttpResponse)>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RoutedHttpClient {
        fn new(routes: Vec<(&'static str, HttpResponse)>) -> Self {
            Self {
                routes,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    impl HttpClient for RoutedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, crate::http_client::HttpError>> + Send + 'a>>
        {
            let response = self
                .routes
                .iter()
                .find(|(prefix, _)| request.url.starts_with(prefix))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| HttpResponse::new(404, ""));
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            Box::pin(async move { Ok(response) })
        }
    }

    struct FailingMockClient;

    impl HttpClient for FailingMockClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async { Err(HttpError::new("upstream timeout")) })
        }

        fn is_mock(&self) -> bool {
            true
        }
    }

    const SUMMARY_JSON: &str = r#"{"quoteSummary":{"result":[{
        "price":{"regularMarketPrice":{"raw":150.0,"fmt":"150.00"},"currency":"USD"},
        "defaultKeyStatistics":{"sharesOutstanding":{"raw":1000.0},"beta":{"raw":1.1}},
        "financialData":{"totalDebt":{"raw":5000.0},"totalCash":{"raw":2000.0},"financialCurrency":"USD"},
        "summaryDetail":{"beta":{}}
    }],"error":null}}"#;

    const TIMESERIES_JSON: &str = r#"{"timeseries":{"result":[
        {"meta":{"symbol":["ACME"],"type":["annualEBIT"]},"timestamp":[1],
         "annualEBIT":[{"asOfDate":"2023-12-31","reportedValue":{"raw":900.0}},
                       {"asOfDate":"2024-12-31","reportedValue":{"raw":1000.0}}]},
        {"meta":{"symbol":["ACME"],"type":["annualTaxRateForCalcs"]},
         "annualTaxRateForCalcs":[null,{"asOfDate":"2024-12-31","reportedValue":{"raw":0.25}}]},
        {"meta":{"symbol":["ACME"],"type":["annualCapitalExpenditure"]},
         "annualCapitalExpenditure":[{"asOfDate":"2024-12-31","reportedValue":{"raw":-150.0}}]},
        {"meta":{"symbol":["ACME"],"type":["annualChangeInWorkingCapital"]},
         "annualChangeInWorkingCapital":[{"asOfDate":"2024-12-31","reportedValue":{"raw":-50.0}}]},
        {"meta":{"symbol":["ACME"],"type":["annualDepreciationAndAmortization"]},
         "annualDepreciationAndAmortization":[{"asOfDate":"2024-12-31","reportedValue":{"raw":100.0}}]},
        {"meta":{"symbol":["ACME"],"type":["annualTotalDebt"]},
         "annualTotalDebt":[{"asOfDate":"2023-12-31","reportedValue":{"raw":4000.0}}]},
        {"meta":{"symbol":["ACME"],"type":["annualInterestExpense"]}}
    ],"error":null}}"#;

    fn ticker(symbol: &str) -> Ticker {
        Ticker::parse(symbol).expect("valid ticker")
    }

    #[tokio::test]
    async fn fake_mode_serves_catalogue_ticker() {
        let adapter = YahooAdapter::default();
        let history = adapter
            .financials(FinancialsRequest::new(ticker("aapl")))
            .await
            .expect("catalogue ticker");

        assert_eq!(history.len(), FAKE_YEARS as usize);
        assert_eq!(history.latest().map(FinancialSnapshot::fiscal_year), Some(2024));
        assert!(history.latest().and_then(|latest| latest.market_price).is_some());
        assert!(history.snapshots[0].market_price.is_none());
        assert_eq!(history.beta, Some(1.2));
    }

    #[tokio::test]
    async fn fake_mode_is_deterministic() {
        let adapter = YahooAdapter::default();
        let first = adapter
            .financials(FinancialsRequest::new(ticker("KO")))
            .await
            .expect("first");
        let second = adapter
            .financials(FinancialsRequest::new(ticker("KO")))
            .await
            .expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_fake_ticker_is_not_found() {
        let error = YahooAdapter::default()
            .financials(FinancialsRequest::new(ticker("ZZZZ")))
            .await
            .expect_err("unknown ticker");
        assert_eq!(error.kind(), SourceErrorKind::TickerNotFound);
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_transport_failures() {
        let adapter = YahooAdapter::with_http_client(Arc::new(FailingMockClient));
        for _ in 0..3 {
            let error = adapter
                .financials(FinancialsRequest::new(ticker("MSFT")))
                .await
                .expect_err("call should fail");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }

        let health = adapter.health().await;
        assert_eq!(health.state, HealthState::Unhealthy);

        let error = adapter
            .financials(FinancialsRequest::new(ticker("MSFT")))
            .await
            .expect_err("breaker blocks");
        assert!(error.message().contains("circuit breaker is open"));
    }

    #[tokio::test]
    async fn real_mode_maps_statements_into_snapshots() {
        let client = Arc::new(RoutedHttpClient::new(vec![
            (COOKIE_URL, HttpResponse::ok("")),
            (CRUMB_URLS[0], HttpResponse::ok("abc123")),
            (QUOTE_SUMMARY_URL, HttpResponse::ok(SUMMARY_JSON)),
            (TIMESERIES_URL, HttpResponse::ok(TIMESERIES_JSON)),
        ]));
        let adapter = YahooAdapter::with_http_client(client.clone())
            .with_retry(RetryConfig::no_retry());
        assert!(adapter.is_real());

        let history = adapter
            .financials(FinancialsRequest::new(ticker("ACME")))
            .await
            .expect("history");

        // 2023 reports EBIT but none of the other FCFF components
        assert_eq!(history.len(), 1);
        assert_eq!(history.beta, Some(1.1));
        assert_eq!(
            history.data_notes,
            vec![
                "fiscal 2023 skipped: depreciation and amortization, capital expenditure, change in working capital not reported",
                "fiscal 2024: revenue not reported; shown as 0",
            ]
        );

        let latest = history.latest().expect("latest");
        assert_eq!(latest.capital_expenditure, 150.0);
        assert_eq!(latest.change_in_nwc, 50.0);
        assert_eq!(latest.interest_expense, None);
        assert_eq!(latest.total_debt, 5_000.0);
        assert_eq!(latest.cash_and_equivalents, 2_000.0);
        assert_eq!(latest.shares_outstanding, 1_000.0);
        assert_eq!(latest.market_price, Some(150.0));
        assert_eq!(crate::valuation::compute_fcff(latest), 650.0);

        let urls = client.urls();
        assert!(urls.iter().any(|url| url.contains("crumb=abc123")));
        assert!(urls
            .iter()
            .any(|url| url.starts_with(TIMESERIES_URL) && url.contains("annualEBIT")));
    }

    #[tokio::test]
    async fn real_mode_404_is_ticker_not_found() {
        let client = Arc::new(RoutedHttpClient::new(vec![
            (COOKIE_URL, HttpResponse::ok("")),
            (CRUMB_URLS[0], HttpResponse::ok("abc123")),
            (
                QUOTE_SUMMARY_URL,
                HttpResponse::new(
                    404,
                    r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for symbol: NOPE"}}}"#,
                ),
            ),
        ]));
        let adapter = YahooAdapter::with_http_client(client).with_retry(RetryConfig::no_retry());

        let error = adapter
            .financials(FinancialsRequest::new(ticker("NOPE")))
            .await
            .expect_err("missing ticker");
        assert_eq!(error.kind(), SourceErrorKind::TickerNotFound);
        assert_eq!(adapter.health().await.state, HealthState::Healthy);
    }

    fn period(items: &[(LineItem, f64)]) -> HashMap<LineItem, f64> {
        items.iter().copied().collect()
    }

    fn complete_period(tax_rate: Option<f64>) -> HashMap<LineItem, f64> {
        let mut items = period(&[
            (LineItem::Revenue, 5_000.0),
            (LineItem::Ebit, 800.0),
            (LineItem::DepreciationAmortization, 90.0),
            (LineItem::CapitalExpenditure, -120.0),
            (LineItem::ChangeInWorkingCapital, -10.0),
            (LineItem::TotalDebt, 600.0),
            (LineItem::Cash, 300.0),
            (LineItem::SharesOutstanding, 50.0),
        ]);
        if let Some(rate) = tax_rate {
            items.insert(LineItem::TaxRate, rate);
        }
        items
    }

    #[test]
    fn period_missing_a_cash_flow_line_is_skipped_not_zero_filled() {
        let mut statements = Statements::new();
        statements.insert(
            Date::from_calendar_date(2022, Month::December, 31).expect("date"),
            period(&[(LineItem::Ebit, 700.0), (LineItem::DepreciationAmortization, 80.0)]),
        );
        statements.insert(
            Date::from_calendar_date(2023, Month::December, 31).expect("date"),
            complete_period(Some(0.2)),
        );
        statements.insert(
            Date::from_calendar_date(2024, Month::December, 31).expect("date"),
            complete_period(Some(0.2)),
        );

        let history =
            build_history(ticker("ACME"), &MarketSummary::default(), statements).expect("history");

        assert_eq!(history.len(), 2);
        assert_eq!(history.snapshots[0].fiscal_year(), 2023);
        // 800 × 0.8 + 90 − 120 − 10
        assert!(history
            .snapshots
            .iter()
            .all(|snapshot| (crate::valuation::compute_fcff(snapshot) - 600.0).abs() < 1e-9));
        assert_eq!(
            history.data_notes,
            vec![
                "fiscal 2022 skipped: capital expenditure, change in working capital not reported",
                "reporting currency not reported; USD assumed",
            ]
        );
    }

    #[test]
    fn tax_rate_substitutions_are_noted() {
        let mut statements = Statements::new();
        statements.insert(
            Date::from_calendar_date(2023, Month::December, 31).expect("date"),
            complete_period(None),
        );
        statements.insert(
            Date::from_calendar_date(2024, Month::December, 31).expect("date"),
            complete_period(Some(-0.05)),
        );
        let summary = MarketSummary {
            currency: Some(String::from("USD")),
            ..MarketSummary::default()
        };

        let history = build_history(ticker("ACME"), &summary, statements).expect("history");

        assert_eq!(history.snapshots[0].tax_rate, FALLBACK_TAX_RATE);
        assert_eq!(history.snapshots[1].tax_rate, 0.0);
        assert_eq!(
            history.data_notes,
            vec![
                "fiscal 2023: tax rate not reported; 21% assumed",
                "fiscal 2024: reported tax rate -5.00% clamped to 0.00%",
            ]
        );
    }

    #[test]
    fn summary_error_payload_is_ticker_not_found() {
        let body = r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found"}}}"#;
        let error = parse_quote_summary(&ticker("NOPE"), body).expect_err("not found");
        assert_eq!(error.kind(), SourceErrorKind::TickerNotFound);
    }

    #[test]
    fn crumb_rejects_html_pages() {
        assert_eq!(parse_crumb(&HttpResponse::ok("<html>blocked</html>")), None);
        assert_eq!(
            parse_crumb(&HttpResponse::ok("  Ab1.x/y \n")),
            Some(String::from("Ab1.x/y"))
        );
        assert_eq!(parse_crumb(&HttpResponse::new(401, "Ab1")), None);
    }
}
