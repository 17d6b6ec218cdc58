use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::ProviderSettings;
use crate::data_source::{RateObservation, RateSource, SourceError};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::ProviderId;

const FRED_CSV_URL: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";
/// 10-year Treasury constant maturity, in percent.
pub const TEN_YEAR_TREASURY: &str = "DGS10";

const FAKE_RATE: f64 = 0.0425;
const FAKE_OBSERVED_ON: &str = "2024-12-31";

/// Risk-free rate from the St. Louis Fed graph CSV export.
///
/// The series is quoted in percent and converted to a decimal. Days without
/// an observation are published as `.` and skipped.
#[derive(Clone)]
pub struct FredAdapter {
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    timeout_ms: u64,
    series_id: String,
    use_real_api: bool,
}

impl std::fmt::Debug for FredAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FredAdapter")
            .field("series_id", &self.series_id)
            .field("use_real_api", &self.use_real_api)
            .finish()
    }
}

impl Default for FredAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }
}

impl FredAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::new("fred", CircuitBreakerConfig::default())),
            retry: RetryConfig::default(),
            timeout_ms: 10_000,
            series_id: String::from(TEN_YEAR_TREASURY),
            use_real_api,
        }
    }

    pub fn from_settings(http_client: Arc<dyn HttpClient>, settings: &ProviderSettings) -> Self {
        Self {
            circuit_breaker: Arc::new(CircuitBreaker::new(
                "fred",
                settings.circuit_breaker_config(),
            )),
            retry: settings.retry_config(),
            timeout_ms: settings.timeout_ms,
            ..Self::with_http_client(http_client)
        }
    }

    pub fn with_series(mut self, series_id: impl Into<String>) -> Self {
        self.series_id = series_id.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_real(&self) -> Result<RateObservation, SourceError> {
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "fred circuit breaker is open; skipping upstream call",
            ));
        }

        let url = format!(
            "{FRED_CSV_URL}?id={}",
            urlencoding::encode(&self.series_id)
        );
        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let response = execute_with_retry(self.http_client.as_ref(), &request, &self.retry)
            .await
            .map_err(|error| {
                self.circuit_breaker.record_failure();
                SourceError::unavailable(format!("fred transport error: {}", error.message()))
            })?;

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(if response.status == 429 {
                SourceError::rate_limited("fred returned status 429")
            } else {
                SourceError::unavailable(format!("fred returned status {}", response.status))
            });
        }
        self.circuit_breaker.record_success();

        let (observed_on, percent) = latest_observation(&response.body).ok_or_else(|| {
            SourceError::unavailable(format!(
                "fred series {} has no usable observation",
                self.series_id
            ))
        })?;

        Ok(RateObservation {
            source: ProviderId::Fred,
            series_id: self.series_id.clone(),
            observed_on,
            rate: percent / 100.0,
        })
    }
}

impl RateSource for FredAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Fred
    }

    fn risk_free_rate<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RateObservation, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.use_real_api {
                return Ok(RateObservation {
                    source: ProviderId::Fred,
                    series_id: self.series_id.clone(),
                    observed_on: String::from(FAKE_OBSERVED_ON),
                    rate: FAKE_RATE,
                });
            }

            let observation = self.fetch_real().await;
            match &observation {
                Ok(observation) => tracing::info!(
                    series = %observation.series_id,
                    observed_on = %observation.observed_on,
                    rate = observation.rate,
                    "fetched risk-free rate"
                ),
                Err(error) => tracing::warn!(series = %self.series_id, %error, "risk-free rate fetch failed"),
            }
            observation
        })
    }
}

/// Last row with a numeric value, as (date, percent).
fn latest_observation(csv: &str) -> Option<(String, f64)> {
    csv.lines()
        .skip(1)
        .filter_map(|line| {
            let (date, value) = line.trim().split_once(',')?;
            let value = value.trim().parse::<f64>().ok().filter(|value| value.is_finite())?;
            Some((date.trim().to_owned(), value))
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};

    struct StaticClient(HttpResponse);

    impl HttpClient for StaticClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = self.0.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    #[test]
    fn skips_missing_observations() {
        let csv = "observation_date,DGS10\n2025-01-02,4.57\n2025-01-03,4.60\n2025-01-06,.\n";
        assert_eq!(
            latest_observation(csv),
            Some((String::from("2025-01-03"), 4.60))
        );
    }

    #[test]
    fn header_only_csv_has_no_observation() {
        assert_eq!(latest_observation("DATE,DGS10\n"), None);
    }

    #[tokio::test]
    async fn offline_rate_is_fixed() {
        let observation = FredAdapter::default()
            .risk_free_rate()
            .await
            .expect("offline rate");
        assert_eq!(observation.rate, FAKE_RATE);
        assert_eq!(observation.series_id, TEN_YEAR_TREASURY);
    }

    #[tokio::test]
    async fn real_rate_is_converted_from_percent() {
        let client = Arc::new(StaticClient(HttpResponse::ok(
            "DATE,DGS10\n2025-01-02,4.00\n",
        )));
        let observation = FredAdapter::with_http_client(client)
            .risk_free_rate()
            .await
            .expect("rate");
        assert!((observation.rate - 0.04).abs() < 1e-12);
        assert_eq!(observation.observed_on, "2025-01-02");
        assert_eq!(observation.source, ProviderId::Fred);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let client = Arc::new(StaticClient(HttpResponse::new(503, "down")));
        let error = FredAdapter::with_http_client(client)
            .with_retry(RetryConfig::no_retry())
            .risk_free_rate()
            .await
            .expect_err("503");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.retryable());
    }
}
