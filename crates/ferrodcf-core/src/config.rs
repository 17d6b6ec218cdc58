//! Layered runtime settings.
//!
//! Precedence, lowest first: built-in defaults, TOML file (`--config` or
//! `$FERRODCF_CONFIG`), environment variables, CLI flags (applied by the
//! binary). Rates are decimals everywhere in this module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::FinancialsCache;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryConfig;
use crate::throttling::RequestThrottle;
use crate::valuation::{AssumptionSet, BaseFcffMethod, MAX_HORIZON_YEARS};

pub const CONFIG_PATH_ENV: &str = "FERRODCF_CONFIG";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("config value '{field}' is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub assumptions: AssumptionSettings,
    pub market: MarketSettings,
    pub provider: ProviderSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

/// Starting values of the user-tunable assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssumptionSettings {
    pub horizon_years: u32,
    pub fcff_growth: f64,
    pub terminal_growth: f64,
    /// Periods averaged for the base FCFF; 1 means latest only.
    pub base_years: usize,
}

impl Default for AssumptionSettings {
    fn default() -> Self {
        let defaults = AssumptionSet::default();
        Self {
            horizon_years: defaults.horizon_years,
            fcff_growth: defaults.fcff_growth,
            terminal_growth: defaults.terminal_growth,
            base_years: 3,
        }
    }
}

impl AssumptionSettings {
    pub fn to_assumption_set(&self) -> AssumptionSet {
        let base_method = if self.base_years <= 1 {
            BaseFcffMethod::Latest
        } else {
            BaseFcffMethod::TrailingAverage(self.base_years)
        };
        AssumptionSet {
            horizon_years: self.horizon_years,
            fcff_growth: self.fcff_growth,
            terminal_growth: self.terminal_growth,
            base_method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketSettings {
    /// Used when the Treasury yield cannot be fetched.
    pub fallback_risk_free_rate: f64,
    /// Forces the risk-free rate instead of fetching it.
    pub risk_free_rate: Option<f64>,
    pub market_return: f64,
    /// Forces beta instead of the provider-reported one.
    pub beta: Option<f64>,
    /// Forces the pre-tax cost of debt instead of interest / debt.
    pub cost_of_debt: Option<f64>,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            fallback_risk_free_rate: 0.0425,
            risk_free_rate: None,
            market_return: 0.09,
            beta: None,
            cost_of_debt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub timeout_ms: u64,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    pub breaker_failure_threshold: u32,
    pub breaker_open_secs: u64,
    /// Pre-authenticated Yahoo session cookie; skips the crumb handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yahoo_cookie: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            requests_per_minute: 60,
            max_retries: 2,
            breaker_failure_threshold: 3,
            breaker_open_secs: 30,
            yahoo_cookie: None,
        }
    }
}

impl ProviderSettings {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::exponential(self.max_retries)
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            open_timeout: Duration::from_secs(self.breaker_open_secs),
        }
    }

    pub fn throttle(&self) -> RequestThrottle {
        RequestThrottle::per_minute(self.requests_per_minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            max_entries: 64,
        }
    }
}

impl CacheSettings {
    pub fn build(&self) -> FinancialsCache {
        FinancialsCache::new(Duration::from_secs(self.ttl_secs), self.max_entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: String::from("warn"),
            format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Defaults, then `path` (or `$FERRODCF_CONFIG`), then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut settings = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str::<Self>(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(settings)
    }

    /// Applies `FERRODCF_*` overrides read through `lookup`. Empty values are
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("FERRODCF_RISK_FREE_RATE") {
            self.market.risk_free_rate = Some(parse_env("FERRODCF_RISK_FREE_RATE", &value)?);
        }
        if let Some(value) = get("FERRODCF_MARKET_RETURN") {
            self.market.market_return = parse_env("FERRODCF_MARKET_RETURN", &value)?;
        }
        if let Some(value) = get("FERRODCF_BETA") {
            self.market.beta = Some(parse_env("FERRODCF_BETA", &value)?);
        }
        if let Some(value) = get("FERRODCF_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env("FERRODCF_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = get("FERRODCF_LOG_LEVEL") {
            self.logging.level = value.trim().to_ascii_lowercase();
        }
        if let Some(value) = get("YAHOO_COOKIE") {
            self.provider.yahoo_cookie = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let assumptions = &self.assumptions;
        if !(1..=MAX_HORIZON_YEARS).contains(&assumptions.horizon_years) {
            return Err(ConfigError::invalid(
                "assumptions.horizon_years",
                format!("{} is outside 1..={MAX_HORIZON_YEARS}", assumptions.horizon_years),
            ));
        }
        ensure_rate("assumptions.fcff_growth", assumptions.fcff_growth, -1.0, 1.0)?;
        ensure_rate("assumptions.terminal_growth", assumptions.terminal_growth, -0.5, 0.5)?;
        if assumptions.base_years == 0 {
            return Err(ConfigError::invalid(
                "assumptions.base_years",
                "must be at least 1",
            ));
        }

        let market = &self.market;
        ensure_rate("market.fallback_risk_free_rate", market.fallback_risk_free_rate, -0.05, 0.5)?;
        if let Some(rate) = market.risk_free_rate {
            ensure_rate("market.risk_free_rate", rate, -0.05, 0.5)?;
        }
        ensure_rate("market.market_return", market.market_return, -0.5, 1.0)?;
        if let Some(beta) = market.beta {
            ensure_rate("market.beta", beta, -5.0, 10.0)?;
        }
        if let Some(cost) = market.cost_of_debt {
            ensure_rate("market.cost_of_debt", cost, 0.0, 1.0)?;
        }

        if self.provider.timeout_ms == 0 {
            return Err(ConfigError::invalid("provider.timeout_ms", "must be positive"));
        }
        if self.provider.requests_per_minute == 0 {
            return Err(ConfigError::invalid(
                "provider.requests_per_minute",
                "must be positive",
            ));
        }
        if self.provider.breaker_failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "provider.breaker_failure_threshold",
                "must be positive",
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("'{}' is not one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_owned(),
    })
}

fn ensure_rate(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::invalid(
            field,
            format!("{value} is outside [{min}, {max}]"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.market.market_return, 0.09);
        assert_eq!(
            settings.assumptions.to_assumption_set(),
            AssumptionSet::default()
        );
    }

    #[test]
    fn reads_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[assumptions]\nhorizon_years = 7\nbase_years = 1\n\n[market]\nbeta = 1.3\n"
        )
        .expect("write config");

        let settings = Settings::from_file(file.path()).expect("config parses");

        assert_eq!(settings.assumptions.horizon_years, 7);
        assert_eq!(settings.assumptions.fcff_growth, 0.14);
        assert_eq!(
            settings.assumptions.to_assumption_set().base_method,
            BaseFcffMethod::Latest
        );
        assert_eq!(settings.market.beta, Some(1.3));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[market]\nbta = 1.3\n").expect("write config");
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Settings::from_file(&dir.path().join("absent.toml")).expect_err("must fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("FERRODCF_RISK_FREE_RATE", "0.041"),
                ("FERRODCF_BETA", " 0.8 "),
                ("FERRODCF_LOG_LEVEL", "DEBUG"),
                ("YAHOO_COOKIE", "B=abc"),
                ("FERRODCF_MARKET_RETURN", ""),
            ]))
            .expect("overrides apply");

        assert_eq!(settings.market.risk_free_rate, Some(0.041));
        assert_eq!(settings.market.beta, Some(0.8));
        assert_eq!(settings.market.market_return, 0.09);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.provider.yahoo_cookie.as_deref(), Some("B=abc"));
    }

    #[test]
    fn malformed_environment_value_is_reported() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(env(&[("FERRODCF_CACHE_TTL_SECS", "an hour")]))
            .expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "FERRODCF_CACHE_TTL_SECS",
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut settings = Settings::default();
        settings.assumptions.horizon_years = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.logging.level = String::from("loud");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue {
                field: "logging.level",
                ..
            })
        ));
    }
}
