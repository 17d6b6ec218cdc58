use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Ticker, ValidationError};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Financial statement line items for one fiscal period of one company.
///
/// Amounts are in the reporting currency (not scaled). `capital_expenditure`
/// is a positive outflow and `change_in_nwc` is positive when working capital
/// absorbs cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    #[serde(with = "iso_date")]
    pub fiscal_period_end: Date,
    pub revenue: f64,
    pub ebit: f64,
    pub tax_rate: f64,
    pub depreciation_amortization: f64,
    pub capital_expenditure: f64,
    pub change_in_nwc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_expense: Option<f64>,
    pub total_debt: f64,
    pub cash_and_equivalents: f64,
    pub shares_outstanding: f64,
    /// Current quote; only the most recent period normally carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_price: Option<f64>,
}

impl FinancialSnapshot {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_finite("revenue", self.revenue)?;
        validate_finite("ebit", self.ebit)?;
        validate_finite("depreciation_amortization", self.depreciation_amortization)?;
        validate_finite("change_in_nwc", self.change_in_nwc)?;
        validate_non_negative("capital_expenditure", self.capital_expenditure)?;
        validate_non_negative("total_debt", self.total_debt)?;
        validate_non_negative("cash_and_equivalents", self.cash_and_equivalents)?;
        validate_non_negative("shares_outstanding", self.shares_outstanding)?;
        validate_optional_non_negative("interest_expense", self.interest_expense)?;
        validate_optional_non_negative("market_price", self.market_price)?;

        validate_finite("tax_rate", self.tax_rate)?;
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(ValidationError::OutOfRange {
                field: "tax_rate",
                value: self.tax_rate.to_string(),
                min: String::from("0"),
                max: String::from("1"),
            });
        }

        Ok(())
    }

    /// Price × shares, when a price is known.
    pub fn market_cap(&self) -> Option<f64> {
        self.market_price
            .map(|price| price * self.shares_outstanding)
    }

    pub fn net_debt(&self) -> f64 {
        self.total_debt - self.cash_and_equivalents
    }

    pub fn fiscal_year(&self) -> i32 {
        self.fiscal_period_end.year()
    }
}

/// Ordered statement history for one ticker as delivered by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialHistory {
    pub ticker: Ticker,
    pub currency: String,
    /// Ascending by `fiscal_period_end`.
    pub snapshots: Vec<FinancialSnapshot>,
    /// Provider-reported equity beta, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    /// Provider-side substitutions and skipped periods, in the order found.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_notes: Vec<String>,
}

impl FinancialHistory {
    pub fn new(
        ticker: Ticker,
        currency: impl AsRef<str>,
        mut snapshots: Vec<FinancialSnapshot>,
        beta: Option<f64>,
    ) -> Result<Self, ValidationError> {
        for snapshot in &snapshots {
            snapshot.validate()?;
        }
        if let Some(beta) = beta {
            validate_finite("beta", beta)?;
        }

        snapshots.sort_by_key(|snapshot| snapshot.fiscal_period_end);
        snapshots.dedup_by_key(|snapshot| snapshot.fiscal_period_end);

        Ok(Self {
            ticker,
            currency: validate_currency_code(currency.as_ref())?,
            snapshots,
            beta,
            data_notes: Vec::new(),
        })
    }

    pub fn with_data_notes(mut self, notes: impl IntoIterator<Item = String>) -> Self {
        self.data_notes.extend(notes);
        self
    }

    pub fn latest(&self) -> Option<&FinancialSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn snapshot(period_end: Date) -> FinancialSnapshot {
        FinancialSnapshot {
            fiscal_period_end: period_end,
            revenue: 5_000.0,
            ebit: 1_000.0,
            tax_rate: 0.25,
            depreciation_amortization: 100.0,
            capital_expenditure: 150.0,
            change_in_nwc: 50.0,
            interest_expense: Some(20.0),
            total_debt: 400.0,
            cash_and_equivalents: 300.0,
            shares_outstanding: 100.0,
            market_price: None,
        }
    }

    #[test]
    fn history_is_sorted_ascending() {
        let ticker = Ticker::parse("ACME").expect("ticker");
        let history = FinancialHistory::new(
            ticker,
            "usd",
            vec![snapshot(date!(2024 - 12 - 31)), snapshot(date!(2022 - 12 - 31))],
            None,
        )
        .expect("valid history");

        assert_eq!(history.currency, "USD");
        assert_eq!(history.snapshots[0].fiscal_year(), 2022);
        assert_eq!(history.latest().map(FinancialSnapshot::fiscal_year), Some(2024));
    }

    #[test]
    fn rejects_tax_rate_of_one() {
        let mut bad = snapshot(date!(2024 - 12 - 31));
        bad.tax_rate = 1.0;
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::OutOfRange { field: "tax_rate", .. })
        ));
    }

    #[test]
    fn rejects_non_finite_amounts() {
        let mut bad = snapshot(date!(2024 - 12 - 31));
        bad.ebit = f64::NAN;
        assert_eq!(
            bad.validate(),
            Err(ValidationError::NonFiniteValue { field: "ebit" })
        );
    }

    #[test]
    fn market_cap_requires_price() {
        let mut snap = snapshot(date!(2024 - 12 - 31));
        assert_eq!(snap.market_cap(), None);
        snap.market_price = Some(12.5);
        assert_eq!(snap.market_cap(), Some(1_250.0));
        assert_eq!(snap.net_debt(), 100.0);
    }

    #[test]
    fn serializes_period_end_as_iso_date() {
        let value = serde_json::to_value(snapshot(date!(2023 - 09 - 30))).expect("serializes");
        assert_eq!(value["fiscal_period_end"], "2023-09-30");
        assert!(value.get("market_price").is_none());
    }
}
