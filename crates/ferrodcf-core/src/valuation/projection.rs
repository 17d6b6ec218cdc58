use crate::valuation::assumptions::{ensure_finite, ensure_horizon};
use crate::ValuationError;

/// `FCFF_t = base × (1 + g)^t` for `t = 1..=horizon_years`.
///
/// A growth rate of exactly -1 collapses every projected year to zero.
pub fn project(
    base_fcff: f64,
    growth_rate: f64,
    horizon_years: u32,
) -> Result<Vec<f64>, ValuationError> {
    ensure_finite("base_fcff", base_fcff)?;
    ensure_finite("fcff_growth", growth_rate)?;
    ensure_horizon(horizon_years)?;
    if growth_rate < -1.0 {
        return Err(ValuationError::invalid_input(
            "fcff_growth",
            format!("growth rate {growth_rate} is below -100%"),
        ));
    }

    let factor = 1.0 + growth_rate;
    let projected = (1..=i32::try_from(horizon_years).unwrap_or(i32::MAX))
        .map(|year| base_fcff * factor.powi(year))
        .collect::<Vec<_>>();

    if let Some(overflow) = projected.iter().find(|value| !value.is_finite()) {
        return Err(ValuationError::invalid_input(
            "fcff_growth",
            format!("projection overflowed to {overflow}"),
        ));
    }

    Ok(projected)
}
