use crate::valuation::assumptions::ensure_finite;
use crate::ValuationError;

/// `1 / (1 + wacc)^t`
pub fn discount_factor(wacc: f64, year: u32) -> f64 {
    1.0 / (1.0 + wacc).powi(i32::try_from(year).unwrap_or(i32::MAX))
}

/// Present value of each projected year; element `i` is discounted `i + 1` years.
pub fn discount(projected: &[f64], wacc: f64) -> Result<Vec<f64>, ValuationError> {
    ensure_discount_rate(wacc)?;
    Ok(projected
        .iter()
        .zip(1_u32..)
        .map(|(fcff, year)| fcff * discount_factor(wacc, year))
        .collect())
}

/// Gordon growth terminal value at the end of the horizon (undiscounted).
///
/// Fails instead of returning a negative or infinite value when
/// `wacc <= terminal_growth`.
pub fn terminal_value(
    last_projected_fcff: f64,
    terminal_growth: f64,
    wacc: f64,
) -> Result<f64, ValuationError> {
    ensure_finite("last_projected_fcff", last_projected_fcff)?;
    ensure_finite("terminal_growth", terminal_growth)?;
    ensure_discount_rate(wacc)?;
    if wacc <= terminal_growth {
        return Err(ValuationError::invalid_input(
            "terminal_growth",
            format!(
                "terminal growth {terminal_growth} must be below WACC {wacc}; terminal value would diverge"
            ),
        ));
    }

    Ok(last_projected_fcff * (1.0 + terminal_growth) / (wacc - terminal_growth))
}

/// Terminal value brought back with the final forecast year's factor.
pub fn discounted_terminal_value(
    terminal_value: f64,
    wacc: f64,
    horizon_years: u32,
) -> f64 {
    terminal_value * discount_factor(wacc, horizon_years)
}

fn ensure_discount_rate(wacc: f64) -> Result<(), ValuationError> {
    ensure_finite("wacc", wacc)?;
    if wacc <= -1.0 {
        return Err(ValuationError::invalid_input(
            "wacc",
            format!("discount rate {wacc} must be above -100%"),
        ));
    }
    Ok(())
}
