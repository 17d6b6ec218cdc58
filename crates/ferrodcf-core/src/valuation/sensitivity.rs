use serde::{Deserialize, Serialize};

use crate::valuation::assumptions::ensure_finite;
use crate::valuation::{discount, discounted_terminal_value, terminal_value, value_per_share, Valuation};
use crate::ValuationError;

const MAX_AXIS_POINTS: usize = 101;

/// Evenly spaced rate values, inclusive of both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateAxis {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl RateAxis {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self, ValuationError> {
        ensure_finite("axis_start", start)?;
        ensure_finite("axis_end", end)?;
        ensure_finite("axis_step", step)?;
        if step <= 0.0 {
            return Err(ValuationError::invalid_input(
                "axis_step",
                "axis step must be positive",
            ));
        }
        if end < start {
            return Err(ValuationError::invalid_input(
                "axis_end",
                format!("axis end {end} is below start {start}"),
            ));
        }
        let intervals = ((end - start) / step + 1e-9).floor();
        if !intervals.is_finite() || intervals >= MAX_AXIS_POINTS as f64 {
            return Err(ValuationError::invalid_input(
                "axis_step",
                format!("axis would have more than {MAX_AXIS_POINTS} points"),
            ));
        }
        Ok(Self { start, end, step })
    }

    /// `center ± half_width` in `step` increments.
    pub fn around(center: f64, half_width: f64, step: f64) -> Result<Self, ValuationError> {
        Self::new(center - half_width, center + half_width, step)
    }

    /// WACC −1 % to +1 % around the base rate, 0.5 % apart.
    pub fn default_wacc(base_wacc: f64) -> Result<Self, ValuationError> {
        Self::around(base_wacc, 0.01, 0.005)
    }

    /// Terminal growth 3.5 % to 5.5 %, 0.5 % apart.
    pub fn default_terminal_growth() -> Self {
        Self {
            start: 0.035,
            end: 0.055,
            step: 0.005,
        }
    }

    /// Values are generated by index and rounded so steps do not accumulate
    /// floating-point drift.
    pub fn values(&self) -> Vec<f64> {
        (0..self.point_count())
            .map(|index| round_rate(self.start + index as f64 * self.step))
            .collect()
    }

    /// Saturates at [`MAX_AXIS_POINTS`] for axes built by hand rather than
    /// through [`RateAxis::new`].
    fn point_count(&self) -> usize {
        let intervals = ((self.end - self.start) / self.step + 1e-9).floor();
        if intervals.is_nan() || intervals < 0.0 {
            return 0;
        }
        if intervals >= MAX_AXIS_POINTS as f64 {
            return MAX_AXIS_POINTS;
        }
        intervals as usize + 1
    }
}

/// Per-share values over a WACC × terminal-growth grid.
///
/// `fair_values[i][j]` pairs `wacc_values[i]` with
/// `terminal_growth_values[j]`; `None` marks combinations where the discount
/// rate does not exceed growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub wacc_values: Vec<f64>,
    pub terminal_growth_values: Vec<f64>,
    pub fair_values: Vec<Vec<Option<f64>>>,
}

impl SensitivityGrid {
    pub fn cell(&self, wacc_index: usize, growth_index: usize) -> Option<f64> {
        self.fair_values
            .get(wacc_index)
            .and_then(|row| row.get(growth_index))
            .copied()
            .flatten()
    }

    pub fn undefined_cells(&self) -> usize {
        self.fair_values
            .iter()
            .flatten()
            .filter(|cell| cell.is_none())
            .count()
    }
}

/// Revalues fixed projected cash flows for every (WACC, g) pair.
pub fn sensitivity(
    projected: &[f64],
    total_debt: f64,
    cash: f64,
    shares_outstanding: f64,
    wacc_values: &[f64],
    terminal_growth_values: &[f64],
) -> Result<SensitivityGrid, ValuationError> {
    let last = projected.last().copied().ok_or_else(|| {
        ValuationError::invalid_input("projected_fcff", "no projected cash flows to revalue")
    })?;
    let horizon = u32::try_from(projected.len()).unwrap_or(u32::MAX);

    let mut fair_values = Vec::with_capacity(wacc_values.len());
    for &wacc in wacc_values {
        let mut row = Vec::with_capacity(terminal_growth_values.len());
        for &growth in terminal_growth_values {
            if wacc <= 0.0 || wacc <= growth {
                row.push(None);
                continue;
            }
            let sum = discount(projected, wacc)?.iter().sum::<f64>();
            let terminal = terminal_value(last, growth, wacc)?;
            let bridge = value_per_share(
                sum,
                discounted_terminal_value(terminal, wacc, horizon),
                total_debt,
                cash,
                shares_outstanding,
            )?;
            row.push(Some(bridge.value_per_share));
        }
        fair_values.push(row);
    }

    Ok(SensitivityGrid {
        wacc_values: wacc_values.to_vec(),
        terminal_growth_values: terminal_growth_values.to_vec(),
        fair_values,
    })
}

/// Grid around a finished valuation, reusing its projections and balance sheet.
pub fn sensitivity_for(
    valuation: &Valuation,
    wacc_axis: &RateAxis,
    growth_axis: &RateAxis,
) -> Result<SensitivityGrid, ValuationError> {
    let result = &valuation.result;
    sensitivity(
        &valuation.projected_fcff(),
        result.total_debt,
        result.cash,
        result.shares_outstanding,
        &wacc_axis.values(),
        &growth_axis.values(),
    )
}

fn round_rate(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_growth_axis_has_five_points() {
        assert_eq!(
            RateAxis::default_terminal_growth().values(),
            vec![0.035, 0.04, 0.045, 0.05, 0.055]
        );
    }

    #[test]
    fn wacc_axis_is_centered_on_base() {
        let values = RateAxis::default_wacc(0.08).expect("axis").values();
        assert_eq!(values, vec![0.07, 0.075, 0.08, 0.085, 0.09]);
    }

    #[test]
    fn rejects_non_positive_step() {
        assert!(RateAxis::new(0.01, 0.05, 0.0).is_err());
        assert!(RateAxis::new(0.05, 0.01, 0.01).is_err());
    }

    #[test]
    fn rejects_steps_too_fine_to_enumerate() {
        for step in [1e-300, f64::MIN_POSITIVE, 1e-4] {
            assert!(matches!(
                RateAxis::new(0.0, 0.1, step),
                Err(ValuationError::InvalidInput { field: "axis_step", .. })
            ));
        }
        assert_eq!(RateAxis::new(0.0, 0.1, 0.001).expect("axis").values().len(), 101);
    }

    #[test]
    fn hand_built_axis_saturates_instead_of_overflowing() {
        let axis = RateAxis {
            start: 0.0,
            end: 0.1,
            step: 1e-300,
        };
        assert_eq!(axis.values().len(), MAX_AXIS_POINTS);
    }

    #[test]
    fn marks_diverging_cells_as_undefined() {
        let grid = sensitivity(&[100.0, 100.0], 0.0, 0.0, 10.0, &[0.04, 0.08], &[0.03, 0.05])
            .expect("grid");

        assert!(grid.cell(0, 0).is_some());
        assert_eq!(grid.cell(0, 1), None);
        assert!(grid.cell(1, 1).is_some());
        assert_eq!(grid.undefined_cells(), 1);
    }

    #[test]
    fn higher_wacc_lowers_fair_value() {
        let grid = sensitivity(&[100.0; 5], 50.0, 10.0, 10.0, &[0.07, 0.09, 0.11], &[0.02])
            .expect("grid");
        let column = (0..3).filter_map(|row| grid.cell(row, 0)).collect::<Vec<_>>();
        assert!(column[0] > column[1] && column[1] > column[2]);
    }

    #[test]
    fn empty_projection_is_invalid() {
        assert!(sensitivity(&[], 0.0, 0.0, 1.0, &[0.08], &[0.02]).is_err());
    }
}
