//! Exhaustive acceptance-rate sweep over a grid of threshold pairs.
//!
//! Rows follow the default-score axis and columns the refusal-score axis. A cell
//! counts a record as accepted with [`accepts_within_both`]; the rate is the
//! accepted share of the whole record set, in `[0, 1]`.

use super::decision::accepts_within_both;
use super::domain::{LoanRecord, Thresholds};
use serde::Serialize;
use std::borrow::Borrow;
use tracing::debug;

pub const DEFAULT_STEP: f64 = 0.05;

/// Axis values are rounded to hundredths, so finer steps would collide.
const MIN_STEP: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SweepError {
    #[error("sweep step must lie within [0.01, 1], got {0}")]
    InvalidStep(f64),
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Ordered threshold values from 0 up to 1 (inclusive when the step divides 1).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ThresholdAxis {
    values: Vec<f64>,
}

impl ThresholdAxis {
    /// Values are `index * step` rounded to two decimals, never accumulated.
    pub fn with_step(step: f64) -> Result<Self, SweepError> {
        if !step.is_finite() || !(MIN_STEP..=1.0).contains(&step) {
            return Err(SweepError::InvalidStep(step));
        }

        let steps = (1.0 / step + 1e-9).floor() as usize;
        let values = (0..=steps)
            .map(|index| round_to_hundredths(index as f64 * step))
            .collect();

        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Index of the axis value equal to `value` after rounding to hundredths.
    pub fn position(&self, value: f64) -> Option<usize> {
        let target = round_to_hundredths(value);
        self.values.iter().position(|candidate| *candidate == target)
    }
}

impl Default for ThresholdAxis {
    fn default() -> Self {
        let values = (0..=20)
            .map(|index| round_to_hundredths(index as f64 * DEFAULT_STEP))
            .collect();
        Self { values }
    }
}

/// One grid coordinate with the exact threshold pair it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdCell {
    pub row: usize,
    pub column: usize,
    pub thresholds: Thresholds,
    pub acceptance_rate: f64,
}

/// Dense, row-major grid of acceptance rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdMatrix {
    default_axis: ThresholdAxis,
    refusal_axis: ThresholdAxis,
    rates: Vec<f64>,
    record_count: usize,
}

impl ThresholdMatrix {
    /// Sweeps the default 0.05 grid (21 x 21 cells).
    pub fn sweep<R: Borrow<LoanRecord>>(records: &[R]) -> Self {
        Self::from_axes(records, ThresholdAxis::default(), ThresholdAxis::default())
    }

    pub fn sweep_with_step<R: Borrow<LoanRecord>>(
        records: &[R],
        step: f64,
    ) -> Result<Self, SweepError> {
        let axis = ThresholdAxis::with_step(step)?;
        Ok(Self::from_axes(records, axis.clone(), axis))
    }

    pub fn from_axes<R: Borrow<LoanRecord>>(
        records: &[R],
        default_axis: ThresholdAxis,
        refusal_axis: ThresholdAxis,
    ) -> Self {
        let cells = default_axis.len() * refusal_axis.len();
        let record_count = records.len();

        if record_count == 0 {
            return Self {
                default_axis,
                refusal_axis,
                rates: vec![0.0; cells],
                record_count,
            };
        }

        let mut rates = Vec::with_capacity(cells);
        for &default_threshold in default_axis.values() {
            for &refusal_threshold in refusal_axis.values() {
                let thresholds = Thresholds {
                    default_threshold,
                    refusal_threshold,
                };
                let accepted = records
                    .iter()
                    .filter(|record| {
                        accepts_within_both(Borrow::<LoanRecord>::borrow(*record), thresholds)
                    })
                    .count();
                rates.push(accepted as f64 / record_count as f64);
            }
        }

        debug!(records = record_count, cells, "threshold sweep complete");

        Self {
            default_axis,
            refusal_axis,
            rates,
            record_count,
        }
    }

    pub fn default_axis(&self) -> &ThresholdAxis {
        &self.default_axis
    }

    pub fn refusal_axis(&self) -> &ThresholdAxis {
        &self.refusal_axis
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// True when the sweep ran over no records; every rate is then zero.
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// `(rows, columns)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.default_axis.len(), self.refusal_axis.len())
    }

    pub fn rate(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.default_axis.len() || column >= self.refusal_axis.len() {
            return None;
        }
        self.rates.get(row * self.refusal_axis.len() + column).copied()
    }

    /// Exact threshold pair behind a grid coordinate.
    pub fn thresholds_at(&self, row: usize, column: usize) -> Option<Thresholds> {
        Some(Thresholds {
            default_threshold: self.default_axis.get(row)?,
            refusal_threshold: self.refusal_axis.get(column)?,
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<ThresholdCell> {
        Some(ThresholdCell {
            row,
            column,
            thresholds: self.thresholds_at(row, column)?,
            acceptance_rate: self.rate(row, column)?,
        })
    }

    /// Grid coordinate of a threshold pair, if both values sit on the axes.
    pub fn locate(&self, thresholds: Thresholds) -> Option<(usize, usize)> {
        Some((
            self.default_axis.position(thresholds.default_threshold)?,
            self.refusal_axis.position(thresholds.refusal_threshold)?,
        ))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.rates.chunks(self.refusal_axis.len().max(1))
    }

    pub fn cells(&self) -> impl Iterator<Item = ThresholdCell> + '_ {
        let (rows, columns) = self.dimensions();
        (0..rows).flat_map(move |row| {
            (0..columns).filter_map(move |column| self.cell(row, column))
        })
    }

    pub fn view(&self) -> ThresholdMatrixView {
        ThresholdMatrixView {
            default_thresholds: self.default_axis.values().to_vec(),
            refusal_thresholds: self.refusal_axis.values().to_vec(),
            rates: self.rows().map(<[f64]>::to_vec).collect(),
            record_count: self.record_count,
        }
    }
}

/// Serializable grid: `rates[row][column]` with row = default threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdMatrixView {
    pub default_thresholds: Vec<f64>,
    pub refusal_thresholds: Vec<f64>,
    pub rates: Vec<Vec<f64>>,
    pub record_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::domain::LoanId;
    use chrono::{TimeZone, Utc};

    fn record(default_score: f64, refusal_score: f64) -> LoanRecord {
        LoanRecord {
            id: LoanId(format!("{default_score}-{refusal_score}")),
            created_at: Utc
                .with_ymd_and_hms(2024, 3, 5, 10, 0, 0)
                .single()
                .expect("valid timestamp"),
            default_score,
            refusal_score,
            historical_decision: None,
        }
    }

    #[test]
    fn default_axis_has_twenty_one_rounded_values() {
        let axis = ThresholdAxis::default();

        assert_eq!(axis.len(), 21);
        assert_eq!(axis.get(0), Some(0.0));
        assert_eq!(axis.get(3), Some(0.15));
        assert_eq!(axis.get(7), Some(0.35));
        assert_eq!(axis.get(20), Some(1.0));
        assert_eq!(ThresholdAxis::with_step(DEFAULT_STEP), Ok(axis));
    }

    #[test]
    fn axis_rejects_degenerate_steps() {
        for step in [0.0, -0.1, 0.001, 1.5, f64::NAN, f64::INFINITY] {
            assert!(ThresholdAxis::with_step(step).is_err(), "step {step} accepted");
        }
        let coarse = ThresholdAxis::with_step(0.3).expect("valid step");
        assert_eq!(coarse.values(), &[0.0, 0.3, 0.6, 0.9]);
    }

    #[test]
    fn empty_record_set_yields_zero_grid() {
        let matrix = ThresholdMatrix::sweep::<LoanRecord>(&[]);

        assert!(matrix.is_empty());
        assert_eq!(matrix.dimensions(), (21, 21));
        assert!(matrix.cells().all(|cell| cell.acceptance_rate == 0.0));
    }

    #[test]
    fn corner_cells_match_reference_values() {
        let records = vec![
            record(0.0, 0.0),
            record(0.3, 0.0),
            record(1.0, 1.0),
            record(0.0, 0.0),
        ];
        let matrix = ThresholdMatrix::sweep(&records);

        assert_eq!(matrix.rate(0, 0), Some(0.5));
        assert_eq!(matrix.rate(20, 20), Some(1.0));
    }

    #[test]
    fn cells_use_inclusive_bounds() {
        let records = vec![record(0.35, 0.6)];
        let matrix = ThresholdMatrix::sweep(&records);

        let (row, column) = matrix
            .locate(Thresholds::new(0.35, 0.6))
            .expect("pair on grid");
        assert_eq!((row, column), (7, 12));
        assert_eq!(matrix.rate(row, column), Some(1.0));
        assert_eq!(matrix.rate(row - 1, column), Some(0.0));
        assert_eq!(matrix.rate(row, column - 1), Some(0.0));
    }

    #[test]
    fn selected_cell_reports_exact_thresholds() {
        let records = vec![record(0.2, 0.2)];
        let matrix = ThresholdMatrix::sweep(&records);

        let cell = matrix.cell(14, 12).expect("cell exists");
        assert_eq!(cell.thresholds.default_threshold, 0.7);
        assert_eq!(cell.thresholds.refusal_threshold, 0.6);
        assert_eq!(cell.acceptance_rate, 1.0);
        assert!(matrix.cell(21, 0).is_none());
    }

    #[test]
    fn view_is_row_major_by_default_threshold() {
        let records = vec![record(0.5, 0.0)];
        let view = ThresholdMatrix::sweep(&records).view();

        assert_eq!(view.rates.len(), 21);
        assert!(view.rates.iter().all(|row| row.len() == 21));
        assert_eq!(view.rates[9][0], 0.0);
        assert_eq!(view.rates[10][0], 1.0);
        assert_eq!(view.default_thresholds[10], 0.5);
    }

    #[test]
    fn sweep_accepts_borrowed_records() {
        let records = vec![record(0.1, 0.1), record(0.9, 0.9)];
        let borrowed: Vec<&LoanRecord> = records.iter().collect();

        let matrix = ThresholdMatrix::sweep(&borrowed);

        assert_eq!(matrix.record_count(), 2);
        assert_eq!(matrix.rate(10, 10), Some(0.5));
    }
}
