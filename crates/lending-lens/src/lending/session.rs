use super::calendar::DateRange;
use super::decision::{DecisionEngine, DecisionMode};
use super::domain::{DisplayMode, LoanRecord, Thresholds};
use super::report::{aggregate, DecisionReport};
use super::sweep::{SweepError, ThresholdAxis, ThresholdMatrix};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("grid cell ({row}, {column}) lies outside the {rows}x{columns} threshold grid")]
    CellOutOfRange {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },
    #[error(transparent)]
    Sweep(#[from] SweepError),
}

/// What the dashboard renders for its current display mode.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Historical(DecisionReport),
    Simulation {
        thresholds: Thresholds,
        report: DecisionReport,
    },
    Grid(ThresholdMatrix),
}

/// Interactive analysis session over one loaded record set.
///
/// Every view is recomputed from the records on request; nothing is cached
/// between calls.
#[derive(Debug, Clone)]
pub struct LendingDashboard {
    records: Vec<LoanRecord>,
    range: Option<DateRange>,
    mode: DisplayMode,
    thresholds: Thresholds,
    axis: ThresholdAxis,
}

impl LendingDashboard {
    pub fn new(records: Vec<LoanRecord>) -> Self {
        Self {
            records,
            range: None,
            mode: DisplayMode::default(),
            thresholds: Thresholds::default(),
            axis: ThresholdAxis::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub fn axis(&self) -> &ThresholdAxis {
        &self.axis
    }

    pub fn records(&self) -> &[LoanRecord] {
        &self.records
    }

    /// Any mode may follow any other.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        debug!(from = self.mode.label(), to = mode.label(), "display mode changed");
        self.mode = mode;
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn set_range(&mut self, range: Option<DateRange>) {
        self.range = range;
    }

    pub fn set_step(&mut self, step: f64) -> Result<(), SessionError> {
        self.axis = ThresholdAxis::with_step(step)?;
        Ok(())
    }

    /// Swaps in a freshly fetched record set.
    pub fn replace_records(&mut self, records: Vec<LoanRecord>) {
        self.records = records;
    }

    /// Records whose calendar date falls within the active range.
    pub fn visible_records(&self) -> Vec<&LoanRecord> {
        self.records
            .iter()
            .filter(|record| {
                self.range
                    .map_or(true, |range| range.contains(&record.created_at))
            })
            .collect()
    }

    pub fn report(&self, mode: DecisionMode) -> DecisionReport {
        let engine = DecisionEngine::new(mode);
        aggregate(engine.evaluate_all(self.visible_records()))
    }

    pub fn matrix(&self) -> ThresholdMatrix {
        ThresholdMatrix::from_axes(
            &self.visible_records(),
            self.axis.clone(),
            self.axis.clone(),
        )
    }

    /// Picks a grid cell: its exact threshold pair becomes the active thresholds
    /// and the dashboard switches to simulation.
    pub fn select_cell(&mut self, row: usize, column: usize) -> Result<Thresholds, SessionError> {
        let (Some(default_threshold), Some(refusal_threshold)) =
            (self.axis.get(row), self.axis.get(column))
        else {
            return Err(SessionError::CellOutOfRange {
                row,
                column,
                rows: self.axis.len(),
                columns: self.axis.len(),
            });
        };

        let thresholds = Thresholds {
            default_threshold,
            refusal_threshold,
        };
        self.thresholds = thresholds;
        self.set_mode(DisplayMode::Simulation);
        Ok(thresholds)
    }

    pub fn view(&self) -> DashboardView {
        match self.mode {
            DisplayMode::Historical => {
                DashboardView::Historical(self.report(DecisionMode::Historical))
            }
            DisplayMode::Simulation => DashboardView::Simulation {
                thresholds: self.thresholds,
                report: self.report(DecisionMode::Simulation(self.thresholds)),
            },
            DisplayMode::ThresholdGrid => DashboardView::Grid(self.matrix()),
        }
    }
}
