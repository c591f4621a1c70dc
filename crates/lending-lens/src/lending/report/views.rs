use super::super::calendar::MonthKey;
use serde::Serialize;

/// Direction of the acceptance rate compared with the previous month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// No trend when the previous month had a zero rate or the change is under
    /// a tenth of a percentage point.
    pub fn between(current_rate: f64, previous_rate: f64) -> Option<Self> {
        if previous_rate == 0.0 {
            return None;
        }
        let diff = current_rate - previous_rate;
        if diff.abs() < 0.1 {
            None
        } else if diff > 0.0 {
            Some(Trend::Up)
        } else {
            Some(Trend::Down)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStatView {
    pub month: MonthKey,
    pub month_label: String,
    pub total: usize,
    pub accepted: usize,
    pub refused: usize,
    pub acceptance_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}
