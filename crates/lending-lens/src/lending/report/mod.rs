mod summary;
pub mod views;

pub use summary::{
    aggregate, percentage, percentage_of, DecisionReport, MonthlyStat, OverallSummary,
};
pub use views::{MonthlyStatView, Trend};
