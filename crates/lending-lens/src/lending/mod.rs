//! Lending decision analytics: record normalization, threshold decisions,
//! monthly aggregation and the threshold sweep.

pub mod calendar;
pub mod commit;
pub mod decision;
pub mod domain;
pub mod import;
pub mod normalizer;
pub mod performance;
pub mod report;
pub mod session;
pub mod store;
pub mod sweep;

pub use calendar::{DateRange, DateRangeError, MonthKey, MonthKeyParseError};
pub use commit::{
    commit_thresholds, CommitAuthority, CommitError, CommitPermit, CommittedThresholds,
    RepositoryError, ThresholdRepository,
};
pub use decision::{DecisionEngine, DecisionMode};
pub use domain::{
    Decision, DecisionedLoan, DisplayMode, HistoricalDecision, LoanId, LoanRecord, Thresholds,
};
pub use import::{LoanCsvImporter, LoanImportError};
pub use normalizer::{normalize_rows, NormalizedBatch, RejectedRow, StoreRow};
pub use performance::{summarize, FundedCohort, MonthlyPerformance};
pub use report::{aggregate, DecisionReport, MonthlyStat, MonthlyStatView, OverallSummary, Trend};
pub use session::{DashboardView, LendingDashboard, SessionError};
pub use store::{
    fetch_all, load_records, DataSourceKind, FetchError, LoanRecordStore, MockRecordStore,
    PageRequest, RestRecordStore, RestStoreConfig, MOCK_LOAN_COUNT,
};
pub use sweep::{SweepError, ThresholdAxis, ThresholdCell, ThresholdMatrix, ThresholdMatrixView};
