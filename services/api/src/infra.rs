use chrono::{NaiveDate, Utc};
use lending_lens::config::AppConfig;
use lending_lens::error::AppError;
use lending_lens::lending::{
    load_records, CommitAuthority, CommitPermit, CommittedThresholds, DateRange, LoanCsvImporter,
    LoanRecord, LoanRecordStore, RepositoryError, ThresholdRepository, Thresholds,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) lending: LendingState,
}

/// Everything the lending endpoints need besides the request itself.
#[derive(Clone)]
pub(crate) struct LendingState {
    pub(crate) store: Arc<dyn LoanRecordStore>,
    pub(crate) page_size: usize,
    pub(crate) defaults: Thresholds,
    pub(crate) authority: CommitAuthority,
    pub(crate) repository: Arc<dyn ThresholdRepository>,
}

impl LendingState {
    pub(crate) fn from_config(config: &AppConfig, today: NaiveDate) -> Result<Self, AppError> {
        Ok(Self {
            store: config.data.source.build(today)?,
            page_size: config.data.page_size,
            defaults: config.thresholds,
            authority: CommitAuthority::new(config.commit_key.clone()),
            repository: Arc::new(InMemoryThresholdRepository::default()),
        })
    }

    /// Committed thresholds win over the configured defaults.
    pub(crate) fn active_thresholds(&self) -> Result<Thresholds, AppError> {
        Ok(self
            .repository
            .current()?
            .map(|committed| committed.thresholds)
            .unwrap_or(self.defaults))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryThresholdRepository {
    committed: Mutex<Option<CommittedThresholds>>,
}

impl ThresholdRepository for InMemoryThresholdRepository {
    fn current(&self) -> Result<Option<CommittedThresholds>, RepositoryError> {
        let guard = self
            .committed
            .lock()
            .map_err(|_| RepositoryError::Unavailable("threshold mutex poisoned".to_string()))?;
        Ok(*guard)
    }

    fn commit(
        &self,
        _permit: &CommitPermit,
        thresholds: Thresholds,
    ) -> Result<CommittedThresholds, RepositoryError> {
        let mut guard = self
            .committed
            .lock()
            .map_err(|_| RepositoryError::Unavailable("threshold mutex poisoned".to_string()))?;
        let record = CommittedThresholds {
            thresholds,
            committed_at: Utc::now(),
        };
        *guard = Some(record);
        Ok(record)
    }
}

/// Date window requested by a CLI invocation or an HTTP body.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RangeSelection {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) end: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) last_months: Option<u32>,
    #[serde(default)]
    pub(crate) year_to_date: bool,
    /// Opt out of the year-to-date default and keep every loaded loan.
    #[serde(default)]
    pub(crate) all: bool,
}

impl RangeSelection {
    /// Explicit dates take precedence over the quick ranges. A start without an
    /// end runs through `today`; nothing selected means year to date, and only
    /// `all` lifts the date filter.
    pub(crate) fn resolve(&self, today: NaiveDate) -> Result<Option<DateRange>, AppError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end)?)),
            (Some(start), None) => Ok(Some(DateRange::new(start, today)?)),
            (None, Some(_)) => Err(AppError::InvalidRequest(
                "an end date needs a start date".to_string(),
            )),
            (None, None) if self.all => Ok(None),
            (None, None) => match self.last_months {
                Some(months) => Ok(Some(DateRange::last_months(months, today)?)),
                None => Ok(Some(DateRange::year_to_date(today))),
            },
        }
    }
}

/// Loans from an inline CSV export when given, otherwise from the store.
pub(crate) async fn load_dataset(
    state: &LendingState,
    csv: Option<String>,
    range: Option<DateRange>,
) -> Result<Vec<LoanRecord>, AppError> {
    let batch = match csv {
        Some(csv) => {
            let mut batch = LoanCsvImporter::from_reader(Cursor::new(csv.into_bytes()))?;
            if let Some(range) = range {
                batch.records.retain(|record| range.contains(&record.created_at));
            }
            batch
        }
        None => load_records(state.store.as_ref(), range, state.page_size).await?,
    };

    info!(
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "dataset ready"
    );
    Ok(batch.records)
}

/// Calendar date anchoring relative windows. Loan timestamps are bucketed in
/// UTC, so the host timezone never shifts the window edges.
pub(crate) fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Parses a `ROW,COL` grid coordinate.
pub(crate) fn parse_cell(raw: &str) -> Result<(usize, usize), String> {
    let (row, column) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL but got '{raw}'"))?;
    let row = row
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid row '{row}' ({err})"))?;
    let column = column
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid column '{column}' ({err})"))?;
    Ok((row, column))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
