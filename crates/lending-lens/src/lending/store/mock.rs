use super::{FetchError, LoanRecordStore, PageRequest};
use crate::lending::decision::refuses_above_either;
use crate::lending::domain::{LoanId, LoanRecord, Thresholds};
use crate::lending::normalizer::{parse_timestamp, RawLoanId, StoreRow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MOCK_LOAN_COUNT: usize = 500;

/// Share of generated loans whose stored decision ignores the reference rule.
const NOISE_SHARE: f64 = 0.1;

struct MockEntry {
    created_at: Option<DateTime<Utc>>,
    row: StoreRow,
}

/// In-memory store that answers pages the way the remote query would:
/// ascending `created_at`, optional whole-day bounds, offset and limit.
pub struct MockRecordStore {
    entries: Vec<MockEntry>,
}

impl MockRecordStore {
    /// Deterministic sample of [`MOCK_LOAN_COUNT`] loans spread between
    /// 2023-01-01 and the end of `today`. Stored decisions follow the 0.7/0.6
    /// refusal rule except for a random tenth.
    pub fn generate(seed: u64, today: NaiveDate) -> Self {
        let Some(start) = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).single() else {
            return Self::from_rows(Vec::new());
        };
        let end = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN)) + Duration::days(1);
        let span = (end - start).num_seconds().max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let reference = Thresholds::default();

        let rows = (0..MOCK_LOAN_COUNT)
            .map(|index| {
                let created_at = start + Duration::seconds(rng.gen_range(0..span));
                let default_score: f64 = rng.gen();
                let refusal_score: f64 = rng.gen();

                let scored = LoanRecord {
                    id: LoanId(String::new()),
                    created_at,
                    default_score,
                    refusal_score,
                    historical_decision: None,
                };
                let refuse = if rng.gen::<f64>() > NOISE_SHARE {
                    refuses_above_either(&scored, reference)
                } else {
                    rng.gen_bool(0.5)
                };

                StoreRow {
                    id: RawLoanId::Text(format!("loan-{index}")),
                    created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    default_score: Some(default_score),
                    refusal_score: Some(refusal_score),
                    decision: Some(if refuse { "refuse" } else { "accept" }.to_string()),
                }
            })
            .collect();

        Self::from_rows(rows)
    }

    /// Wraps fixed rows, ordering them by `created_at`. Rows without a readable
    /// timestamp sort last and never match a date range.
    pub fn from_rows(rows: Vec<StoreRow>) -> Self {
        let mut entries: Vec<MockEntry> = rows
            .into_iter()
            .map(|row| MockEntry {
                created_at: parse_timestamp(&row.created_at),
                row,
            })
            .collect();
        entries.sort_by_key(|entry| (entry.created_at.is_none(), entry.created_at));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl LoanRecordStore for MockRecordStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<StoreRow>, FetchError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.row.default_score.is_some() && entry.row.refusal_score.is_some())
            .filter(|entry| match request.range {
                Some(range) => entry
                    .created_at
                    .map_or(false, |created_at| range.contains(&created_at)),
                None => true,
            })
            .skip(request.offset)
            .take(request.limit)
            .map(|entry| entry.row.clone())
            .collect())
    }
}
