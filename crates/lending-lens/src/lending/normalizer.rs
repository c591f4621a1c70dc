use super::domain::{clamp_unit, HistoricalDecision, LoanId, LoanRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Row shape returned by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRow {
    pub id: RawLoanId,
    pub created_at: String,
    #[serde(default)]
    pub default_score: Option<f64>,
    #[serde(default)]
    pub refusal_score: Option<f64>,
    #[serde(default)]
    pub decision: Option<String>,
}

/// Stores hand out integer ids; exports and fixtures sometimes use text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLoanId {
    Number(i64),
    Text(String),
}

impl From<RawLoanId> for LoanId {
    fn from(value: RawLoanId) -> Self {
        match value {
            RawLoanId::Number(id) => LoanId(id.to_string()),
            RawLoanId::Text(id) => LoanId(id.trim().to_string()),
        }
    }
}

/// A row that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub id: LoanId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<LoanRecord>,
    pub rejected: Vec<RejectedRow>,
}

/// Converts one row. Null scores become zero and every score is clamped into
/// `[0, 1]`; only an unreadable timestamp rejects the row.
pub fn normalize_row(row: StoreRow) -> Result<LoanRecord, RejectedRow> {
    let id = LoanId::from(row.id);
    let created_at = match parse_timestamp(&row.created_at) {
        Some(timestamp) => timestamp,
        None => {
            return Err(RejectedRow {
                reason: format!("unreadable created_at '{}'", row.created_at),
                id,
            })
        }
    };

    let historical_decision = match row.decision.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let parsed = HistoricalDecision::parse(raw);
            if parsed.is_none() {
                debug!(loan_id = %id, decision = raw, "unrecognized decision treated as unknown");
            }
            parsed
        }
        _ => None,
    };

    Ok(LoanRecord {
        id,
        created_at,
        default_score: clamp_unit(row.default_score.unwrap_or(0.0)),
        refusal_score: clamp_unit(row.refusal_score.unwrap_or(0.0)),
        historical_decision,
    })
}

pub fn normalize_rows<I>(rows: I) -> NormalizedBatch
where
    I: IntoIterator<Item = StoreRow>,
{
    let mut batch = NormalizedBatch::default();
    for row in rows {
        match normalize_row(row) {
            Ok(record) => batch.records.push(record),
            Err(rejected) => {
                warn!(loan_id = %rejected.id, reason = %rejected.reason, "dropping loan row");
                batch.rejected.push(rejected);
            }
        }
    }
    batch
}

/// Parses store timestamps. Values without a `Z` or offset are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Postgres text output: "2024-03-05 10:00:00.123+00"
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(created_at: &str) -> StoreRow {
        StoreRow {
            id: RawLoanId::Number(7),
            created_at: created_at.to_string(),
            default_score: Some(0.4),
            refusal_score: Some(0.2),
            decision: Some("accept".to_string()),
        }
    }

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn parse_timestamp_assumes_utc_without_zone() {
        assert_eq!(
            parse_timestamp("2024-03-05T10:00:00"),
            Some(utc(2024, 3, 5, 10, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-05 10:00:00.250"),
            Some(utc(2024, 3, 5, 10, 0, 0) + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn parse_timestamp_honours_explicit_offsets() {
        assert_eq!(
            parse_timestamp("2024-03-05T10:00:00Z"),
            Some(utc(2024, 3, 5, 10, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-05T01:00:00+02:00"),
            Some(utc(2024, 3, 4, 23, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-03-05 10:00:00+00"),
            Some(utc(2024, 3, 5, 10, 0, 0))
        );
    }

    #[test]
    fn parse_timestamp_accepts_plain_dates_and_rejects_noise() {
        assert_eq!(parse_timestamp("2024-03-05"), Some(utc(2024, 3, 5, 0, 0, 0)));
        assert!(parse_timestamp("  ").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn null_scores_become_zero_and_out_of_range_scores_clamp() {
        let mut raw = row("2024-03-05T10:00:00Z");
        raw.default_score = None;
        raw.refusal_score = Some(1.7);

        let record = normalize_row(raw).expect("row normalizes");

        assert_eq!(record.id, LoanId("7".to_string()));
        assert_eq!(record.default_score, 0.0);
        assert_eq!(record.refusal_score, 1.0);
        assert_eq!(record.historical_decision, Some(HistoricalDecision::Accept));
    }

    #[test]
    fn missing_or_unrecognized_decision_is_absent() {
        let mut raw = row("2024-03-05T10:00:00Z");
        raw.decision = None;
        assert_eq!(normalize_row(raw).expect("row").historical_decision, None);

        let mut raw = row("2024-03-05T10:00:00Z");
        raw.decision = Some("manual".to_string());
        assert_eq!(normalize_row(raw).expect("row").historical_decision, None);
    }

    #[test]
    fn batch_collects_rejected_rows() {
        let batch = normalize_rows(vec![row("2024-03-05T10:00:00Z"), row("not-a-date")]);

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected.len(), 1);
        assert!(batch.rejected[0].reason.contains("not-a-date"));
    }

    #[test]
    fn store_rows_deserialize_from_json() {
        let rows: Vec<StoreRow> = serde_json::from_str(
            r#"[
                {"id": 1, "created_at": "2024-03-05T10:00:00", "default_score": 0.5, "refusal_score": null, "decision": null},
                {"id": "loan-2", "created_at": "2024-03-06T10:00:00Z", "default_score": 0.1, "refusal_score": 0.2, "decision": "refuse"}
            ]"#,
        )
        .expect("rows parse");

        let batch = normalize_rows(rows);
        assert_eq!(batch.records[0].id, LoanId("1".to_string()));
        assert_eq!(batch.records[0].refusal_score, 0.0);
        assert_eq!(batch.records[1].id, LoanId("loan-2".to_string()));
        assert_eq!(
            batch.records[1].historical_decision,
            Some(HistoricalDecision::Refuse)
        );
    }
}
