use super::normalizer::{normalize_rows, NormalizedBatch, RawLoanId, StoreRow};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum LoanImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for LoanImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanImportError::Io(err) => write!(f, "failed to read loan export: {}", err),
            LoanImportError::Csv(err) => write!(f, "invalid loan CSV data: {}", err),
        }
    }
}

impl std::error::Error for LoanImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoanImportError::Io(err) => Some(err),
            LoanImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LoanImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for LoanImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads loan exports with `id,created_at,default_score,refusal_score,decision` columns.
pub struct LoanCsvImporter;

impl LoanCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<NormalizedBatch, LoanImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<NormalizedBatch, LoanImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<CsvLoanRow>() {
            rows.push(record?.into_store_row());
        }

        Ok(normalize_rows(rows))
    }
}

#[derive(Debug, Deserialize)]
struct CsvLoanRow {
    id: String,
    #[serde(default)]
    created_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    default_score: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    refusal_score: Option<f64>,
    #[serde(default, alias = "historical_decision", deserialize_with = "empty_string_as_none")]
    decision: Option<String>,
}

impl CsvLoanRow {
    fn into_store_row(self) -> StoreRow {
        let id = match self.id.parse::<i64>() {
            Ok(number) => RawLoanId::Number(number),
            Err(_) => RawLoanId::Text(self.id),
        };

        StoreRow {
            id,
            created_at: self.created_at,
            default_score: self.default_score,
            refusal_score: self.refusal_score,
            decision: self.decision,
        }
    }
}

fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("null") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}
