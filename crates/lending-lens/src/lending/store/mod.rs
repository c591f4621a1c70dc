//! Paginated sources of raw loan rows.
//!
//! A store answers one page at a time; [`fetch_all`] walks the pages until a
//! short one arrives. Which store backs a deployment is picked once, through
//! [`DataSourceKind`], when the store is built.

mod mock;
mod rest;

pub use mock::{MockRecordStore, MOCK_LOAN_COUNT};
pub use rest::{RestRecordStore, RestStoreConfig};

use super::calendar::DateRange;
use super::normalizer::{normalize_rows, NormalizedBatch, StoreRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One page of the `created_at`-ordered, non-null-score query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    pub range: Option<DateRange>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid store endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("page size must be greater than zero")]
    InvalidPageSize,
    #[error("tls setup failed: {0}")]
    Tls(String),
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("store returned an unreadable payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait LoanRecordStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<StoreRow>, FetchError>;
}

/// Concatenates pages until one comes back shorter than `page_size`.
///
/// Any failed page fails the whole load; nothing is retried.
pub async fn fetch_all<S>(
    store: &S,
    range: Option<DateRange>,
    page_size: usize,
) -> Result<Vec<StoreRow>, FetchError>
where
    S: LoanRecordStore + ?Sized,
{
    if page_size == 0 {
        return Err(FetchError::InvalidPageSize);
    }

    let mut rows = Vec::new();
    let mut offset = 0;
    let mut pages = 0;
    loop {
        let request = PageRequest {
            offset,
            limit: page_size,
            range,
        };
        let page = store.fetch_page(&request).await?;
        let received = page.len();
        pages += 1;
        debug!(store = store.name(), offset, received, "fetched loan page");

        rows.extend(page);
        if received < page_size {
            break;
        }
        offset += received;
    }

    info!(store = store.name(), pages, rows = rows.len(), "loan rows fetched");
    Ok(rows)
}

/// Fetches every page and normalizes the rows into records.
pub async fn load_records<S>(
    store: &S,
    range: Option<DateRange>,
    page_size: usize,
) -> Result<NormalizedBatch, FetchError>
where
    S: LoanRecordStore + ?Sized,
{
    let rows = fetch_all(store, range, page_size).await?;
    let batch = normalize_rows(rows);
    info!(
        store = store.name(),
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "loan records loaded"
    );
    Ok(batch)
}

/// Deployment choice between generated and remote data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceKind {
    Mock { seed: u64 },
    Remote(RestStoreConfig),
}

impl DataSourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DataSourceKind::Mock { .. } => "mock",
            DataSourceKind::Remote(_) => "remote",
        }
    }

    /// Builds the store. `today` bounds the mock generator's date span.
    pub fn build(&self, today: NaiveDate) -> Result<Arc<dyn LoanRecordStore>, FetchError> {
        match self {
            DataSourceKind::Mock { seed } => Ok(Arc::new(MockRecordStore::generate(*seed, today))),
            DataSourceKind::Remote(config) => Ok(Arc::new(RestRecordStore::new(config.clone())?)),
        }
    }
}
