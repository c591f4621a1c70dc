use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use lending_lens::lending::{
    load_records, DataSourceKind, DateRange, FetchError, MockRecordStore, RestRecordStore,
    RestStoreConfig, MOCK_LOAN_COUNT,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

#[tokio::test]
async fn mock_store_pages_through_the_whole_sample() {
    let store = MockRecordStore::generate(7, date(2024, 6, 30));

    let batch = load_records(&store, None, 64).await.expect("mock store loads");

    assert_eq!(batch.records.len(), MOCK_LOAN_COUNT);
    assert!(batch.rejected.is_empty());
    assert!(batch
        .records
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));
    assert!(batch
        .records
        .iter()
        .all(|record| record.historical_decision.is_some()));
}

#[tokio::test]
async fn mock_store_honours_the_date_window() {
    let store = DataSourceKind::Mock { seed: 7 }
        .build(date(2024, 6, 30))
        .expect("mock store builds");
    let range = DateRange::new(date(2024, 1, 1), date(2024, 3, 31)).expect("valid range");

    let batch = load_records(store.as_ref(), Some(range), 50)
        .await
        .expect("mock store loads");

    assert!(!batch.records.is_empty());
    assert!(batch.records.len() < MOCK_LOAN_COUNT);
    assert!(batch
        .records
        .iter()
        .all(|record| range.contains(&record.created_at)));
}

#[derive(Clone, Default)]
struct FakeStore {
    queries: Arc<Mutex<Vec<String>>>,
}

fn fake_rows() -> Vec<Value> {
    vec![
        json!({"id": 1, "created_at": "2024-01-03T10:00:00+00:00", "default_score": 0.2, "refusal_score": 0.1, "decision": "accept"}),
        json!({"id": 2, "created_at": "2024-01-09T10:00:00+00:00", "default_score": 0.9, "refusal_score": 0.3, "decision": "refuse"}),
        json!({"id": 3, "created_at": "2024-02-11T10:00:00+00:00", "default_score": 0.4, "refusal_score": 0.8, "decision": "refuse"}),
        json!({"id": 4, "created_at": "2024-02-20T10:00:00+00:00", "default_score": 1.3, "refusal_score": 0.2, "decision": null}),
        json!({"id": 5, "created_at": "yesterday", "default_score": 0.1, "refusal_score": 0.1, "decision": "accept"}),
    ]
}

fn query_number(query: &str, name: &str) -> Option<usize> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
        .and_then(|value| value.parse().ok())
}

async fn loans_page(
    State(fake): State<FakeStore>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, (StatusCode, String)> {
    if headers.get("apikey").and_then(|value| value.to_str().ok()) != Some("anon-key") {
        return Err((StatusCode::UNAUTHORIZED, "missing apikey".to_string()));
    }

    let query = query.unwrap_or_default();
    fake.queries
        .lock()
        .expect("query log poisoned")
        .push(query.clone());

    let offset = query_number(&query, "offset").unwrap_or(0);
    let limit = query_number(&query, "limit").unwrap_or(usize::MAX);
    let page: Vec<Value> = fake_rows().into_iter().skip(offset).take(limit).collect();
    Ok(Json(Value::Array(page)))
}

async fn spawn_store(fake: FakeStore) -> String {
    let app = Router::new()
        .route("/rest/v1/loans", get(loans_page))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake store serves");
    });
    format!("http://{addr}")
}

fn rest_store(base_url: String, api_key: &str) -> RestRecordStore {
    RestRecordStore::new(RestStoreConfig {
        base_url,
        api_key: Some(api_key.to_string()),
        table: "loans".to_string(),
    })
    .expect("valid endpoint")
}

#[tokio::test]
async fn rest_store_walks_pages_and_normalizes_rows() {
    let fake = FakeStore::default();
    let base_url = spawn_store(fake.clone()).await;
    let store = rest_store(base_url, "anon-key");

    let batch = load_records(&store, None, 2).await.expect("rest store loads");

    assert_eq!(batch.records.len(), 4);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].id.0, "5");

    let clamped = batch
        .records
        .iter()
        .find(|record| record.id.0 == "4")
        .expect("loan 4 present");
    assert_eq!(clamped.default_score, 1.0);
    assert!(clamped.historical_decision.is_none());

    let queries = fake.queries.lock().expect("query log poisoned").clone();
    assert_eq!(queries.len(), 3);
    assert!(queries[0].contains("order=created_at.asc"));
    assert!(queries[0].contains("offset=0&limit=2"));
    assert!(queries[2].contains("offset=4&limit=2"));
}

#[tokio::test]
async fn rest_store_sends_date_bounds() {
    let fake = FakeStore::default();
    let base_url = spawn_store(fake.clone()).await;
    let store = rest_store(base_url, "anon-key");
    let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).expect("valid range");

    load_records(&store, Some(range), 100)
        .await
        .expect("rest store loads");

    let queries = fake.queries.lock().expect("query log poisoned").clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("created_at=gte.2024-01-01T00%3A00%3A00.000Z"));
    assert!(queries[0].contains("created_at=lt.2024-02-01T00%3A00%3A00.000Z"));
}

#[tokio::test]
async fn rest_store_surfaces_error_statuses() {
    let base_url = spawn_store(FakeStore::default()).await;
    let store = rest_store(base_url, "wrong-key");

    let error = load_records(&store, None, 10)
        .await
        .expect_err("unauthorized request fails");

    match error {
        FetchError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "missing apikey");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}
