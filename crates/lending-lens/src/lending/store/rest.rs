use super::{FetchError, LoanRecordStore, PageRequest};
use crate::lending::normalizer::StoreRow;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{header, Method, Request, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

const SELECT_COLUMNS: &str = "id,created_at,default_score,refusal_score,decision";

/// Connection details of a PostgREST-compatible table endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub table: String,
}

/// Reads loan rows over the store's REST interface (`/rest/v1/<table>`).
///
/// `https` endpoints are verified against the Mozilla root set; plain `http`
/// is kept for local stacks.
pub struct RestRecordStore {
    config: RestStoreConfig,
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl RestRecordStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, FetchError> {
        let uri: Uri = config
            .base_url
            .parse()
            .map_err(|_| FetchError::InvalidEndpoint(config.base_url.clone()))?;
        let scheme_ok = matches!(uri.scheme_str(), Some("http" | "https"));
        if !scheme_ok || uri.authority().is_none() {
            return Err(FetchError::InvalidEndpoint(format!(
                "{} (expected an http:// or https:// URL with a host)",
                config.base_url
            )));
        }

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|err| FetchError::Tls(err.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RestStoreConfig {
        &self.config
    }

    /// Query URI for one page: non-null scores, ascending `created_at`, the
    /// optional day-aligned date bounds (`gte` start, `lt` the day after the
    /// end), then `offset`/`limit`.
    pub fn page_uri(&self, request: &PageRequest) -> Result<Uri, FetchError> {
        let mut query = vec![
            format!("select={}", urlencoding::encode(SELECT_COLUMNS)),
            "default_score=not.is.null".to_string(),
            "refusal_score=not.is.null".to_string(),
            "order=created_at.asc".to_string(),
        ];
        if let Some(range) = request.range {
            query.push(format!("created_at=gte.{}", encode_instant(range.start_of_day())));
            if let Some(upper) = range.end_exclusive() {
                query.push(format!("created_at=lt.{}", encode_instant(upper)));
            }
        }
        query.push(format!("offset={}", request.offset));
        query.push(format!("limit={}", request.limit));

        let raw = format!(
            "{}/rest/v1/{}?{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.table),
            query.join("&")
        );
        raw.parse().map_err(|_| FetchError::InvalidEndpoint(raw))
    }
}

fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Millis, true)).into_owned()
}

#[async_trait]
impl LoanRecordStore for RestRecordStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<StoreRow>, FetchError> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(self.page_uri(request)?)
            .header(header::ACCEPT, "application/json");
        if let Some(key) = &self.config.api_key {
            builder = builder
                .header("apikey", key.as_str())
                .header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let http_request = builder
            .body(Empty::<Bytes>::new())
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::calendar::DateRange;
    use chrono::NaiveDate;

    fn store() -> RestRecordStore {
        RestRecordStore::new(RestStoreConfig {
            base_url: "http://store.local:54321/".to_string(),
            api_key: Some("anon".to_string()),
            table: "loans".to_string(),
        })
        .expect("valid endpoint")
    }

    #[test]
    fn page_uri_carries_filters_and_pagination() {
        let uri = store()
            .page_uri(&PageRequest {
                offset: 2000,
                limit: 1000,
                range: None,
            })
            .expect("uri builds");

        assert_eq!(uri.path(), "/rest/v1/loans");
        assert_eq!(
            uri.query(),
            Some(
                "select=id%2Ccreated_at%2Cdefault_score%2Crefusal_score%2Cdecision\
&default_score=not.is.null&refusal_score=not.is.null&order=created_at.asc\
&offset=2000&limit=1000"
            )
        );
    }

    #[test]
    fn page_uri_bounds_dates_by_whole_days() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            NaiveDate::from_ymd_opt(2024, 3, 31).expect("date"),
        )
        .expect("ordered range");

        let uri = store()
            .page_uri(&PageRequest {
                offset: 0,
                limit: 1000,
                range: Some(range),
            })
            .expect("uri builds");
        let query = uri.query().expect("query present");

        assert!(query.contains("created_at=gte.2024-01-01T00%3A00%3A00.000Z"));
        assert!(query.contains("created_at=lt.2024-04-01T00%3A00%3A00.000Z"));
        assert!(!query.contains("created_at=lte."));
    }

    #[test]
    fn hosted_https_endpoints_are_accepted() {
        let store = RestRecordStore::new(RestStoreConfig {
            base_url: "https://abcd.supabase.co".to_string(),
            api_key: Some("anon".to_string()),
            table: "loans".to_string(),
        })
        .expect("https endpoint builds");

        let uri = store
            .page_uri(&PageRequest {
                offset: 0,
                limit: 10,
                range: None,
            })
            .expect("uri builds");
        assert_eq!(uri.scheme_str(), Some("https"));
        assert_eq!(uri.host(), Some("abcd.supabase.co"));
    }

    #[test]
    fn endpoints_without_web_scheme_are_rejected() {
        for base_url in ["ftp://store.example", "store.example", "not a url"] {
            let result = RestRecordStore::new(RestStoreConfig {
                base_url: base_url.to_string(),
                api_key: None,
                table: "loans".to_string(),
            });
            assert!(
                matches!(result, Err(FetchError::InvalidEndpoint(_))),
                "{base_url} accepted"
            );
        }
    }
}
