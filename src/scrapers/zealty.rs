use crate::config::{FetchSettings, FROM_TAG};
use crate::error::FetchError;
use crate::models::{ListingRecord, COLUMNS};
use crate::scrapers::browser::SessionHandle;
use crate::scrapers::traits::CellFetcher;
use crate::scrapers::types::QuerySpec;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{debug, warn};

/// Headers the map widget sends. Requests without a plausible browser
/// fingerprint may be rejected.
const BROWSER_HEADERS: [(&str, &str); 12] = [
    ("accept", "*/*"),
    ("accept-language", "en-CA,en-GB;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("dnt", "1"),
    ("origin", "https://www.zealty.ca"),
    ("referer", "https://www.zealty.ca/"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "cross-site"),
    ("sec-ch-ua", "\"Chromium\";v=\"142\", \"Google Chrome\";v=\"142\", \"Not_A Brand\";v=\"99\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Linux\""),
    (
        "user-agent",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
    ),
];

fn browser_headers() -> HeaderMap {
    BROWSER_HEADERS
        .iter()
        .map(|&(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    rows: Option<Vec<ListingRecord>>,
}

/// Parse a backend body. A missing or null `rows` field means zero matches.
pub fn parse_rows(body: &str) -> Result<Vec<ListingRecord>, FetchError> {
    let response: FetchResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let rows = response.rows.unwrap_or_default();

    if let Some(odd) = rows.iter().find(|r| r.width() != COLUMNS.len()) {
        debug!(
            "Row width {} differs from the {}-column contract; keeping as-is",
            odd.width(),
            COLUMNS.len()
        );
    }
    Ok(rows)
}

/// Posts cell queries to the map backend over an authenticated session.
#[derive(Clone, Debug)]
pub struct FetchExecutor {
    session: SessionHandle,
    settings: FetchSettings,
}

impl FetchExecutor {
    pub fn new(session: SessionHandle, settings: FetchSettings) -> Self {
        Self { session, settings }
    }

    /// Run one query, retrying transient failures per the retry policy.
    pub async fn execute(&self, spec: &QuerySpec, token: &str) -> Result<Vec<ListingRecord>, FetchError> {
        let policy = self.settings.retry;
        let mut attempt = 1;
        loop {
            match self.attempt(spec, token).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_retryable() && attempt < policy.max_attempts() => {
                    let delay = policy.backoff.delay(attempt);
                    warn!(
                        "  Attempt {}/{} failed ({}); retrying in {:?}",
                        attempt,
                        policy.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, spec: &QuerySpec, token: &str) -> Result<Vec<ListingRecord>, FetchError> {
        debug!("  Posting query for '{}'...", spec.category_flag());

        let form = [
            ("sql", spec.sql.as_str()),
            ("sold", spec.category_flag()),
            ("from", FROM_TAG),
            ("s", token),
        ];

        let response = self
            .session
            .client()
            .post(&self.settings.endpoint)
            .headers(browser_headers())
            .timeout(self.settings.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        debug!("  Response status: {}", status);
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        parse_rows(&body)
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.settings.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl CellFetcher for FetchExecutor {
    async fn fetch(&self, spec: &QuerySpec, token: &str) -> Result<Vec<ListingRecord>, FetchError> {
        self.execute(spec, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, Category};
    use crate::scrapers::query;
    use crate::scrapers::types::{Backoff, RetryPolicy};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(server: &MockServer, retry: RetryPolicy, timeout: Duration) -> FetchExecutor {
        FetchExecutor::new(
            SessionHandle::from_client(reqwest::Client::new()),
            FetchSettings {
                endpoint: format!("{}/svcFetchDB.php", server.uri()),
                timeout,
                retry,
            },
        )
    }

    fn quick_retries(n: u32) -> RetryPolicy {
        RetryPolicy {
            max_cell_retries: n,
            backoff: Backoff::Fixed(Duration::from_millis(5)),
        }
    }

    fn spec(category: Category) -> QuerySpec {
        query::build(&BoundingBox::METRO_VANCOUVER, category, None)
    }

    fn row(id: &str) -> serde_json::Value {
        let mut fields = vec![json!(id), json!(49.2), json!(-123.1)];
        fields.resize(17, json!(null));
        json!(fields)
    }

    #[tokio::test]
    async fn posts_signed_form_with_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/svcFetchDB.php"))
            .and(header("origin", "https://www.zealty.ca"))
            .and(header("sec-fetch-mode", "cors"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("sold=active"))
            .and(body_string_contains("from=dmap"))
            .and(body_string_contains("s=abc123"))
            .and(body_string_contains("sql=SELECT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [row("R1"), row("R2")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = executor(&server, RetryPolicy::none(), Duration::from_secs(5))
            .execute(&spec(Category::ActiveForSale), "abc123")
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id().unwrap().as_str(), "R2");
        assert_eq!(rows[0].width(), 17);
    }

    #[tokio::test]
    async fn missing_or_null_rows_is_zero_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("sold=sold"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("sold=expired"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": null})))
            .mount(&server)
            .await;

        let exec = executor(&server, RetryPolicy::none(), Duration::from_secs(5));
        assert!(exec.execute(&spec(Category::Sold), "t").await.unwrap().is_empty());
        assert!(exec.execute(&spec(Category::Expired), "t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = executor(&server, quick_retries(2), Duration::from_secs(5))
            .execute(&spec(Category::Sold), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn recovers_when_a_retry_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": [row("R9")]})))
            .expect(1)
            .mount(&server)
            .await;

        let rows = executor(&server, quick_retries(2), Duration::from_secs(5))
            .execute(&spec(Category::Expired), "t")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn client_errors_and_bad_bodies_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("sold=active"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("sold=sold"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let exec = executor(&server, quick_retries(3), Duration::from_secs(5));
        let err = exec.execute(&spec(Category::ActiveForSale), "t").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403 }));
        let err = exec.execute(&spec(Category::Sold), "t").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"rows": [row("R1")]}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = executor(&server, RetryPolicy::none(), Duration::from_millis(100))
            .execute(&spec(Category::ActiveForSale), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[test]
    fn parse_rows_rejects_non_object_bodies() {
        assert!(matches!(parse_rows(r#""blocked""#), Err(FetchError::Parse(_))));
        assert!(matches!(parse_rows(r#"{"rows": "none"}"#), Err(FetchError::Parse(_))));
        assert!(matches!(parse_rows(""), Err(FetchError::Parse(_))));
        assert_eq!(parse_rows(r#"{"rows": []}"#).unwrap().len(), 0);
    }
}
