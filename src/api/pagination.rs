use crate::api::transport::Transport;
use crate::error::FetchError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const NEXT_PAGE_TOKEN: &str = "nextPageToken";

/// Guards against a server that keeps handing out cursors.
const MAX_PAGES: usize = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// GET with bounded retry and exponential backoff. Only transient failures are retried.
pub async fn get_with_retry(
    transport: &dyn Transport,
    token: &str,
    path: &str,
    query: &[(String, String)],
    retry: RetryPolicy,
) -> Result<Value, FetchError> {
    let mut attempt = 1;
    loop {
        match transport.get(token, path, query).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                let delay = retry.delay_for(attempt);
                tracing::warn!(
                    path,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetch every item of a cursor-paginated collection.
///
/// Each page is requested with `pageSize` and, after the first page, the
/// `pageToken` returned by the previous one. Items are read from
/// `collection_field`; a page without that field contributes nothing. The
/// loop ends when a page carries no (or an empty) `nextPageToken`.
pub async fn fetch_all<T: DeserializeOwned>(
    transport: &dyn Transport,
    token: &str,
    path: &str,
    collection_field: &str,
    page_size: u32,
    extra_query: &[(String, String)],
    retry: RetryPolicy,
) -> Result<Vec<T>, FetchError> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;

    for page in 1..=MAX_PAGES {
        let mut query: Vec<(String, String)> = extra_query.to_vec();
        query.push(("pageSize".to_string(), page_size.to_string()));
        if let Some(cursor) = &page_token {
            query.push(("pageToken".to_string(), cursor.clone()));
        }

        let mut body = get_with_retry(transport, token, path, &query, retry).await?;

        match body.get_mut(collection_field).map(Value::take) {
            Some(Value::Null) | None => {}
            Some(collection) => {
                let page_items: Vec<T> =
                    serde_json::from_value(collection).map_err(|e| FetchError::Decode {
                        path: path.to_string(),
                        message: format!("field '{}': {}", collection_field, e),
                    })?;
                items.extend(page_items);
            }
        }

        page_token = body
            .get(NEXT_PAGE_TOKEN)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        tracing::debug!(path, page, total = items.len(), "fetched page");

        if page_token.is_none() {
            return Ok(items);
        }
    }

    tracing::warn!(path, max_pages = MAX_PAGES, "page limit reached, returning partial collection");
    Ok(items)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Method;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records every request.
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value, FetchError>>>,
        pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<Value, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            _token: &str,
            path: &str,
            query: &[(String, String)],
        ) -> Result<Value, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), query.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request to {}", path))
        }

        async fn send(
            &self,
            token: &str,
            _method: Method,
            path: &str,
            query: &[(String, String)],
            _body: Value,
        ) -> Result<Value, FetchError> {
            self.get(token, path, query).await
        }
    }

    fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({"courses": [{"id": 1}, {"id": 2}], "nextPageToken": "p2"})),
            Ok(json!({"courses": [{"id": 3}], "nextPageToken": "p3"})),
            Ok(json!({"courses": [{"id": 4}]})),
        ]);

        let items: Vec<Value> = fetch_all(
            &transport,
            "token",
            "/courses",
            "courses",
            2,
            &[],
            RetryPolicy::none(),
        )
        .await
        .unwrap();

        let ids: Vec<i64> = items.iter().map(|v| v["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(transport.request_count(), 3);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(query_value(&requests[0].1, "pageToken"), None);
        assert_eq!(query_value(&requests[0].1, "pageSize"), Some("2"));
        assert_eq!(query_value(&requests[1].1, "pageToken"), Some("p2"));
        assert_eq!(query_value(&requests[2].1, "pageToken"), Some("p3"));
    }

    #[tokio::test]
    async fn tolerates_missing_collection_field() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({"nextPageToken": "p2"})),
            Ok(json!({"students": null, "nextPageToken": ""})),
        ]);

        let items: Vec<Value> = fetch_all(
            &transport,
            "token",
            "/courses/c1/students",
            "students",
            50,
            &[],
            RetryPolicy::none(),
        )
        .await
        .unwrap();

        assert!(items.is_empty());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn forwards_extra_query_parameters() {
        let transport = ScriptedTransport::new(vec![Ok(json!({"courses": []}))]);
        let extra = vec![("studentId".to_string(), "me".to_string())];

        let _: Vec<Value> = fetch_all(
            &transport,
            "token",
            "/courses",
            "courses",
            10,
            &extra,
            RetryPolicy::none(),
        )
        .await
        .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(query_value(&requests[0].1, "studentId"), Some("me"));
    }

    #[tokio::test]
    async fn non_success_status_surfaces_path_and_status() {
        let transport = ScriptedTransport::new(vec![Err(FetchError::Status {
            path: "/courses".to_string(),
            status: 404,
            body: "not found".to_string(),
        })]);

        let err = fetch_all::<Value>(
            &transport,
            "token",
            "/courses",
            "courses",
            10,
            &[],
            RetryPolicy::new(3, Duration::ZERO),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(err.path(), "/courses");
        // 404 is not retried
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let transport = ScriptedTransport::new(vec![
            Err(FetchError::Status {
                path: "/courses".to_string(),
                status: 503,
                body: String::new(),
            }),
            Ok(json!({"courses": [{"id": 1}]})),
        ]);

        let items: Vec<Value> = fetch_all(
            &transport,
            "token",
            "/courses",
            "courses",
            10,
            &[],
            RetryPolicy::new(3, Duration::ZERO),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn backoff_doubles() {
        let retry = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(400));
    }
}
