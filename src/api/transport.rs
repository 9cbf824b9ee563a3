use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

pub type Query = [(String, String)];

/// Raw JSON access to a REST API. The bearer token is passed on every call so
/// a transport never holds credentials of its own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, token: &str, path: &str, query: &Query) -> Result<Value, FetchError>;

    async fn send(
        &self,
        token: &str,
        method: Method,
        path: &str,
        query: &Query,
        body: Value,
    ) -> Result<Value, FetchError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Transport {
                path: base_url.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(token: &str, path: &str) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            FetchError::Transport {
                path: path.to_string(),
                message: "access token contains invalid header characters".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("classroom-dashboard"));
        Ok(headers)
    }

    async fn execute(
        &self,
        token: &str,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<Value>,
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(Self::build_headers(token, path)?)
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        tracing::debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(|e| request_error(path, e))?;
        let status = response.status();

        // Get the response text for both error and success cases
        let response_text = response.text().await.map_err(|e| request_error(path, e))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: response_text.chars().take(500).collect(),
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_str(&response_text).map_err(|e| FetchError::Decode {
            path: path.to_string(),
            message: format!(
                "{}. Response body (first 500 chars): {}",
                e,
                response_text.chars().take(500).collect::<String>()
            ),
        })
    }
}

fn request_error(path: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            path: path.to_string(),
        }
    } else {
        FetchError::Transport {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, token: &str, path: &str, query: &Query) -> Result<Value, FetchError> {
        self.execute(token, Method::GET, path, query, None).await
    }

    async fn send(
        &self,
        token: &str,
        method: Method,
        path: &str,
        query: &Query,
        body: Value,
    ) -> Result<Value, FetchError> {
        self.execute(token, method, path, query, Some(body)).await
    }
}
