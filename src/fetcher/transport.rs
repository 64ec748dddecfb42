use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use super::error::FetchError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where position reports are fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTarget {
    pub url: String,
    pub user_agent: String,
    pub headers: BTreeMap<String, String>,
}

impl SourceTarget {
    fn header_map(&self) -> Result<HeaderMap, FetchError> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Transport(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Transport(format!("header {}: {}", name, e)))?;
            map.insert(name, value);
        }
        let agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| FetchError::Transport(format!("user agent: {}", e)))?;
        map.insert(USER_AGENT, agent);
        Ok(map)
    }
}

/// Retrieves one JSON document from a URL.
pub trait Transport: Send + Sync {
    fn get_json(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<serde_json::Value, FetchError>> + Send;
}

/// Reusable HTTP connection context carrying the target's headers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(target: &SourceTarget) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .default_headers(target.header_map()?)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}
