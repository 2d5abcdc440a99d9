//! HTTP transport posting query requests to the backend endpoint.

use std::time::Duration;

use async_trait::async_trait;
use buffer_search_models::config::QueryConfig;

use crate::{QueryError, QueryTransport, request::QueryRequest, retry};

/// [`QueryTransport`] that POSTs requests as JSON to a fixed endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl HttpTransport {
    /// Builds a transport from the query configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Transport`] if no endpoint is configured, or
    /// [`QueryError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &QueryConfig) -> Result<Self, QueryError> {
        if config.endpoint.trim().is_empty() {
            return Err(QueryError::Transport {
                message: "no query endpoint configured".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries,
        })
    }

    /// The URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn send(&self, requests: &[QueryRequest]) -> Result<serde_json::Value, QueryError> {
        log::debug!("POST {} ({} request(s))", self.endpoint, requests.len());
        retry::send_json(
            || self.client.post(&self.endpoint).json(requests),
            self.max_retries,
        )
        .await
    }
}
