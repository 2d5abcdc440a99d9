#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial query client.
//!
//! Builds an intersection query for a search zone, sends it through a
//! [`QueryTransport`], and normalizes the response into a
//! [`QueryOutcome`]. Expected remote failures never escape as errors:
//! they are classified into the shared [`FailureKind`] taxonomy.

pub mod decode;
pub mod http;
pub mod request;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use buffer_search_models::{
    BufferGeometry, FailureKind, Feature, LayerRef, QueryFailure, QueryOutcome,
};
use thiserror::Error;

pub use http::HttpTransport;
pub use request::QueryRequest;

/// Errors that can occur while executing a spatial query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedded `GeoJSON` payload could not be decoded.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Backend could not be reached.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// Backend answered with an error status.
    #[error("Backend returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Description of the failure.
        message: String,
    },

    /// Backend reported failure inside a well-formed envelope.
    #[error("Backend rejected the query: {message}")]
    Backend {
        /// Message supplied by the backend.
        message: String,
    },

    /// Response envelope did not have the expected shape.
    #[error("Malformed response: {message}")]
    Payload {
        /// Description of what was wrong.
        message: String,
    },
}

impl QueryError {
    /// Classifies this error into the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http(e) if e.is_decode() => FailureKind::Parse,
            Self::Http(_) | Self::Transport { .. } | Self::Status { .. } | Self::Backend { .. } => {
                FailureKind::Transport
            }
            Self::Json(_) | Self::GeoJson(_) | Self::Payload { .. } => FailureKind::Parse,
        }
    }

    /// Converts this error into a [`QueryFailure`] for the feature store.
    #[must_use]
    pub fn to_failure(&self) -> QueryFailure {
        QueryFailure::new(self.kind(), self.to_string())
    }
}

/// Sends query requests to a backend and returns the raw JSON response.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Sends `requests` as one backend call.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the backend is unreachable or the
    /// response is not JSON.
    async fn send(&self, requests: &[QueryRequest]) -> Result<serde_json::Value, QueryError>;
}

/// Executes intersection queries against a layer.
#[derive(Clone)]
pub struct SpatialQueryClient {
    transport: Arc<dyn QueryTransport>,
}

impl SpatialQueryClient {
    /// Creates a client over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self { transport }
    }

    /// Queries all features of `layer` intersecting `area`.
    ///
    /// Never fails: transport and decode problems are returned as
    /// [`QueryOutcome::Failure`], and a zero-feature result as
    /// [`QueryOutcome::Empty`].
    pub async fn query(&self, layer: &LayerRef, area: &BufferGeometry) -> QueryOutcome {
        match self.try_query(layer, area).await {
            Ok(features) => {
                log::debug!("Layer '{}' returned {} feature(s)", layer.id, features.len());
                QueryOutcome::from_features(features)
            }
            Err(e) => {
                log::warn!("Query against layer '{}' failed: {e}", layer.id);
                QueryOutcome::Failure(e.to_failure())
            }
        }
    }

    async fn try_query(
        &self,
        layer: &LayerRef,
        area: &BufferGeometry,
    ) -> Result<Vec<Feature>, QueryError> {
        let request = request::build_request(layer, area)?;
        log::debug!(
            "Querying layer '{}' on '{}' with {} condition(s)",
            layer.id,
            layer.geometry_field_name,
            request.filter.condition_list.len()
        );
        let body = self.transport.send(std::slice::from_ref(&request)).await?;
        decode::decode_response(&body)
    }
}
