//! Relay failures and their client-facing responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures that end a relay before any response bytes reach the client.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Debug mode could not buffer the inbound body.
    #[error("Failed to read request body: {0}")]
    BodyRead(#[source] axum::Error),

    /// The upstream request could not be constructed.
    #[error("Failed to create request: {0}")]
    Build(String),

    /// The request deadline passed before upstream answered.
    #[error("Request timed out")]
    Timeout,

    /// Connect, TLS or protocol failure talking to upstream.
    #[error("Failed to execute request: {0}")]
    Upstream(#[source] hyper_util::client::legacy::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::BodyRead(_) | RelayError::Build(_) | RelayError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::BodyRead(_) => "body_read",
            RelayError::Build(_) => "build",
            RelayError::Timeout => "timeout",
            RelayError::Upstream(_) => "transport",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, format!("{self}\n")).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response
    }
}
