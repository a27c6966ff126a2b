use crate::config::ConfigError;
use crate::models::ErrorBody;
use crate::rate_limit::retry_after_secs;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Per-request failures. The `Display` text is the exact message sent to
/// the client, so no variant may format its inner cause.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Origin not allowed")]
    OriginRejected,
    #[error("Too many requests")]
    RateLimited { retry_after: Duration },
    #[error("Endpoint not allowed")]
    EndpointNotAllowed,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Invalid request body")]
    InvalidBody,
    // same client text as any transport failure, only the log and metrics tell them apart
    #[error("Upstream request failed")]
    UpstreamTimeout(#[source] reqwest::Error),
    #[error("Upstream request failed")]
    Upstream(#[source] reqwest::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::OriginRejected | ProxyError::EndpointNotAllowed => StatusCode::FORBIDDEN,
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::InvalidBody => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamTimeout(_) | ProxyError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // metrics label
    pub fn reason(&self) -> &'static str {
        match self {
            ProxyError::OriginRejected => "origin",
            ProxyError::RateLimited { .. } => "rate_limited",
            ProxyError::EndpointNotAllowed => "endpoint",
            ProxyError::PayloadTooLarge => "payload_too_large",
            ProxyError::InvalidBody => "invalid_body",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::Upstream(_) => "upstream_error",
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout(err)
        } else {
            ProxyError::Upstream(err)
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ProxyError::RateLimited { retry_after } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Reasons the proxy cannot start or keep serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: ProxyError) -> (StatusCode, String, Option<HeaderValue>) {
        let response = err.into_response();
        let status = response.status();
        let retry = response.headers().get(RETRY_AFTER).cloned();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), retry)
    }

    #[tokio::test]
    async fn endpoint_rejection_has_exact_body() {
        let (status, body, _) = body_of(ProxyError::EndpointNotAllowed).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, r#"{"error":"Endpoint not allowed"}"#);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let (status, body, retry) = body_of(ProxyError::RateLimited {
            retry_after: Duration::from_millis(41_500),
        })
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, r#"{"error":"Too many requests"}"#);
        assert_eq!(retry.unwrap(), "42");
    }

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(ProxyError::OriginRejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ProxyError::InvalidBody.status(), StatusCode::BAD_REQUEST);
    }
}
