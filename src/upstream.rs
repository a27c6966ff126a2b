use crate::config::ApiKey;
use crate::endpoints::MatchedEndpoint;
use crate::error::ProxyError;
use crate::metrics::{UPSTREAM_LATENCY, UPSTREAM_RESPONSES};
use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

// header the chain-data API reads the project key from
pub const PROJECT_ID_HEADER: &str = "project_id";
// media type the submit endpoint expects for a raw signed transaction
pub const TX_CONTENT_TYPE: &str = "application/cbor";

/// Upstream reply, relayed to the browser as is.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let content_type = self
            .content_type
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        (self.status, [(CONTENT_TYPE, content_type)], Body::from(self.body)).into_response()
    }
}

// Client for the chain-data API, holds the only copy of the credential
#[derive(Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl Upstream {
    pub fn new(base_url: &Url, api_key: ApiKey, timeout: Duration) -> Result<Self, reqwest::Error> {
        // direct connection only, the key must not transit an ambient HTTP(S)_PROXY
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self::with_client(client, base_url.as_str(), api_key))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends an already whitelisted request upstream. Only the method, the
    /// body and the server-held credential are carried over; inbound headers
    /// never are.
    pub async fn forward(
        &self,
        endpoint: &MatchedEndpoint,
        body: Bytes,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = self.url_for(&endpoint.upstream_path);
        let mut request = self
            .client
            .request(endpoint.rule.method.as_method(), &url)
            .header(PROJECT_ID_HEADER, self.api_key.header_value().clone());

        if endpoint.rule.is_submission() {
            request = request.header(CONTENT_TYPE, TX_CONTENT_TYPE).body(body);
        } else if !body.is_empty() {
            request = request.body(body);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await?;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());
        UPSTREAM_RESPONSES
            .with_label_values(&[status.as_str()])
            .inc();

        debug!(
            endpoint = endpoint.rule.kind.as_str(),
            status = status.as_u16(),
            bytes = body.len(),
            "upstream responded"
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
