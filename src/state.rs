use crate::config::{ConfigError, ProxyConfig};
use crate::endpoints::EndpointFilter;
use crate::origin::OriginGate;
use crate::rate_limit::RateLimiter;
use crate::upstream::Upstream;
use axum::http::HeaderName;
use std::sync::Arc;

// app's shared state, built once at startup and handed to every request
pub struct AppState {
    pub origin_gate: OriginGate,
    pub rate_limiter: Arc<dyn RateLimiter>, // injected so a shared store can replace it
    pub endpoints: EndpointFilter,
    pub upstream: Upstream,
    pub max_body_bytes: usize,
    pub client_ip_header: Option<HeaderName>,
}

impl AppState {
    pub fn from_config(
        config: &ProxyConfig,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, ConfigError> {
        let upstream = Upstream::new(
            &config.upstream_url,
            config.api_key.clone(),
            config.upstream_timeout,
        )?;

        Ok(Self {
            origin_gate: OriginGate::new(
                config.allowed_origins.iter().cloned(),
                config.missing_origin_policy,
            ),
            rate_limiter,
            endpoints: EndpointFilter::new(config.path_prefix.clone()),
            upstream,
            max_body_bytes: config.max_body_bytes,
            client_ip_header: config.client_ip_header.clone(),
        })
    }
}
