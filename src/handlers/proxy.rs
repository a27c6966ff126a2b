use crate::error::ProxyError;
use crate::headers::{apply_cors, apply_preflight, apply_security_headers};
use crate::metrics::{REJECTIONS, REQUEST_TOTAL};
use crate::origin::OriginDecision;
use crate::rate_limit::RateDecision;
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
        header::{CONTENT_LENGTH, ORIGIN},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Single entry point of the public listener.
///
/// Origin gate, then preflight, rate limit, endpoint filter, body ceiling and
/// finally the upstream call. The first stage that says no answers.
pub async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    REQUEST_TOTAL.inc();
    let (parts, body) = request.into_parts();

    let origin = state.origin_gate.check(parts.headers.get(ORIGIN));
    if origin == OriginDecision::Rejected {
        debug!(method = %parts.method, path = parts.uri.path(), "origin rejected");
        // no CORS headers, the browser must not be able to read this
        return finish(reject(ProxyError::OriginRejected), None);
    }

    if parts.method == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if origin.cors_origin().is_some() {
            apply_preflight(response.headers_mut());
        }
        return finish(response, origin.cors_origin());
    }

    let response = match handle(&state, &parts, body).await {
        Ok(response) => response,
        Err(err) => reject(err),
    };
    finish(response, origin.cors_origin())
}

async fn handle(state: &AppState, parts: &Parts, body: Body) -> Result<Response, ProxyError> {
    let client = client_identifier(parts, state.client_ip_header.as_ref());
    if let RateDecision::Limited { retry_after } = state.rate_limiter.check(&client, Instant::now())
    {
        warn!(%client, retry_after_secs = retry_after.as_secs(), "rate limited");
        return Err(ProxyError::RateLimited { retry_after });
    }

    let Some(endpoint) = state.endpoints.check(&parts.method, parts.uri.path()) else {
        debug!(%client, method = %parts.method, path = parts.uri.path(), "endpoint not allowed");
        return Err(ProxyError::EndpointNotAllowed);
    };

    let body = read_body(body, &parts.headers, state.max_body_bytes).await?;

    let upstream = state.upstream.forward(&endpoint, body).await.map_err(|err| {
        // cause stays in the server log, the client only sees the generic text
        error!(
            endpoint = endpoint.rule.kind.as_str(),
            reason = err.reason(),
            error = ?err,
            "upstream request failed"
        );
        err
    })?;
    Ok(upstream.into_response())
}

fn reject(err: ProxyError) -> Response {
    REJECTIONS.with_label_values(&[err.reason()]).inc();
    err.into_response()
}

fn finish(mut response: Response, cors_origin: Option<&HeaderValue>) -> Response {
    let headers = response.headers_mut();
    apply_security_headers(headers);
    if let Some(origin) = cors_origin {
        apply_cors(headers, origin);
    }
    response
}

// Reads the whole body, refusing anything above `limit` bytes
async fn read_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ProxyError::PayloadTooLarge);
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(ProxyError::PayloadTooLarge),
        Err(err) => {
            debug!(error = %err, "failed to read request body");
            Err(ProxyError::InvalidBody)
        }
    }
}

/// Rate limit key: the trusted client IP header when configured, else the
/// peer address.
pub fn client_identifier(parts: &Parts, ip_header: Option<&HeaderName>) -> String {
    if let Some(name) = ip_header {
        let forwarded = parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
