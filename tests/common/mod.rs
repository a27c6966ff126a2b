#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use clap::Parser;
use stake_pool_proxy::{AppState, Args, InMemoryRateLimiter, ProxyConfig, public_router};
use std::net::SocketAddr;
use std::sync::Arc;

pub const ALLOWED_ORIGIN: &str = "https://pool.example";
pub const API_KEY: &str = "mainnetTestProjectKey";
pub const POOL_ID: &str = "pool1m83drqwlugdt9jn7jkz8hx3pne53acfkd539d9cj8yr92dr4k9y";

pub fn test_config(upstream_url: &str, extra: &[&str]) -> ProxyConfig {
    let mut argv = vec![
        "stake-pool-proxy",
        "--project-id",
        API_KEY,
        "--upstream-url",
        upstream_url,
        "--allowed-origins",
        "https://pool.example,https://www.pool.example",
        "--missing-origin-policy",
        "reject",
        "--rate-limit",
        "30",
        "--rate-window",
        "60",
        "--upstream-timeout-ms",
        "2000",
        "--max-body-bytes",
        "1024",
        "--path-prefix",
        "",
    ];
    argv.extend_from_slice(extra);
    ProxyConfig::from_args(Args::try_parse_from(argv).unwrap()).unwrap()
}

pub fn test_app(config: &ProxyConfig) -> Router {
    let limiter = Arc::new(InMemoryRateLimiter::new(
        config.rate_limit,
        config.rate_window,
    ));
    let state = AppState::from_config(config, limiter).unwrap();
    public_router(Arc::new(state))
}

pub fn request(method: Method, uri: &str, origin: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(origin) = origin {
        builder = builder.header("origin", origin);
    }
    let mut request = builder.body(body).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40000))));
    request
}

pub fn get(uri: &str) -> Request<Body> {
    request(Method::GET, uri, Some(ALLOWED_ORIGIN), Body::empty())
}

pub async fn read(response: axum::response::Response) -> (StatusCode, HeaderMap, Vec<u8>) {
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}
