use crate::config::ProxyConfig;
use crate::error::StartupError;
use crate::handlers::{health_handler, metrics_handler, proxy_handler};
use crate::metrics::RATE_LIMIT_KEYS;
use crate::rate_limit::{InMemoryRateLimiter, RateLimiter};
use crate::state::AppState;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{Duration, Instant, interval};
use tracing::{debug, info, warn};

// Public surface: one fallback handler, so no path exists outside the whitelist
pub fn public_router(state: Arc<AppState>) -> Router {
    Router::new().fallback(proxy_handler).with_state(state)
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

// Drops expired rate limit records so idle clients do not pile up
pub async fn rate_limit_sweeper(limiter: Arc<dyn RateLimiter>, every: Duration) {
    let mut interval = interval(every);
    loop {
        interval.tick().await;
        let removed = limiter.sweep(Instant::now().into_std());
        let tracked = limiter.tracked_keys();
        RATE_LIMIT_KEYS.set(tracked as f64);
        if removed > 0 {
            debug!(removed, tracked, "swept rate limit records");
        }
    }
}

pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let limiter: Arc<dyn RateLimiter> = Arc::new(InMemoryRateLimiter::new(
        config.rate_limit,
        config.rate_window,
    ));
    let state = Arc::new(AppState::from_config(&config, Arc::clone(&limiter))?);

    tokio::spawn(rate_limit_sweeper(Arc::clone(&limiter), config.sweep_interval));

    let public = bind(config.listen_addr).await?;
    let admin = bind(config.admin_addr).await?;

    info!(
        listen_addr = %config.listen_addr,
        admin_addr = %config.admin_addr,
        upstream = %config.upstream_url,
        credential = config.api_key.fingerprint(),
        allowed_origins = ?config.allowed_origins,
        missing_origin_policy = ?config.missing_origin_policy,
        rate_limit = config.rate_limit,
        rate_window_secs = config.rate_window.as_secs(),
        upstream_timeout_ms = config.upstream_timeout.as_millis() as u64,
        "stake pool proxy listening"
    );

    let public_app = public_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let public_server = axum::serve(public, public_app).with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin, admin_router()).with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async { public_server.await },
        async { admin_server.await }
    )?;

    info!("stake pool proxy shut down");
    Ok(())
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn admin_health_reports_healthy() {
        let response = admin_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "stake-pool-proxy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn admin_metrics_is_prometheus_text() {
        crate::metrics::REQUEST_TOTAL.inc();
        let response = admin_router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("proxy_requests_total"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_records() {
        let limiter = Arc::new(InMemoryRateLimiter::new(5, Duration::from_secs(1)));
        limiter.check("idle", Instant::now().into_std());
        assert_eq!(limiter.tracked_keys(), 1);

        let handle = tokio::spawn(rate_limit_sweeper(
            Arc::clone(&limiter) as Arc<dyn RateLimiter>,
            Duration::from_secs(2),
        ));
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.abort();

        assert_eq!(limiter.tracked_keys(), 0);
    }
}
