use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("proxy_requests_total", "Total number of public requests")
            .expect("proxy_requests_total registers once");
    pub static ref REJECTIONS: CounterVec = register_counter_vec!(
        "proxy_rejections_total",
        "Requests answered by the proxy itself, by reason",
        &["reason"]
    )
    .expect("proxy_rejections_total registers once");
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "proxy_upstream_latency_seconds",
        "Upstream round trip in seconds"
    )
    .expect("proxy_upstream_latency_seconds registers once");
    pub static ref UPSTREAM_RESPONSES: CounterVec = register_counter_vec!(
        "proxy_upstream_responses_total",
        "Upstream responses by status code",
        &["status"]
    )
    .expect("proxy_upstream_responses_total registers once");
    pub static ref RATE_LIMIT_KEYS: Gauge = register_gauge!(
        "proxy_rate_limit_keys",
        "Client identifiers currently tracked by the rate limiter"
    )
    .expect("proxy_rate_limit_keys registers once");
}

// text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
