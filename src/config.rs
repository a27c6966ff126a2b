use axum::http::{HeaderName, HeaderValue};
use clap::{Parser, ValueEnum};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_UPSTREAM_URL: &str = "https://cardano-mainnet.blockfrost.io/api/v0";

// What to do with requests that carry no Origin header (curl, server-side tooling)
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingOriginPolicy {
    /// Answer 403, same as a foreign origin.
    #[default]
    Reject,
    /// Let the request through without any CORS headers.
    Allow,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "stake-pool-proxy")]
#[command(about = "Edge proxy forwarding whitelisted chain queries for the stake pool site")]
#[command(args_override_self = true)]
pub struct Args {
    // Address to bind both listeners on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    // Public port browsers talk to
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Port for /health and /metrics, never exposed to browsers
    #[arg(long, env = "ADMIN_PORT", default_value_t = 9090)]
    pub admin_port: u16,

    // Upstream API credential, sent as the `project_id` header
    #[arg(long, env = "BLOCKFROST_PROJECT_ID", hide_env_values = true)]
    pub project_id: Option<String>,

    // Base URL of the chain-data API
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    // Comma-separated origins allowed to call the proxy
    // Example: "https://pool.example,https://www.pool.example"
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "MISSING_ORIGIN_POLICY", value_enum, default_value_t = MissingOriginPolicy::Reject)]
    pub missing_origin_policy: MissingOriginPolicy,

    // Rate limit max requests per window, 0 disables limiting
    #[arg(long, env = "RATE_LIMIT", default_value_t = 30)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // How often expired rate limit records are dropped, in seconds
    #[arg(long, env = "SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Upstream request timeout in milliseconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 10_000)]
    pub upstream_timeout_ms: u64,

    // Largest accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 32 * 1024)]
    pub max_body_bytes: usize,

    // Header carrying the real client IP when running behind a trusted edge
    #[arg(long, env = "CLIENT_IP_HEADER")]
    pub client_ip_header: Option<String>,

    // Mount prefix stripped before endpoint matching, e.g. "/api"
    #[arg(long, env = "PATH_PREFIX", default_value = "")]
    pub path_prefix: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("upstream credential is missing; set BLOCKFROST_PROJECT_ID")]
    MissingCredential,
    #[error("upstream credential is not a valid header value")]
    InvalidCredential,
    #[error("at least one allowed origin is required")]
    NoAllowedOrigins,
    #[error("invalid origin {0:?}: expected scheme://host[:port] without a path")]
    InvalidOrigin(String),
    #[error("invalid upstream url {0:?}: expected http(s)://host[/path] without query or fragment")]
    InvalidUpstreamUrl(String),
    #[error("invalid path prefix {0:?}: must start with '/' and not end with '/'")]
    InvalidPathPrefix(String),
    #[error("invalid client ip header {0:?}")]
    InvalidHeaderName(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("failed to build upstream http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Upstream credential. Never printed, only its fingerprint is logged.
#[derive(Clone)]
pub struct ApiKey {
    header: HeaderValue,
    fingerprint: String,
}

impl ApiKey {
    pub fn new(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        let mut header = HeaderValue::from_str(raw).map_err(|_| ConfigError::InvalidCredential)?;
        header.set_sensitive(true);

        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Ok(Self {
            header,
            fingerprint: digest[..12].to_string(),
        })
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }

    // short sha256 prefix, enough to tell keys apart in logs
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(sha256:{})", self.fingerprint)
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub api_key: ApiKey,
    pub upstream_url: Url,
    pub allowed_origins: Vec<String>,
    pub missing_origin_policy: MissingOriginPolicy,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub sweep_interval: Duration,
    pub upstream_timeout: Duration,
    pub max_body_bytes: usize,
    pub client_ip_header: Option<HeaderName>,
    pub path_prefix: String,
    pub log_format: LogFormat,
}

impl ProxyConfig {
    /// Validates CLI/env input. Startup is refused on any error, in
    /// particular when the upstream credential is absent.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let api_key = match args.project_id.as_deref() {
            Some(raw) => ApiKey::new(raw)?,
            None => return Err(ConfigError::MissingCredential),
        };

        let allowed_origins: Vec<String> = args
            .allowed_origins
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if allowed_origins.is_empty() {
            return Err(ConfigError::NoAllowedOrigins);
        }
        if let Some(bad) = allowed_origins.iter().find(|o| !is_valid_origin(o)) {
            return Err(ConfigError::InvalidOrigin(bad.clone()));
        }

        let upstream_url = parse_upstream_url(args.upstream_url.trim())
            .ok_or_else(|| ConfigError::InvalidUpstreamUrl(args.upstream_url.clone()))?;

        let path_prefix = args.path_prefix.trim().to_string();
        if !path_prefix.is_empty() && (!path_prefix.starts_with('/') || path_prefix.ends_with('/'))
        {
            return Err(ConfigError::InvalidPathPrefix(path_prefix));
        }

        let client_ip_header = match args.client_ip_header.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => Some(
                HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidHeaderName(name.to_string()))?,
            ),
        };

        if args.rate_window == 0 {
            return Err(ConfigError::Zero("rate_window"));
        }
        if args.sweep_interval == 0 {
            return Err(ConfigError::Zero("sweep_interval"));
        }
        if args.upstream_timeout_ms == 0 {
            return Err(ConfigError::Zero("upstream_timeout_ms"));
        }
        if args.max_body_bytes == 0 {
            return Err(ConfigError::Zero("max_body_bytes"));
        }

        Ok(Self {
            listen_addr: SocketAddr::new(args.host, args.port),
            admin_addr: SocketAddr::new(args.host, args.admin_port),
            api_key,
            upstream_url,
            allowed_origins,
            missing_origin_policy: args.missing_origin_policy,
            rate_limit: args.rate_limit,
            rate_window: Duration::from_secs(args.rate_window),
            sweep_interval: Duration::from_secs(args.sweep_interval),
            upstream_timeout: Duration::from_millis(args.upstream_timeout_ms),
            max_body_bytes: args.max_body_bytes,
            client_ip_header,
            path_prefix,
            log_format: args.log_format,
        })
    }
}

// paths are appended to the base as text, a query or fragment would swallow them
fn parse_upstream_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    let usable = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.query().is_none()
        && url.fragment().is_none();
    usable.then_some(url)
}

// browsers send the serialized origin: scheme://host[:port], lowercase, no path
fn is_valid_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.origin().ascii_serialization() == origin
        }
        Err(_) => false,
    }
}
