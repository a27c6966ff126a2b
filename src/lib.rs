pub mod config;
pub mod endpoints;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod metrics;
pub mod models;
pub mod origin;
pub mod rate_limit;
pub mod server;
pub mod state;
pub mod upstream;

pub use config::{Args, ProxyConfig};
pub use error::{ProxyError, StartupError};
pub use rate_limit::{InMemoryRateLimiter, RateLimiter};
pub use server::{admin_router, public_router, run};
pub use state::AppState;
