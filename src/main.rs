use clap::Parser;
use stake_pool_proxy::config::{Args, LogFormat, ProxyConfig};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // parse cli arguments
    let args = Args::parse();
    init_tracing(args.log_format);

    // refuse to start rather than forward without a credential
    let config = match ProxyConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = stake_pool_proxy::run(config).await {
        error!(%err, "proxy stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
