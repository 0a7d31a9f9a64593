// src/main.rs
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use weigher_sorter::api;
use weigher_sorter::config::{AppConfig, LogConfig};

const DEFAULT_LOG_FILTER: &str = "warn,weigher_sorter=info";

#[tokio::main]
async fn main() -> ExitCode {
    let env_result = dotenvy::dotenv();
    init_tracing(&LogConfig::from_env());

    if let Err(err) = env_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    info!("⚖️ Weigher/sorter service starting...");
    match api::start_api_server(app_config.api, app_config.solver).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("❌ API server terminated with an error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if log.json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
