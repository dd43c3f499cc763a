mod http;
mod jobs;
mod kaspi;
mod logbuf;
mod metrics;
mod models;
mod pricing;
mod routes;
mod security;
mod settings;
mod shape;
mod state_file;

use axum::extract::DefaultBodyLimit;
use kaspi::KaspiConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use routes::AppState;
use security::AuthState;
use std::{net::SocketAddr, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "pricebot.api", "server crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = KaspiConfig::from_env();
    if config.merchant_id.is_none() {
        info!(target = "pricebot.api", "KASPI_MERCHANT_ID not set; requests must name a merchant");
    }
    let data_dir = data_dir_from_env();
    tokio::fs::create_dir_all(&data_dir).await?;
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;

    let state = AppState::new(config, data_dir.clone(), prometheus_handle);
    let app = routes::router(state, AuthState::from_env())
        .layer(DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(
        target = "pricebot.api",
        data_dir = %data_dir.display(),
        "listening on {addr}"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

fn data_dir_from_env() -> PathBuf {
    kaspi::config::env_stripped("PRICEBOT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}
