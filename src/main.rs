use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::{info, warn};

mod config;
mod handlers;
mod history;
mod llm;
mod prompt;
mod settings;
mod state;
mod storage;
mod styles;
mod utils;

use config::Config;
use handlers::build_router;
use history::HistoryStore;
use state::AppState;
use storage::JsonFileStore;
use styles::StyleCatalog;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::load();
    let _guards = init_logging(&config.log_level);

    info!("Starting FLUX Image Studio service");
    if config.fal_key.trim().is_empty() {
        warn!("FAL_KEY is not set; generation and credits requests will fail upstream");
    }
    if config.openai_api_key.trim().is_empty() {
        warn!("OPENAI_API_KEY is not set; prompt assist requests will fail upstream");
    }

    let store = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    let history = HistoryStore::load(store.clone(), config.history_cap);
    let styles = StyleCatalog::load(store);
    info!(
        "Loaded {} history records and {} custom styles from {}",
        history.len(),
        styles.custom_presets().len(),
        config.data_dir.display()
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, history, styles);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}
