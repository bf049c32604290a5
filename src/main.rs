use std::sync::Arc;

use relayboard::config::Config;
use relayboard::error::AppError;
use relayboard::notify::Notifier;
use relayboard::panel::token::TokenStore;
use relayboard::panel::PanelRegistry;
use relayboard::scheduler;
use relayboard::service::aeza::{AezaClient, AezaPoller};
use relayboard::service::lifecycle::WarningMarkers;
use relayboard::startup;
use relayboard::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let db = startup::connect_to_database(&config).await?;
    let http_client = startup::setup_reqwest_client()?;

    tracing::info!("Starting relayboard");

    let notifier = Notifier::start(http_client.clone(), config.notify_api_url.clone());
    let registry = Arc::new(PanelRegistry::new(http_client.clone(), TokenStore::new()));
    let markers = WarningMarkers::new();

    // Orders that were mid-delivery when the process last stopped pick up
    // where they left off.
    let aeza_poller = AezaPoller::new(
        db.clone(),
        AezaClient::new(
            http_client.clone(),
            config.aeza_api_url.clone(),
            config.aeza_api_key.clone(),
        ),
        notifier.clone(),
    );
    let resumed = aeza_poller.resume_pending().await?;
    if resumed > 0 {
        tracing::info!("Resumed polling for {} pending VPS order(s)", resumed);
    }

    let state = AppState::new(
        db,
        http_client,
        registry,
        notifier,
        markers,
        config.links.clone(),
    );
    let _scheduler = scheduler::start_scheduler(state).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::InternalError(format!("Signal handler failed: {}", e)))?;
    tracing::info!("Shutting down");

    Ok(())
}
