use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use ad_warden::api::start_api_server;
use ad_warden::config::Config;
use ad_warden::engine::{ModeController, RulesetRegistry};
use ad_warden::init::{on_start, setup_logging};
use ad_warden::router::RequestRouter;
use ad_warden::stats::{BlockEvent, CounterAggregator};
use ad_warden::store::{SqliteStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args().nth(1).unwrap_or("config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting ad-warden...");

    if !std::path::Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    // 3. Open State Store
    let backend = SqliteStore::open(&config.storage.path)?;
    let store = Store::new(
        Arc::new(backend),
        Duration::from_millis(config.storage.op_timeout_ms),
    );

    // 4. Establish Snapshot (first run / warm start). Do not serve anything
    //    if the store is unreachable.
    let first_run = on_start(&store).await?;
    if first_run {
        info!("Welcome to ad-warden! Filtering is enabled.");
    }

    // 5. Rule Engine Adapter
    let (registry, mut match_rx) = RulesetRegistry::new(&[config.engine.ruleset_id.as_str()]);
    let rules = Arc::new(registry);

    // 6. Mode Controller; reconcile the ruleset with the persisted flag so a
    //    warm start with filtering disabled deactivates it.
    let mode = Arc::new(ModeController::new(
        store.clone(),
        rules.clone(),
        &config.engine,
    ));
    mode.sync_ruleset().await?;

    // 7. Counter Aggregator
    let aggregator = Arc::new(CounterAggregator::new(store.clone()));

    // 8. Match-Event Pump: only the configured ruleset's matches are counted.
    let ruleset_id = config.engine.ruleset_id.clone();
    let aggregator_for_pump = aggregator.clone();
    tokio::spawn(async move {
        while let Some(matched) = match_rx.recv().await {
            if matched.ruleset_id != ruleset_id {
                continue;
            }
            if let Err(e) = aggregator_for_pump
                .record_block(BlockEvent { url: matched.url })
                .await
            {
                error!("Failed to record block event: {}", e);
            }
        }
    });

    // 9. Mode-Change Fan-out to page contexts.
    let mut changes = mode.subscribe();
    tokio::spawn(async move {
        while let Ok(change) = changes.recv().await {
            info!("Broadcasting mode change: enabled={}", change.enabled);
        }
    });

    // 10. Start API Server
    let router = RequestRouter::new(aggregator, mode);
    let host = config.host.clone();
    let port = config.port;
    let server = tokio::spawn(async move {
        start_api_server(router, &host, port).await;
    });

    // 11. Graceful Shutdown
    tokio::select! {
        _ = server => {},
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
