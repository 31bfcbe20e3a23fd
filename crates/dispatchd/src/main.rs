//! # Dispatch-Platform Runtime
//!
//! The main entry point: reads configuration, connects the stores, spawns
//! the outbox worker pool, and serves the HTTP gateway.
//!
//! ## Subsystems
//!
//! 1. Validation & Sanitization
//! 2. Postgres Storage
//! 3. Wallet Engine
//! 4. Shipment Workflow
//! 5. Conversation Engine
//! 6. Outbox & Workers (+ circuit breakers)
//! 7. HTTP Gateway (webhooks, auth, health, debug)

mod services;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use dispatch_telemetry::{init_telemetry, TelemetryConfig};
use dp_03_wallet::WalletService;
use dp_04_shipment::ShipmentService;
use dp_05_conversation::adapters::PgSessionStore;
use dp_05_conversation::ConversationEngine;
use dp_06_outbox::{BotSender, OutboxWorker, WebChatSender, WorkerConfig};
use dp_07_gateway::{build_router, AppConfig, AppState};

use crate::services::ProductionServices;

/// Workers draining the outbox concurrently.
const WORKER_POOL_SIZE: usize = 2;

/// Timeout for outbound platform calls.
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(&TelemetryConfig::from_env())?;

    info!("===========================================");
    info!("  Dispatch-Platform Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let config = AppConfig::from_env().context("configuration")?;

    // Stores.
    let pool = dp_02_storage::connect(&config.database_url)
        .await
        .context("postgres")?;
    dp_02_storage::init_schema(&pool).await.context("schema")?;
    let redis_client = redis::Client::open(config.redis_url.as_str()).context("redis url")?;
    let redis = redis::aio::ConnectionManager::new(redis_client)
        .await
        .context("redis")?;
    info!("stores connected");

    // Business services.
    let shipments = ShipmentService::new(pool.clone(), config.outbox_max_retries);
    let wallets = WalletService::new(pool.clone());
    let services = Arc::new(ProductionServices::new(
        pool.clone(),
        shipments,
        wallets,
        config.admin_chat_id.clone(),
        config.outbox_max_retries,
    ));
    let engine = Arc::new(ConversationEngine::new(
        Arc::new(PgSessionStore::new(pool.clone())),
        services,
    ));

    // Outbound senders and the worker pool.
    let http = reqwest::Client::builder()
        .timeout(OUTBOUND_TIMEOUT)
        .build()
        .context("http client")?;
    let bot = Arc::new(BotSender::new(
        http.clone(),
        config.bot_base_url(),
        Some(redis.clone()),
    ));
    let webchat = Arc::new(WebChatSender::new(
        http.clone(),
        config.webchat_base_url.clone(),
        "webchat-user".to_string(),
        config.webchat_interactive,
    ));
    let webchat_admin = Arc::new(WebChatSender::new(
        http.clone(),
        config.webchat_base_url.clone(),
        "webchat-admin".to_string(),
        config.webchat_interactive,
    ));
    let worker_config = WorkerConfig {
        batch_size: config.worker_prefetch.max(1) * 20,
        max_backoff_secs: config.outbox_max_backoff_seconds,
        ..WorkerConfig::default()
    };
    for n in 0..WORKER_POOL_SIZE {
        let worker = Arc::new(OutboxWorker::new(
            pool.clone(),
            worker_config.clone(),
            bot.clone(),
            webchat.clone(),
            Some(webchat_admin.clone()),
        ));
        tokio::spawn(worker.run());
        info!(worker = n, "outbox worker spawned");
    }

    // HTTP gateway.
    let probe_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("probe client")?;
    let state = AppState {
        pool,
        redis,
        engine,
        config: Arc::new(config.clone()),
        http: probe_http,
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down gracefully...");
        })
        .await
        .context("server")?;

    Ok(())
}
