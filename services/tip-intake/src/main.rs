// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Anonymous Tip Intake Service
//!
//! ## Configuration
//!
//! Loaded from `.env`, an optional `tip-intake.toml` and `TIP_*` environment
//! variables (nested keys use `__`):
//!
//! - `TIP_ENCRYPTION_KEY`: AES-256 key, 64 hex characters (required)
//! - `OPENAI_API_KEY`: enables the moderation classifier
//! - `TIP_BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `TIP_RATE_LIMIT__MAX_PER_WINDOW`: Submissions per window (default: 10)
//! - `TIP_RATE_LIMIT__WINDOW_SECS`: Window length (default: 3600)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tip_intake::{
    config::Config,
    handlers::{router, AppState},
    identity::{IdentityError, IdentityManager},
    metrics::Metrics,
    moderation::{classifier::OpenAiModerationClient, Classifier},
    service::TipService,
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        max_per_window = config.rate_limit.max_per_window,
        window_secs = config.rate_limit.window_secs,
        max_length = config.moderation.max_length,
        "Starting tip intake service"
    );

    let key = config
        .identity
        .encryption_key
        .as_ref()
        .ok_or(IdentityError::MissingKey)?;
    let identity = IdentityManager::from_key_material(key.expose())?;

    let classifier: Option<Arc<dyn Classifier>> =
        match OpenAiModerationClient::from_config(&config.moderation.classifier)? {
            Some(client) => Some(Arc::new(client)),
            None => {
                warn!("No classifier configured, moderation uses PII redaction only");
                None
            }
        };

    let store = Arc::new(MemoryStore::new());
    let metrics = Arc::new(Metrics::new()?);
    let service = TipService::new(
        &config,
        identity,
        store.clone(),
        store,
        classifier,
        metrics,
    )?;

    let active_bans = service.list_bans().await?;
    info!(active_bans = active_bans.len(), "Ban table loaded");

    let state = Arc::new(AppState {
        service,
        config: config.clone(),
    });

    // Spawn sweep task
    let sweep_state = state.clone();
    let sweep_interval = config.rate_limit.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_state.service.sweep();
        }
    });

    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
