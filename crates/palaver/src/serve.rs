// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `palaver serve` command implementation.
//!
//! Opens storage, builds the LLM gateway, the knowledge retriever and the
//! message pipeline, then hands every WhatsApp connection to the session
//! manager. Sessions persisted as `CONNECTED` are restored in the
//! background. On SIGINT/SIGTERM live connections are closed (not logged
//! out) and the WAL is checkpointed.

use std::sync::Arc;
use std::time::Duration;

use palaver_agent::MessagePipeline;
use palaver_config::model::PalaverConfig;
use palaver_core::{HealthStatus, KnowledgeRetriever, PalaverError, PluginAdapter, StorageAdapter};
use palaver_gateway::{AuthConfig, GatewayState};
use palaver_knowledge::{FtsRetriever, KnowledgeStore};
use palaver_llm::LlmGateway;
use palaver_storage::SqliteStorage;
use palaver_usage::UsageLimiter;
use palaver_whatsapp::{BridgeConnector, SessionManager};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::shutdown;

/// Runs until a shutdown signal arrives or the gateway dies.
pub async fn run_serve(config: PalaverConfig) -> Result<(), PalaverError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, version = env!("CARGO_PKG_VERSION"), "starting palaver");

    let sqlite = SqliteStorage::new(config.storage.clone());
    sqlite.initialize().await?;
    let knowledge_store = Arc::new(KnowledgeStore::new(
        sqlite.database()?.connection().clone(),
    ));
    let storage: Arc<dyn StorageAdapter> = Arc::new(sqlite);
    info!(path = %config.storage.database_path, "storage ready");

    let llm = Arc::new(LlmGateway::from_config(&config.providers)?);
    if !llm.has_active_provider() {
        warn!("no active LLM provider configured, inbound messages will be recorded but not answered");
    }

    let retriever = Arc::new(FtsRetriever::new(knowledge_store, config.knowledge.clone()));
    let limiter = Arc::new(UsageLimiter::new(
        Arc::clone(&storage),
        config.pipeline.default_daily_message_limit,
    ));
    let pipeline = Arc::new(MessagePipeline::new(
        Arc::clone(&storage),
        Arc::clone(&llm),
        config
            .knowledge
            .enabled
            .then(|| retriever.clone() as Arc<dyn KnowledgeRetriever>),
        Arc::clone(&limiter),
        config.pipeline.clone(),
    ));

    let connector = Arc::new(BridgeConnector::new(config.whatsapp.clone())?);
    match connector.health_check().await {
        Ok(HealthStatus::Healthy) => info!(url = %config.whatsapp.bridge_url, "whatsapp bridge reachable"),
        Ok(status) => warn!(?status, "whatsapp bridge not healthy, sessions will retry on demand"),
        Err(e) => warn!(error = %e, "whatsapp bridge health check failed"),
    }

    let manager = SessionManager::new(
        Arc::clone(&storage),
        connector,
        pipeline,
        Arc::clone(&limiter),
        config.whatsapp.auth_dir.clone(),
    );

    let cancel = shutdown::install_signal_handler();

    let restore = spawn_restore(
        manager.clone(),
        Duration::from_secs(config.whatsapp.restore_delay_secs),
    );

    let mut gateway: Option<JoinHandle<Result<(), PalaverError>>> = if config.gateway.enabled {
        let state = GatewayState {
            storage: Arc::clone(&storage),
            manager: manager.clone(),
            limiter,
            retriever,
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            start_time: std::time::Instant::now(),
        };
        let gateway_config = config.gateway.clone();
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            palaver_gateway::start_server(&gateway_config, state, gateway_cancel).await
        }))
    } else {
        info!("admin gateway disabled");
        None
    };

    let gateway_exit = async {
        match gateway.as_mut() {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };
    let gateway_finished = tokio::select! {
        _ = cancel.cancelled() => false,
        exit = gateway_exit => {
            match exit {
                Ok(Ok(())) => warn!("gateway exited before shutdown was requested"),
                Ok(Err(e)) => error!(error = %e, "gateway failed"),
                Err(e) => error!(error = %e, "gateway task panicked"),
            }
            true
        }
    };
    cancel.cancel();
    restore.abort();

    if let Some(handle) = gateway.filter(|_| !gateway_finished) {
        if let Ok(Err(e)) = handle.await {
            error!(error = %e, "gateway stopped with error");
        }
    }

    manager.shutdown().await;
    if let Err(e) = storage.shutdown().await {
        error!(error = %e, "storage shutdown failed");
    }

    info!("palaver serve shutdown complete");
    Ok(())
}

fn spawn_restore(manager: SessionManager, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        match manager.restore_connected_sessions(delay).await {
            Ok(restored) if restored > 0 => info!(restored, "sessions restored"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "session restore failed"),
        }
    })
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("palaver={log_level},tower_http={log_level},warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
