// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the admin API.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use palaver_config::model::GatewayConfig;
use palaver_core::{PalaverError, StorageAdapter};
use palaver_knowledge::FtsRetriever;
use palaver_usage::UsageLimiter;
use palaver_whatsapp::SessionManager;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub storage: Arc<dyn StorageAdapter>,
    pub manager: SessionManager,
    pub limiter: Arc<UsageLimiter>,
    pub retriever: Arc<FtsRetriever>,
    pub auth: AuthConfig,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Builds the full route table.
///
/// - GET /health (public)
/// - everything under /v1 (bearer token)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/agents/{id}/sessions", post(handlers::start_session))
        .route("/v1/sessions/{id}/status", get(handlers::get_session_status))
        .route(
            "/v1/sessions/{id}/reconnect",
            post(handlers::reconnect_session),
        )
        .route(
            "/v1/sessions/{id}/disconnect",
            post(handlers::disconnect_session),
        )
        .route(
            "/v1/sessions/{id}",
            axum::routing::delete(handlers::delete_session),
        )
        .route(
            "/v1/organizations/{id}/agents",
            post(handlers::create_agent),
        )
        .route(
            "/v1/organizations/{id}/contacts",
            post(handlers::create_contact),
        )
        .route(
            "/v1/organizations/{id}/knowledge",
            post(handlers::ingest_knowledge),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), PalaverError> {
    if state.auth.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is not set, every /v1 request will be rejected");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PalaverError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| PalaverError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
