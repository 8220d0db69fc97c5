// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the admin REST API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use palaver_core::PalaverError;
use palaver_core::types::{Agent, Contact, ResourceKind, Session, SessionKind};
use palaver_whatsapp::SessionState;

use crate::server::GatewayState;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Set on limit rejections so clients can render upgrade messaging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
}

/// A handler failure with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.into(),
                resource: None,
                limit: None,
                current: None,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PalaverError> for ApiError {
    fn from(err: PalaverError) -> Self {
        let status = match &err {
            PalaverError::NotFound { .. } => StatusCode::NOT_FOUND,
            PalaverError::LimitExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            PalaverError::Channel { .. } => StatusCode::BAD_GATEWAY,
            PalaverError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PalaverError::NoActiveProvider => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "admin request failed");
        }
        let (resource, limit, current) = match &err {
            PalaverError::LimitExceeded {
                resource,
                limit,
                current,
            } => (Some(*resource), Some(*limit), Some(*current)),
            _ => (None, None, None),
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                resource,
                limit,
                current,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub live_sessions: usize,
}

/// GET /health
///
/// Unauthenticated liveness probe.
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        live_sessions: state.manager.live_count().await,
    })
}

/// Request body for POST /v1/agents/{id}/sessions.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub kind: SessionKind,
}

/// POST /v1/agents/{id}/sessions
pub async fn start_session(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
    Json(body): Json<StartSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.manager.start_session(&agent_id, body.kind).await?;
    tracing::info!(session_id = %session.id, agent_id = %agent_id, kind = %session.kind, "session started");
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /v1/sessions/{id}/status
pub async fn get_session_status(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionState>> {
    Ok(Json(state.manager.get_session_status(&session_id).await?))
}

/// POST /v1/sessions/{id}/reconnect
pub async fn reconnect_session(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionState>> {
    state.manager.reconnect_session(&session_id).await?;
    Ok(Json(state.manager.get_session_status(&session_id).await?))
}

/// POST /v1/sessions/{id}/disconnect
pub async fn disconnect_session(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionState>> {
    state.manager.disconnect_session(&session_id).await?;
    Ok(Json(state.manager.get_session_status(&session_id).await?))
}

/// DELETE /v1/sessions/{id}
///
/// Idempotent: deleting an unknown session still answers 204.
pub async fn delete_session(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.delete_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for POST /v1/organizations/{id}/agents.
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub prompt: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// POST /v1/organizations/{id}/agents
pub async fn create_agent(
    State(state): State<GatewayState>,
    Path(organization_id): Path<String>,
    Json(body): Json<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("agent name must not be empty"));
    }
    state
        .limiter
        .check_limit(&organization_id, ResourceKind::Agents)
        .await?;

    let agent = Agent {
        id: uuid::Uuid::new_v4().to_string(),
        organization_id,
        name: body.name.trim().to_string(),
        prompt: body.prompt,
        active: body.active,
        created_at: now(),
    };
    state.storage.create_agent(&agent).await?;
    tracing::info!(agent_id = %agent.id, organization_id = %agent.organization_id, "agent created");
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Request body for POST /v1/organizations/{id}/contacts.
#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub tag: String,
}

/// POST /v1/organizations/{id}/contacts
pub async fn create_contact(
    State(state): State<GatewayState>,
    Path(organization_id): Path<String>,
    Json(body): Json<CreateContactRequest>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let phone: String = body.phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if phone.is_empty() {
        return Err(ApiError::bad_request("phone must contain digits"));
    }
    state
        .limiter
        .check_limit(&organization_id, ResourceKind::Contacts)
        .await?;

    let contact = Contact {
        id: uuid::Uuid::new_v4().to_string(),
        organization_id,
        phone,
        name: body.name,
        tag: body.tag,
        created_at: now(),
    };
    state.storage.create_contact(&contact).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// Request body for POST /v1/organizations/{id}/knowledge.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub source: String,
    pub text: String,
}

/// Response body for POST /v1/organizations/{id}/knowledge.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub source: String,
    pub chunks: usize,
}

/// POST /v1/organizations/{id}/knowledge
///
/// Re-ingesting a source replaces its previous chunks.
pub async fn ingest_knowledge(
    State(state): State<GatewayState>,
    Path(organization_id): Path<String>,
    Json(body): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    if body.source.trim().is_empty() {
        return Err(ApiError::bad_request("source must not be empty"));
    }
    if state
        .storage
        .get_organization(&organization_id)
        .await?
        .is_none()
    {
        return Err(PalaverError::not_found("organization", organization_id).into());
    }

    let chunks = state
        .retriever
        .ingest(&organization_id, body.source.trim(), &body.text)
        .await?;
    tracing::info!(organization_id = %organization_id, source = %body.source, chunks, "knowledge ingested");
    Ok(Json(IngestResponse {
        source: body.source.trim().to_string(),
        chunks,
    }))
}
