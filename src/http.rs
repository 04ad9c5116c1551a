//! HTTP control surface for the dashboard.
//!
//! Serves session status, reads and replaces the stored credentials, and
//! accepts `connect` / `disconnect` commands. All routes are plain JSON
//! request/response.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::{CredentialStore, Credentials, DbError};
use crate::error::SessionError;
use crate::session::{SessionManager, StatusReport};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub store: Arc<dyn CredentialStore>,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors returned to HTTP callers as `{ "error": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No settings stored")]
    NoSettings,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] DbError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoSettings => StatusCode::CONFLICT,
            Self::Session(SessionError::InvalidSettings { .. }) => StatusCode::BAD_REQUEST,
            Self::Session(SessionError::Interrupted(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Session(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Store(e) => {
                error!(error = %e, "Credential store failure");
                json!({ "error": "Internal Server Error" })
            }
            Self::Session(e) => json!({ "error": e.to_string(), "code": e.error_code() }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.manager.status_report())
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let body = match state.store.get().await? {
        Some(credentials) => json!(credentials),
        None => json!({}),
    };
    Ok(Json(body))
}

async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(credentials) = payload?;

    let missing = credentials.missing_fields();
    if !missing.is_empty() {
        return Err(SessionError::InvalidSettings { missing }.into());
    }

    let credentials = state.store.upsert(credentials).await?;
    info!(host = %credentials.host, "Settings stored");

    let report = state.manager.initialize(&credentials).await?;
    Ok(Json(json!({
        "message": "Settings updated successfully",
        "status": report,
    })))
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    #[serde(default)]
    command: Option<String>,
}

async fn run_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let command = request
        .command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Command is required".to_string()))?;

    match command {
        "connect" => {
            let credentials = state.store.get().await?.ok_or(ApiError::NoSettings)?;
            let report = state.manager.initialize(&credentials).await?;
            Ok(Json(json!({
                "message": "Connected successfully",
                "status": report,
            })))
        }
        "disconnect" => {
            state.manager.disconnect().await;
            Ok(Json(json!({ "message": "Disconnected successfully" })))
        }
        other => {
            warn!(command = %other, "Rejected control command");
            Err(ApiError::BadRequest("Invalid command".to_string()))
        }
    }
}

/// Build the control router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/settings", get(get_settings).post(update_settings))
        .route("/command", post(run_command))
        .with_state(state)
}

/// Serve the control surface on `listener` until `shutdown` is cancelled.
pub async fn run_http_server(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP control surface listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
