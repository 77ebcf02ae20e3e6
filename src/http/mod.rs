//! Inbound HTTP control surface.
//!
//! Agents and operator tooling reach the task store through these routes.
//! Every `/api/*` route requires the shared secret in the `X-Citadel-Key`
//! header; `/health` is open.

pub mod routes;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::fanout::FanoutEngine;
use crate::persistence::Repositories;
use crate::preflight::PreflightEngine;
use crate::tasks::TaskService;
use crate::{AppError, Result};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "X-Citadel-Key";

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    /// Expected `X-Citadel-Key` value; empty rejects every request.
    pub api_key: String,
    /// Repositories.
    pub repos: Repositories,
    /// Task store service.
    pub tasks: TaskService,
    /// Comment and document fan-out.
    pub fanout: FanoutEngine,
    /// Preflight rule engine.
    pub preflight: PreflightEngine,
}

impl AppState {
    /// Build the handler state over `repos`.
    #[must_use]
    pub fn new(repos: Repositories, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            tasks: TaskService::new(repos.clone()),
            fanout: FanoutEngine::new(repos.clone()),
            preflight: PreflightEngine::new(repos.clone()),
            repos,
        }
    }
}

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            other => {
                error!(err = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::Validation(rejection.body_text()))
    }
}

/// Handler result type.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    match presented {
        Some(key) if !state.api_key.is_empty() && key == state.api_key => {
            next.run(request).await
        }
        _ => {
            warn!(path = %request.uri().path(), "rejected request without a valid api key");
            ApiError(AppError::Unauthorized("Unauthorized".into())).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/heartbeat", post(routes::heartbeat))
        .route("/my-tasks", get(routes::my_tasks))
        .route("/my-notifications", get(routes::my_notifications))
        .route("/documents", get(routes::documents))
        .route("/task", post(routes::create_task))
        .route("/task/status", post(routes::update_task_status))
        .route("/comment", post(routes::post_comment))
        .route("/document", post(routes::post_document))
        .route("/decision", post(routes::request_decision))
        .route("/decision/resolve", post(routes::resolve_decision))
        .route("/decision/comment", post(routes::comment_on_decision))
        .route("/decisions", get(routes::list_decisions))
        .route("/standing-order", post(routes::create_standing_order))
        .route("/standing-orders", get(routes::standing_orders))
        .route("/activity", post(routes::log_activity))
        .route("/preflight", post(routes::preflight))
        .route("/standup", get(routes::standup))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
}

/// Serve the control surface on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http control surface listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server error: {err}")))?;
    info!("http control surface shut down");
    Ok(())
}
