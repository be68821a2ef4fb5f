//! HTTP surface for the environment server.
//!
//! Provides endpoints for:
//! - Device binding (`/init`)
//! - Screen capture (`/screenshot`)
//! - Action execution (`/step`)
//! - Task lifecycle (`/task/init`, `/task/eval`, `/task/tear_down`)
//! - Task catalog (`/task/goal`, `/task/list`, `/task/metadata`)
//! - Suite selection (`/suite_family/switch`)
//! - Health check (`/health`)

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use mobench_core::Action;
use mobench_tasks::LifecycleError;

use crate::service::{self, ServiceError};
use crate::state::AppState;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/init", post(init_device))
        .route("/screenshot", get(screenshot))
        .route("/step", post(step))
        .route("/task/init", post(task_init))
        .route("/task/eval", post(task_eval))
        .route("/task/tear_down", post(task_tear_down))
        .route("/task/goal", get(task_goal))
        .route("/task/list", get(task_list))
        .route("/task/metadata", get(task_metadata))
        .route("/suite_family/switch", post(switch_suite_family))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::UnknownTask(_) | ServiceError::UnknownDevice(_) => StatusCode::NOT_FOUND,
            ServiceError::NoActiveTask(_) | ServiceError::DeviceBusy { .. } => StatusCode::CONFLICT,
            ServiceError::Lifecycle(LifecycleError::Controller(_)) => StatusCode::BAD_GATEWAY,
            ServiceError::Lifecycle(_) => StatusCode::CONFLICT,
            ServiceError::Controller(_) => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            error!(error = %self, "Device-side failure");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct DeviceRequest {
    req_device: String,
}

#[derive(Debug, Deserialize)]
struct TaskInitRequest {
    task_name: String,
    req_device: String,
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    req_device: String,
    action: Action,
}

#[derive(Debug, Deserialize)]
struct TaskNameQuery {
    task_name: String,
}

#[derive(Debug, Deserialize)]
struct SwitchQuery {
    target_family: String,
}

async fn init_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    service::init_device(&state, &req.req_device).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn screenshot(
    State(state): State<Arc<AppState>>,
    Query(req): Query<DeviceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let png = service::screenshot(&state, &req.req_device).await?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(Json(serde_json::json!({ "screenshot": b64 })))
}

async fn step(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StepRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let observation = service::step(&state, &req.req_device, &req.action).await?;
    Ok(Json(observation))
}

async fn task_init(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskInitRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let initialized = service::task_init(&state, &req.req_device, &req.task_name).await?;
    Ok(Json(serde_json::json!({ "initialized": initialized })))
}

async fn task_eval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = service::task_eval(&state, &req.req_device).await?;
    Ok(Json(result))
}

async fn task_tear_down(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    service::task_tear_down(&state, &req.req_device).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn task_goal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskNameQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let goal = service::task_goal(&state, &query.task_name).await?;
    Ok(Json(serde_json::json!({ "goal": goal })))
}

async fn task_list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(service::task_list(&state).await)
}

async fn task_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskNameQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let descriptor = service::task_metadata(&state, &query.task_name).await?;
    Ok(Json(descriptor))
}

async fn switch_suite_family(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SwitchQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = service::switch_suite_family(&state, &query.target_family).await?;
    Ok(Json(outcome))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ok = service::health(&state).await;
    Json(serde_json::json!({ "ok": ok }))
}
