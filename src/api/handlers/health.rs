use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub upload_dir: String,
    pub output_dir: String,
    pub model: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let upload_dir = dir_status(&state.config.upload_dir).await;
    let output_dir = dir_status(&state.config.output_root).await;

    let status = if upload_dir == "ready" && output_dir == "ready" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        upload_dir: upload_dir.to_string(),
        output_dir: output_dir.to_string(),
        model: state.config.model_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn dir_status(path: &Path) -> &'static str {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => "ready",
        _ => "missing",
    }
}
