//! services/api/src/web/generation.rs
//!
//! Handlers that start, observe and cancel asset generation runs.

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::ModuleId;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use learning_module_core::pipeline::RunOutcome;
use learning_module_core::ports::Stage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Returned when a run has been accepted.
#[derive(Serialize, ToSchema)]
pub struct GenerationStartedResponse {
    pub run_id: Uuid,
    pub module_id: Uuid,
    pub total_stages: usize,
}

/// The state of a module's generation: `running` while a run is active,
/// `failed` after the most recent run failed.
#[derive(Serialize, ToSchema)]
pub struct GenerationProgressResponse {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,
    pub stage: String,
    pub total_stages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Start generating a module's assets.
///
/// A `completed` module is regenerated; its current assets stay visible until
/// the new set is committed. A run already active for the module is superseded.
#[utoipa::path(
    post,
    path = "/api/modules/{id}/generate",
    params(("id" = Uuid, Path, description = "The module id")),
    responses(
        (status = 202, description = "Run started", body = GenerationStartedResponse),
        (status = 404, description = "No such module", body = ErrorBody),
        (status = 409, description = "The module cannot be generated from its current status", body = ErrorBody)
    )
)]
pub async fn start_generation_handler(
    State(app_state): State<Arc<AppState>>,
    ModuleId(id): ModuleId,
) -> Result<impl IntoResponse, ApiError> {
    let handle = app_state.pipeline.regenerate(id).await?;
    let response = GenerationStartedResponse {
        run_id: handle.run_id,
        module_id: handle.module_id,
        total_stages: Stage::ORDER.len(),
    };

    tokio::spawn(async move {
        let (module_id, run_id) = (handle.module_id, handle.run_id);
        match handle.outcome().await {
            RunOutcome::Succeeded(_) => info!(%module_id, %run_id, "Module assets ready"),
            RunOutcome::Failed(failure) => {
                warn!(%module_id, %run_id, stage = %failure.stage, "Generation failed: {}", failure.message)
            }
            RunOutcome::Cancelled => info!(%module_id, %run_id, "Generation cancelled"),
            RunOutcome::Aborted(reason) => warn!(%module_id, %run_id, "Generation task aborted: {}", reason),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Report the module's active run, or the failure of its most recent run.
#[utoipa::path(
    get,
    path = "/api/modules/{id}/generation",
    params(("id" = Uuid, Path, description = "The module id")),
    responses(
        (status = 200, description = "Run progress or the last failure", body = GenerationProgressResponse),
        (status = 404, description = "No such module or no run to report", body = ErrorBody)
    )
)]
pub async fn generation_progress_handler(
    State(app_state): State<Arc<AppState>>,
    ModuleId(id): ModuleId,
) -> Result<Json<GenerationProgressResponse>, ApiError> {
    app_state.store.get(id).await?;

    if let Some(progress) = app_state.pipeline.progress(id).await {
        return Ok(Json(GenerationProgressResponse {
            state: "running".to_string(),
            run_id: Some(progress.run_id),
            stage_index: Some(progress.stage_index),
            stage: progress.stage.to_string(),
            total_stages: progress.total_stages,
            percent: Some(progress.percent()),
            message: None,
        }));
    }
    if let Some(failure) = app_state.pipeline.last_failure(id).await {
        return Ok(Json(GenerationProgressResponse {
            state: "failed".to_string(),
            run_id: None,
            stage_index: Some(failure.stage.index()),
            stage: failure.stage.to_string(),
            total_stages: Stage::ORDER.len(),
            percent: None,
            message: Some(failure.message),
        }));
    }
    Err(ApiError::NoActiveRun(id))
}

/// Cancel the module's active run and restore its previous status.
#[utoipa::path(
    delete,
    path = "/api/modules/{id}/generation",
    params(("id" = Uuid, Path, description = "The module id")),
    responses(
        (status = 204, description = "Run cancelled"),
        (status = 404, description = "No such module or no active run", body = ErrorBody)
    )
)]
pub async fn cancel_generation_handler(
    State(app_state): State<Arc<AppState>>,
    ModuleId(id): ModuleId,
) -> Result<StatusCode, ApiError> {
    app_state.store.get(id).await?;
    if app_state.pipeline.cancel_module(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NoActiveRun(id))
    }
}
