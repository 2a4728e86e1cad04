//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the module REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{AppJson, ModuleId};
use crate::web::generation::{GenerationProgressResponse, GenerationStartedResponse};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use learning_module_core::domain::{Flashcard, Module, NewModule, QuizQuestion};
use learning_module_core::ingest::{default_description, read_upload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_modules_handler,
        get_module_handler,
        create_module_handler,
        upload_module_handler,
        delete_module_handler,
        crate::web::generation::start_generation_handler,
        crate::web::generation::generation_progress_handler,
        crate::web::generation::cancel_generation_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ModuleResponse,
            CreateModuleRequest,
            ErrorBody,
            GenerationStartedResponse,
            GenerationProgressResponse,
        )
    ),
    tags(
        (name = "Learning Modules API", description = "Module management, asset generation and progress.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

/// The request payload for creating a module.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateModuleRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    original_content: String,
}

/// A module as returned by every module endpoint.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResponse {
    id: Uuid,
    title: String,
    description: String,
    original_content: String,
    summary: String,
    concepts: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    flashcards: Vec<Flashcard>,
    #[schema(value_type = Vec<Object>)]
    quiz: Vec<QuizQuestion>,
    /// One of `draft`, `processing` or `completed`.
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Module> for ModuleResponse {
    fn from(module: Module) -> Self {
        Self {
            id: module.id,
            title: module.title,
            description: module.description,
            original_content: module.original_content,
            summary: module.summary,
            concepts: module.concepts,
            flashcards: module.flashcards,
            quiz: module.quiz,
            status: module.status.as_str().to_string(),
            created_at: module.created_at,
            updated_at: module.updated_at,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "The backend is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Backend operational".to_string(),
    })
}

/// List all modules, newest first.
#[utoipa::path(
    get,
    path = "/api/modules",
    responses(
        (status = 200, description = "All modules", body = [ModuleResponse]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_modules_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModuleResponse>>, ApiError> {
    let modules = app_state.store.list().await?;
    Ok(Json(modules.into_iter().map(ModuleResponse::from).collect()))
}

/// Fetch one module.
#[utoipa::path(
    get,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "The module id")),
    responses(
        (status = 200, description = "The module", body = ModuleResponse),
        (status = 404, description = "No such module", body = ErrorBody)
    )
)]
pub async fn get_module_handler(
    State(app_state): State<Arc<AppState>>,
    ModuleId(id): ModuleId,
) -> Result<Json<ModuleResponse>, ApiError> {
    let module = app_state.store.get(id).await?;
    Ok(Json(module.into()))
}

/// Create a module in `draft`. Generation is started separately.
#[utoipa::path(
    post,
    path = "/api/modules",
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Module created", body = ModuleResponse),
        (status = 400, description = "Missing or blank title", body = ErrorBody)
    )
)]
pub async fn create_module_handler(
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateModuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let module = app_state
        .store
        .create(NewModule {
            title: payload.title,
            description: payload.description,
            original_content: payload.original_content,
        })
        .await?;
    info!(module_id = %module.id, "Module created");
    Ok((StatusCode::CREATED, Json(ModuleResponse::from(module))))
}

/// Create a module from an uploaded PDF, text or Markdown file.
///
/// Accepts a multipart/form-data request with a `file` part and optional
/// `title` and `description` parts. The title defaults to the file name.
#[utoipa::path(
    post,
    path = "/api/modules/upload",
    request_body(content_type = "multipart/form-data", description = "The lesson file to upload."),
    responses(
        (status = 201, description = "Module created", body = ModuleResponse),
        (status = 400, description = "Missing file or title, an unreadable PDF, or text that is not UTF-8", body = ErrorBody),
        (status = 415, description = "Unsupported file type", body = ErrorBody)
    )
)]
pub async fn upload_module_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut title = String::new();
    let mut description = String::new();
    let mut content: Option<(Option<String>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read file bytes: {}", e))
                })?;
                let text = read_upload(
                    app_state.extractor.as_ref(),
                    content_type.as_deref(),
                    file_name.as_deref(),
                    &data,
                )
                .await?;
                content = Some((file_name, text));
            }
            "title" | "description" => {
                let value = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                })?;
                if name == "title" {
                    title = value;
                } else {
                    description = value;
                }
            }
            _ => {}
        }
    }

    let (file_name, text) =
        content.ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
    if title.trim().is_empty() {
        if let Some(stem) = file_name
            .as_deref()
            .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
        {
            title = stem.to_string();
        }
    }
    if description.trim().is_empty() {
        description = default_description(&text);
    }

    let module = app_state
        .store
        .create(NewModule {
            title,
            description,
            original_content: text,
        })
        .await?;
    info!(module_id = %module.id, "Module created from upload");
    Ok((StatusCode::CREATED, Json(ModuleResponse::from(module))))
}

/// Delete a module, stopping any generation run for it first.
#[utoipa::path(
    delete,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "The module id")),
    responses(
        (status = 204, description = "Module deleted"),
        (status = 404, description = "No such module", body = ErrorBody)
    )
)]
pub async fn delete_module_handler(
    State(app_state): State<Arc<AppState>>,
    ModuleId(id): ModuleId,
) -> Result<StatusCode, ApiError> {
    app_state.store.get(id).await?;
    app_state.pipeline.forget(id).await;
    app_state.store.delete(id).await?;
    info!(module_id = %id, "Module deleted");
    Ok(StatusCode::NO_CONTENT)
}
