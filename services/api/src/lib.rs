//! services/api/src/lib.rs
//!
//! The API service as a library, so the binaries and the integration tests
//! build the same router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use web::{rest::ApiDoc, state::AppState};

/// Upload size limit for lesson files.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Builds the full application router: REST endpoints, the learner WebSocket
/// and the Swagger UI.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(web::health_handler))
        .route(
            "/api/modules",
            get(web::list_modules_handler).post(web::create_module_handler),
        )
        .route("/api/modules/upload", post(web::upload_module_handler))
        .route(
            "/api/modules/{id}",
            get(web::get_module_handler).delete(web::delete_module_handler),
        )
        .route("/api/modules/{id}/generate", post(web::start_generation_handler))
        .route(
            "/api/modules/{id}/generation",
            get(web::generation_progress_handler).delete(web::cancel_generation_handler),
        )
        .route("/api/learn/ws", get(web::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
