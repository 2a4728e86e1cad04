//! services/api/src/web/extract.rs
//!
//! Request extractors whose rejections render as `ApiError`, so malformed
//! requests get the same `{ "message": ... }` body as every other error.

use crate::error::ApiError;
use axum::{
    extract::{rejection::PathRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use learning_module_core::ports::PortError;
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

/// The `{id}` path segment of a module route. An id that is not a UUID names
/// no module, so it is rejected as not found.
#[derive(Debug, Clone, Copy)]
pub struct ModuleId(pub Uuid);

impl<S> FromRequestParts<S> for ModuleId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(ModuleId(id)),
            Err(PathRejection::FailedToDeserializePathParams(e)) => {
                Err(ApiError::Port(PortError::NotFound(e.body_text())))
            }
            Err(rejection) => Err(ApiError::Internal(rejection.body_text())),
        }
    }
}

/// JSON body extractor that rejects with a 400 `ApiError`.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Failed to parse JSON request body: {}", rejection.body_text());
                warn!("{}", message);
                Err(ApiError::BadRequest(message))
            }
        }
    }
}
