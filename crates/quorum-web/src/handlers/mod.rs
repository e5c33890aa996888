pub mod auth;
pub mod files;
pub mod records;
pub mod system;

use crate::state::SharedState;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use quorum_common::error::ApiError;

/// Resolve the request's bearer token to a user ID. A missing header is an
/// anonymous request; a present-but-invalid token is an error.
pub async fn viewer(state: &SharedState, headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed Authorization header".into()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".into()))?;
    let user = state.auth.verify(token).await?;
    Ok(Some(user.id))
}

/// Like [`viewer`], but the request must be authenticated.
pub async fn require_viewer(state: &SharedState, headers: &HeaderMap) -> Result<String, ApiError> {
    viewer(state, headers)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("authentication required".into()))
}
