//! Registration, login and logout.

use crate::state::SharedState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use quorum_common::error::ApiError;
use quorum_db::auth::RegisterRequest;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identity: String,
    pub password: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.auth.register(&req).await?;
    Ok(Json(user.to_value()))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.login(&req.identity, &req.password).await?;
    Ok(Json(serde_json::json!({
        "token": session.token,
        "user": session.user.to_value(),
    })))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            state.auth.logout(token).await?;
        }
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
