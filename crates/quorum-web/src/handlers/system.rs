//! Health endpoint.

use crate::state::SharedState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use quorum_common::error::ApiError;
use serde_json::Value;

/// GET /api/health
pub async fn health(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.store.database().stats().await?;
    let counts: serde_json::Map<String, Value> = stats
        .records
        .into_iter()
        .map(|(name, n)| (name, Value::from(n)))
        .collect();
    Ok(Json(serde_json::json!({
        "status": "ok",
        "records": counts,
    })))
}
