//! The generic collection CRUD endpoints.

use crate::handlers::{require_viewer, viewer};
use crate::state::SharedState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use quorum_common::error::ApiError;
use quorum_db::ListOptions;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, Default)]
pub struct GetQuery {
    /// Comma-separated relation field names to embed, e.g. `collaborators`.
    pub expand: Option<String>,
}

/// GET /api/collections/{collection}/records
pub async fn list_records(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer(&state, &headers).await?;
    let opts = ListOptions {
        filter: query.filter,
        page: query.page,
        per_page: query.per_page,
    };
    let page = state.store.list(&collection, viewer.as_deref(), &opts).await?;
    Ok(Json(serde_json::json!({
        "page": page.page,
        "per_page": page.per_page,
        "total_items": page.total_items,
        "items": page.items.iter().map(|r| r.to_value()).collect::<Vec<_>>(),
    })))
}

/// GET /api/collections/{collection}/records/{id}
pub async fn get_record(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, String)>,
    Query(query): Query<GetQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer(&state, &headers).await?;
    let record = state.store.get(&collection, &id, viewer.as_deref()).await?;

    let mut body = match record.to_value() {
        Value::Object(m) => m,
        _ => unreachable!(),
    };
    if let Some(expand) = &query.expand {
        let names: Vec<&str> = expand.split(',').map(str::trim).collect();
        let expanded = state
            .store
            .expand(&collection, &record, &names, viewer.as_deref())
            .await?;
        body.insert("expand".into(), Value::Object(expanded));
    }
    Ok(Json(Value::Object(body)))
}

/// POST /api/collections/{collection}/records
pub async fn create_record(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(fields): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_viewer(&state, &headers).await?;
    let record = state.store.create(&collection, fields, Some(&user)).await?;
    Ok(Json(record.to_value()))
}

/// PATCH /api/collections/{collection}/records/{id}
pub async fn update_record(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(patch): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_viewer(&state, &headers).await?;
    let record = state.store.update(&collection, &id, patch, Some(&user)).await?;
    Ok(Json(record.to_value()))
}

/// DELETE /api/collections/{collection}/records/{id}
pub async fn delete_record(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_viewer(&state, &headers).await?;
    state.store.delete(&collection, &id, Some(&user)).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
