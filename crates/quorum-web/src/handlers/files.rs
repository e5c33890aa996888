//! Upload and serve record file attachments.
//!
//! Uploads land under `{files_dir}/{collection}/{record_id}/{filename}` and
//! the filename is appended to the record's file field, so the client can
//! build `/files/{collection}/{record_id}/{filename}` URLs.

use crate::handlers::{require_viewer, viewer};
use crate::state::SharedState;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use quorum_common::error::ApiError;
use serde_json::Value;

/// POST /api/files/{collection}/{id} — multipart upload.
pub async fn upload_files(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_viewer(&state, &headers).await?;

    let schema = state.store.collection_schema(&collection).await?;
    let field = if schema.has_field("files") {
        "files"
    } else if schema.has_field("avatar") {
        "avatar"
    } else {
        return Err(ApiError::BadRequest(format!(
            "collection {collection} does not accept file uploads"
        )));
    };

    let record = state.store.get(&collection, &id, Some(&user)).await?;
    let mut names: Vec<String> = record
        .fields
        .get(field)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    let mut pending: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("bad multipart body: {e}")))?
    {
        let Some(filename) = part.file_name().map(str::to_string) else {
            continue;
        };
        let filename = sanitize_filename(&filename)?;
        let bytes = part
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("bad multipart body: {e}")))?;
        if !names.contains(&filename) {
            names.push(filename.clone());
        }
        pending.push((filename, bytes.to_vec()));
    }
    if pending.is_empty() {
        return Err(ApiError::BadRequest("no files in request".into()));
    }

    // update first so access is checked before anything touches the disk
    let mut patch = serde_json::Map::new();
    patch.insert(field.into(), Value::Array(names.iter().cloned().map(Value::String).collect()));
    let record = state.store.update(&collection, &id, patch, Some(&user)).await?;

    let dir = state.files_dir.join(&collection).join(&id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create upload dir: {e}")))?;
    for (filename, bytes) in pending {
        tokio::fs::write(dir.join(&filename), bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("cannot store {filename}: {e}")))?;
    }

    Ok(Json(record.to_value()))
}

/// GET /files/{collection}/{id}/{filename} — serve a stored binary.
pub async fn serve_file(
    State(state): State<SharedState>,
    Path((collection, id, filename)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer(&state, &headers).await?;
    let filename = sanitize_filename(&filename)?;

    // the record check doubles as the visibility check
    let record = state.store.get(&collection, &id, viewer.as_deref()).await?;
    let known = record
        .fields
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .any(|v| v.as_str() == Some(filename.as_str()));
    if !known {
        return Err(ApiError::NotFound(format!("file {filename}")));
    }

    let path = state.files_dir.join(&collection).join(&id).join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound(format!("file {filename}")))?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}

fn sanitize_filename(name: &str) -> Result<String, ApiError> {
    let clean = name.trim();
    let ok = !clean.is_empty()
        && clean != "."
        && clean != ".."
        && !clean.contains('/')
        && !clean.contains('\\')
        && !clean.contains('\0');
    if ok {
        Ok(clean.to_string())
    } else {
        Err(ApiError::BadRequest(format!("invalid filename {name:?}")))
    }
}
