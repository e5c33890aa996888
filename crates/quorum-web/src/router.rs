//! Axum router — maps all URL paths to handlers.

use crate::handlers::{
    auth::{login, logout, register},
    files::{serve_file, upload_files},
    records::{create_record, delete_record, get_record, list_records, update_record},
    system::health,
};
use crate::state::{AppState, SharedState};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Auth
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))

        // Collection API
        .route(
            "/api/collections/{collection}/records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/collections/{collection}/records/{id}",
            get(get_record).patch(update_record).delete(delete_record),
        )

        // Files
        .route("/api/files/{collection}/{id}", post(upload_files))
        .route("/files/{collection}/{id}/{filename}", get(serve_file))

        // System
        .route("/api/health", get(health))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
