//! Shared application state for the web server.

use quorum_db::auth::AuthStore;
use quorum_db::RecordStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub store: RecordStore,
    pub auth: AuthStore,
    /// Root directory for uploaded record files.
    pub files_dir: PathBuf,
}

impl AppState {
    pub fn new(store: RecordStore, files_dir: PathBuf) -> Self {
        let auth = AuthStore::new(store.clone());
        Self { store, auth, files_dir }
    }
}

pub type SharedState = Arc<AppState>;
