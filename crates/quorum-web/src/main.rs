//! Quorum web server.
//!
//! Run with: cargo run -p quorum-web

use quorum_db::migrations::Migrator;
use quorum_db::{Database, RecordStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = quorum_config::Config::load_or_default("quorum.toml")?;

    let db = Database::open(config.database_path()).await?;
    let applied = Migrator::builtin().up(&db).await?;
    if applied > 0 {
        info!(applied, "schema migrations applied");
    }

    let state = quorum_web::state::AppState::new(RecordStore::new(db), config.files_dir());
    let app = quorum_web::router::build_router(state);

    let addr = config.bind_addr();
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
