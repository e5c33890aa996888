//! Database connection and table management.
//!
//! One SQLite table per collection (`rec_<name>`, JSON document rows) plus a
//! handful of meta tables: the persisted schema, the applied-migration log and
//! the auth credential/token stores.

use crate::schema::{validate_collection_name, Schema};
use quorum_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// Main database handle.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database file at the specified path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    quorum_common::QuorumError::Config(format!(
                        "cannot create data dir {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Open a private in-memory database. A single connection is used so every
    /// statement sees the same memory store.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the meta tables if they don't exist.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _schema (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id TEXT PRIMARY KEY,
                applied TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _credentials (
                user_id TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the persisted schema, or an empty one on a fresh database.
    pub async fn load_schema(&self) -> Result<Schema> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM _schema WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((data,)) => Ok(serde_json::from_str(&data)?),
            None => Ok(Schema::default()),
        }
    }

    pub async fn save_schema(&self, schema: &Schema) -> Result<()> {
        let data = serde_json::to_string(schema)?;
        sqlx::query(
            "INSERT INTO _schema (id, data) VALUES (1, ?)
             ON CONFLICT (id) DO UPDATE SET data = excluded.data",
        )
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) fn record_table(name: &str) -> Result<String> {
        validate_collection_name(name)?;
        Ok(format!("rec_{name}"))
    }

    pub async fn create_record_table(&self, collection: &str) -> Result<()> {
        let table = Self::record_table(collection)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            )"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn drop_record_table(&self, collection: &str) -> Result<()> {
        let table = Self::record_table(collection)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\""))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Per-collection record counts.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let schema = self.load_schema().await?;
        let mut counts = Vec::with_capacity(schema.collections.len());
        for col in &schema.collections {
            let table = Self::record_table(&col.name)?;
            let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
                .fetch_one(&self.pool)
                .await?;
            counts.push((col.name.clone(), n as u64));
        }
        Ok(DatabaseStats { records: counts })
    }
}

/// Database statistics.
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub records: Vec<(String, u64)>,
}
