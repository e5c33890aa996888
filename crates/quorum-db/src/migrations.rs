//! Declarative, reversible schema migrations.
//!
//! Each step is a named list of [`SchemaOp`]s. Applying a step mutates the
//! persisted [`Schema`] and the stored records; its `down` is the inverted op
//! list in reverse order, so step-then-inverse reproduces the prior schema
//! exactly. Destructive ops carry what they destroy, which is what makes the
//! inversion total.

use crate::database::Database;
use crate::schema::{CollectionSchema, Field, FieldType, Schema};
use quorum_common::{QuorumError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// A single reversible schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    CreateCollection { collection: CollectionSchema },
    /// Carries the full collection schema so the inverse can recreate it.
    DeleteCollection { collection: CollectionSchema },
    AddField { collection: String, field: Field },
    /// Carries the full field definition so the inverse can re-add it.
    RemoveField { collection: String, field: Field },
    RenameField { collection: String, from: String, to: String },
}

impl SchemaOp {
    /// The op that undoes this one.
    pub fn invert(&self) -> SchemaOp {
        match self {
            SchemaOp::CreateCollection { collection } => {
                SchemaOp::DeleteCollection { collection: collection.clone() }
            }
            SchemaOp::DeleteCollection { collection } => {
                SchemaOp::CreateCollection { collection: collection.clone() }
            }
            SchemaOp::AddField { collection, field } => SchemaOp::RemoveField {
                collection: collection.clone(),
                field: field.clone(),
            },
            SchemaOp::RemoveField { collection, field } => SchemaOp::AddField {
                collection: collection.clone(),
                field: field.clone(),
            },
            SchemaOp::RenameField { collection, from, to } => SchemaOp::RenameField {
                collection: collection.clone(),
                from: to.clone(),
                to: from.clone(),
            },
        }
    }

    /// Apply this op to an in-memory schema.
    pub fn apply_to_schema(&self, schema: &mut Schema) -> Result<()> {
        match self {
            SchemaOp::CreateCollection { collection } => {
                if schema.collection(&collection.name).is_some() {
                    return Err(QuorumError::Validation(format!(
                        "collection {} already exists",
                        collection.name
                    )));
                }
                schema.collections.push(collection.clone());
            }
            SchemaOp::DeleteCollection { collection } => {
                let before = schema.collections.len();
                schema.collections.retain(|c| c.name != collection.name);
                if schema.collections.len() == before {
                    return Err(QuorumError::NotFound(format!("collection {}", collection.name)));
                }
            }
            SchemaOp::AddField { collection, field } => {
                let col = schema
                    .collection_mut(collection)
                    .ok_or_else(|| QuorumError::NotFound(format!("collection {collection}")))?;
                if col.has_field(&field.name) {
                    return Err(QuorumError::Validation(format!(
                        "field {}.{} already exists",
                        collection, field.name
                    )));
                }
                col.fields.push(field.clone());
            }
            SchemaOp::RemoveField { collection, field } => {
                let col = schema
                    .collection_mut(collection)
                    .ok_or_else(|| QuorumError::NotFound(format!("collection {collection}")))?;
                let before = col.fields.len();
                col.fields.retain(|f| f.name != field.name);
                if col.fields.len() == before {
                    return Err(QuorumError::NotFound(format!(
                        "field {}.{}",
                        collection, field.name
                    )));
                }
            }
            SchemaOp::RenameField { collection, from, to } => {
                let col = schema
                    .collection_mut(collection)
                    .ok_or_else(|| QuorumError::NotFound(format!("collection {collection}")))?;
                if col.has_field(to) {
                    return Err(QuorumError::Validation(format!(
                        "field {collection}.{to} already exists"
                    )));
                }
                let f = col
                    .fields
                    .iter_mut()
                    .find(|f| f.name == *from)
                    .ok_or_else(|| QuorumError::NotFound(format!("field {collection}.{from}")))?;
                f.name = to.clone();
            }
        }
        Ok(())
    }

    /// Apply the storage side of this op: create/drop record tables and
    /// rewrite stored documents for removals and renames. Added fields need no
    /// rewrite; absent keys read as defaults.
    pub async fn apply_to_store(&self, db: &Database) -> Result<()> {
        match self {
            SchemaOp::CreateCollection { collection } => {
                db.create_record_table(&collection.name).await?;
            }
            SchemaOp::DeleteCollection { collection } => {
                db.drop_record_table(&collection.name).await?;
            }
            SchemaOp::AddField { .. } => {}
            SchemaOp::RemoveField { collection, field } => {
                rewrite_records(db, collection, |doc| {
                    doc.remove(&field.name);
                })
                .await?;
            }
            SchemaOp::RenameField { collection, from, to } => {
                rewrite_records(db, collection, |doc| {
                    if let Some(v) = doc.remove(from) {
                        doc.insert(to.clone(), v);
                    }
                })
                .await?;
            }
        }
        Ok(())
    }
}

async fn rewrite_records<F>(db: &Database, collection: &str, f: F) -> Result<()>
where
    F: Fn(&mut serde_json::Map<String, Value>),
{
    let table = Database::record_table(collection)?;
    let rows: Vec<(String, String)> =
        sqlx::query_as(&format!("SELECT id, data FROM \"{table}\""))
            .fetch_all(db.pool())
            .await?;
    for (id, data) in rows {
        let mut doc: serde_json::Map<String, Value> = serde_json::from_str(&data)?;
        f(&mut doc);
        let data = serde_json::to_string(&Value::Object(doc))?;
        sqlx::query(&format!("UPDATE \"{table}\" SET data = ? WHERE id = ?"))
            .bind(data)
            .bind(id)
            .execute(db.pool())
            .await?;
    }
    Ok(())
}

/// A named, ordered group of schema ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub id: String,
    pub ops: Vec<SchemaOp>,
}

impl Migration {
    pub fn new(id: &str, ops: Vec<SchemaOp>) -> Self {
        Self { id: id.to_string(), ops }
    }

    /// The inverse migration: inverted ops, reverse order.
    pub fn down_ops(&self) -> Vec<SchemaOp> {
        self.ops.iter().rev().map(SchemaOp::invert).collect()
    }

    pub async fn apply(&self, db: &Database, schema: &mut Schema) -> Result<()> {
        for op in &self.ops {
            op.apply_to_schema(schema)?;
            op.apply_to_store(db).await?;
        }
        Ok(())
    }

    pub async fn revert(&self, db: &Database, schema: &mut Schema) -> Result<()> {
        for op in self.down_ops() {
            op.apply_to_schema(schema)?;
            op.apply_to_store(db).await?;
        }
        Ok(())
    }
}

/// Applies pending migrations in order and records them.
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_migrations())
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    async fn applied_ids(&self, db: &Database) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM _migrations ORDER BY applied")
            .fetch_all(db.pool())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Apply all pending migrations. Returns how many steps ran.
    pub async fn up(&self, db: &Database) -> Result<usize> {
        let applied = self.applied_ids(db).await?;
        let mut schema = db.load_schema().await?;
        let mut ran = 0;
        for m in &self.migrations {
            if applied.contains(&m.id) {
                continue;
            }
            m.apply(db, &mut schema).await?;
            // persist per step so a failure later in the list loses nothing
            db.save_schema(&schema).await?;
            sqlx::query("INSERT INTO _migrations (id, applied) VALUES (?, ?)")
                .bind(&m.id)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(db.pool())
                .await?;
            info!(migration = %m.id, "applied");
            ran += 1;
        }
        Ok(ran)
    }

    /// Roll back the most recently applied migration, if any.
    pub async fn down(&self, db: &Database) -> Result<Option<String>> {
        let applied = self.applied_ids(db).await?;
        let Some(last) = self
            .migrations
            .iter()
            .rev()
            .find(|m| applied.contains(&m.id))
        else {
            return Ok(None);
        };
        let mut schema = db.load_schema().await?;
        last.revert(db, &mut schema).await?;
        sqlx::query("DELETE FROM _migrations WHERE id = ?")
            .bind(&last.id)
            .execute(db.pool())
            .await?;
        db.save_schema(&schema).await?;
        info!(migration = %last.id, "reverted");
        Ok(Some(last.id.clone()))
    }
}

// ── Built-in history ───────────────────────────────────────────────────────
//
// Mirrors how the data model actually grew: base collections first, relation
// fields and public flags bolted on afterwards, one profile field renamed and
// one dropped along the way.

fn text(name: &str) -> Field {
    Field::new(name, FieldType::Text)
}

fn json(name: &str) -> Field {
    Field::new(name, FieldType::Json)
}

fn relation(name: &str, collection: &str) -> Field {
    Field::new(name, FieldType::Relation { collection: collection.to_string() })
}

fn status_field() -> Field {
    Field::new(
        "status",
        FieldType::Select {
            values: vec!["active".into(), "inactive".into(), "complete".into(), "pending".into()],
        },
    )
}

pub fn builtin_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            "0001_create_users",
            vec![SchemaOp::CreateCollection {
                collection: CollectionSchema::new(
                    "users",
                    vec![
                        text("username").required(),
                        Field::new("email", FieldType::Email).required(),
                        text("name"),
                        Field::new("avatar", FieldType::File),
                    ],
                ),
            }],
        ),
        Migration::new(
            "0002_create_profiles",
            vec![SchemaOp::CreateCollection {
                collection: CollectionSchema::new(
                    "profiles",
                    vec![
                        relation("user", "users").required(),
                        text("institution"),
                        text("department"),
                        Field::new("email", FieldType::Email),
                        json("interests"),
                        json("publications"),
                    ],
                ),
            }],
        ),
        Migration::new(
            "0003_create_research_projects",
            vec![SchemaOp::CreateCollection {
                collection: CollectionSchema::new(
                    "research_projects",
                    vec![
                        text("title").required(),
                        text("description"),
                        relation("collaborators", "users"),
                        status_field(),
                        json("details"),
                        json("data_sources"),
                    ],
                ),
            }],
        ),
        Migration::new(
            "0004_create_models",
            vec![SchemaOp::CreateCollection {
                collection: CollectionSchema::new(
                    "models",
                    vec![
                        text("name").required(),
                        text("description"),
                        text("version"),
                        status_field(),
                        json("performance_metrics"),
                        json("hyperparameters"),
                        json("tags"),
                        relation("collaborators", "users"),
                    ],
                ),
            }],
        ),
        Migration::new(
            "0005_project_relations",
            vec![
                SchemaOp::AddField {
                    collection: "research_projects".into(),
                    field: json("tags"),
                },
                SchemaOp::AddField {
                    collection: "research_projects".into(),
                    field: relation("related_projects", "research_projects"),
                },
                SchemaOp::AddField {
                    collection: "research_projects".into(),
                    field: relation("related_models", "models"),
                },
                SchemaOp::AddField {
                    collection: "research_projects".into(),
                    field: json("related_publications"),
                },
            ],
        ),
        Migration::new(
            "0006_model_relations_and_files",
            vec![
                SchemaOp::AddField {
                    collection: "models".into(),
                    field: relation("related_projects", "research_projects"),
                },
                SchemaOp::AddField {
                    collection: "models".into(),
                    field: relation("related_models", "models"),
                },
                SchemaOp::AddField {
                    collection: "models".into(),
                    field: Field::new("files", FieldType::File),
                },
            ],
        ),
        Migration::new(
            "0007_public_flags",
            vec![
                SchemaOp::AddField {
                    collection: "research_projects".into(),
                    field: Field::new("public", FieldType::Bool),
                },
                SchemaOp::AddField {
                    collection: "models".into(),
                    field: Field::new("public", FieldType::Bool),
                },
            ],
        ),
        Migration::new(
            "0008_profile_cleanup",
            vec![
                SchemaOp::RenameField {
                    collection: "profiles".into(),
                    from: "interests".into(),
                    to: "research_interests".into(),
                },
                // duplicated the account email; dropped
                SchemaOp::RemoveField {
                    collection: "profiles".into(),
                    field: Field::new("email", FieldType::Email),
                },
            ],
        ),
    ]
}
