//! Record repository: CRUD over schema-validated JSON documents, with the
//! visibility rules the UI relies on.
//!
//! Visibility: collections carrying a `public` field (projects, models) are
//! shown to non-collaborators only when `public = true`; a collaborator always
//! sees their records. Collections without the flag (users, profiles) are a
//! shared directory and always readable. Writes require being a collaborator
//! (or owning the user/profile record).

use crate::database::Database;
use crate::filter;
use crate::schema::{CollectionSchema, Field, FieldType};
use quorum_common::{QuorumError, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Random 15-char lowercase alphanumeric record ID.
pub fn new_record_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(15)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// A stored record: envelope plus schema-validated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub created: String,
    pub updated: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Flattened JSON object including the envelope, the shape the API serves.
    pub fn to_value(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("created".into(), Value::String(self.created.clone()));
        obj.insert("updated".into(), Value::String(self.updated.clone()));
        Value::Object(obj)
    }

    fn str_list(&self, field: &str) -> Vec<&str> {
        match self.fields.get(field) {
            Some(Value::Array(a)) => a.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOptions {
    pub filter: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub items: Vec<Record>,
}

/// Repository over one [`Database`].
#[derive(Clone)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn collection_schema(&self, collection: &str) -> Result<CollectionSchema> {
        let schema = self.db.load_schema().await?;
        Ok(schema.require(collection)?.clone())
    }

    /// List records visible to `viewer`, optionally filtered and paginated.
    pub async fn list(
        &self,
        collection: &str,
        viewer: Option<&str>,
        opts: &ListOptions,
    ) -> Result<RecordPage> {
        let col = self.collection_schema(collection).await?;
        let expr = opts
            .filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .map(filter::parse)
            .transpose()?;

        let table = Database::record_table(collection)?;
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(&format!(
            "SELECT id, data, created, updated FROM \"{table}\" ORDER BY created, id"
        ))
        .fetch_all(self.db.pool())
        .await?;

        let mut items = Vec::new();
        for (id, data, created, updated) in rows {
            let record = Record { id, created, updated, fields: serde_json::from_str(&data)? };
            if !visible_to(&col, &record, viewer) {
                continue;
            }
            if let Some(expr) = &expr {
                let flat = match record.to_value() {
                    Value::Object(m) => m,
                    _ => unreachable!(),
                };
                if !filter::eval(expr, &flat) {
                    continue;
                }
            }
            items.push(record);
        }

        let total_items = items.len() as u64;
        let page = opts.page.unwrap_or(1).max(1);
        let per_page = opts.per_page.unwrap_or(30).clamp(1, 200);
        let start = ((page - 1) as usize).saturating_mul(per_page as usize);
        let items = if start >= items.len() {
            Vec::new()
        } else {
            items[start..(start + per_page as usize).min(items.len())].to_vec()
        };

        debug!(collection, total_items, page, "list");
        Ok(RecordPage { page, per_page, total_items, items })
    }

    /// Fetch one record, enforcing visibility.
    pub async fn get(&self, collection: &str, id: &str, viewer: Option<&str>) -> Result<Record> {
        let col = self.collection_schema(collection).await?;
        let record = self.fetch(collection, id).await?;
        if !visible_to(&col, &record, viewer) {
            // don't leak existence of private records
            return Err(QuorumError::NotFound(format!("{collection}/{id}")));
        }
        Ok(record)
    }

    async fn fetch(&self, collection: &str, id: &str) -> Result<Record> {
        let table = Database::record_table(collection)?;
        let row: Option<(String, String, String, String)> = sqlx::query_as(&format!(
            "SELECT id, data, created, updated FROM \"{table}\" WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        let (id, data, created, updated) =
            row.ok_or_else(|| QuorumError::NotFound(format!("{collection}/{id}")))?;
        Ok(Record { id, created, updated, fields: serde_json::from_str(&data)? })
    }

    /// Create a record. For collections with a `collaborators` field the
    /// creating user is always added to it.
    pub async fn create(
        &self,
        collection: &str,
        mut fields: Map<String, Value>,
        owner: Option<&str>,
    ) -> Result<Record> {
        let col = self.collection_schema(collection).await?;

        if col.has_field("collaborators") {
            let owner = owner.ok_or_else(|| {
                QuorumError::Unauthorized(format!("creating {collection} requires a user"))
            })?;
            ensure_member(&mut fields, "collaborators", owner);
        }
        if collection == "profiles" {
            if let (Some(owner), None) = (owner, fields.get("user")) {
                fields.insert("user".into(), Value::String(owner.into()));
            }
            // profiles are 1:1 with users
            if let Some(user_id) = fields.get("user").and_then(Value::as_str) {
                if self.profile_exists_for(user_id).await? {
                    return Err(QuorumError::Validation(format!(
                        "user {user_id} already has a profile"
                    )));
                }
            }
        }

        validate_fields(&col, &fields, true)?;

        let now = chrono::Utc::now().to_rfc3339();
        let record = Record {
            id: new_record_id(),
            created: now.clone(),
            updated: now,
            fields,
        };
        let table = Database::record_table(collection)?;
        sqlx::query(&format!(
            "INSERT INTO \"{table}\" (id, data, created, updated) VALUES (?, ?, ?, ?)"
        ))
        .bind(&record.id)
        .bind(serde_json::to_string(&Value::Object(record.fields.clone()))?)
        .bind(&record.created)
        .bind(&record.updated)
        .execute(self.db.pool())
        .await?;
        debug!(collection, id = %record.id, "created");
        Ok(record)
    }

    async fn profile_exists_for(&self, user_id: &str) -> Result<bool> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT data FROM rec_profiles")
            .fetch_all(self.db.pool())
            .await?;
        for (data,) in rows {
            let doc: Map<String, Value> = serde_json::from_str(&data)?;
            if doc.get("user").and_then(Value::as_str) == Some(user_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Partial update: patch keys are merged into the stored document.
    /// Last write wins; there is no version check.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
        viewer: Option<&str>,
    ) -> Result<Record> {
        let col = self.collection_schema(collection).await?;
        let mut record = self.fetch(collection, id).await?;
        if !writable_by(&col, &record, viewer) {
            return Err(QuorumError::Forbidden(format!(
                "not a collaborator on {collection}/{id}"
            )));
        }
        validate_fields(&col, &patch, false)?;
        for (k, v) in patch {
            record.fields.insert(k, v);
        }
        record.updated = chrono::Utc::now().to_rfc3339();

        let table = Database::record_table(collection)?;
        sqlx::query(&format!(
            "UPDATE \"{table}\" SET data = ?, updated = ? WHERE id = ?"
        ))
        .bind(serde_json::to_string(&Value::Object(record.fields.clone()))?)
        .bind(&record.updated)
        .bind(id)
        .execute(self.db.pool())
        .await?;
        debug!(collection, id, "updated");
        Ok(record)
    }

    /// Hard delete. No soft-delete, no tombstones.
    pub async fn delete(&self, collection: &str, id: &str, viewer: Option<&str>) -> Result<()> {
        let col = self.collection_schema(collection).await?;
        let record = self.fetch(collection, id).await?;
        if !writable_by(&col, &record, viewer) {
            return Err(QuorumError::Forbidden(format!(
                "not a collaborator on {collection}/{id}"
            )));
        }
        let table = Database::record_table(collection)?;
        sqlx::query(&format!("DELETE FROM \"{table}\" WHERE id = ?"))
            .bind(id)
            .execute(self.db.pool())
            .await?;
        debug!(collection, id, "deleted");
        Ok(())
    }

    /// Expand relation fields of a record into embedded records, one level
    /// deep. Dangling IDs are skipped, not errors.
    pub async fn expand(
        &self,
        collection: &str,
        record: &Record,
        expand: &[&str],
        viewer: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let col = self.collection_schema(collection).await?;
        let mut out = Map::new();
        for name in expand {
            let Some(field) = col.field(name) else { continue };
            let FieldType::Relation { collection: target } = &field.ftype else {
                continue;
            };
            let mut expanded = Vec::new();
            for id in record.str_list(name) {
                match self.get(target, id, viewer).await {
                    Ok(rec) => expanded.push(rec.to_value()),
                    Err(QuorumError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            out.insert((*name).to_string(), Value::Array(expanded));
        }
        Ok(out)
    }
}

// ── Access rules ───────────────────────────────────────────────────────────

fn visible_to(col: &CollectionSchema, record: &Record, viewer: Option<&str>) -> bool {
    if !col.has_field("public") {
        return true;
    }
    if record.fields.get("public").and_then(Value::as_bool).unwrap_or(false) {
        return true;
    }
    match viewer {
        Some(user) => record.str_list("collaborators").contains(&user),
        None => false,
    }
}

fn writable_by(col: &CollectionSchema, record: &Record, viewer: Option<&str>) -> bool {
    let Some(user) = viewer else { return false };
    if col.name == "users" {
        return record.id == user;
    }
    if col.name == "profiles" {
        return record.str_list("user").contains(&user) || record.id == user;
    }
    if col.has_field("collaborators") {
        return record.str_list("collaborators").contains(&user);
    }
    true
}

fn ensure_member(fields: &mut Map<String, Value>, key: &str, id: &str) {
    let arr = fields
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !arr.is_array() {
        *arr = Value::Array(Vec::new());
    }
    let arr = arr.as_array_mut().unwrap();
    if !arr.iter().any(|v| v.as_str() == Some(id)) {
        arr.push(Value::String(id.to_string()));
    }
}

// ── Validation ─────────────────────────────────────────────────────────────

fn validate_fields(col: &CollectionSchema, fields: &Map<String, Value>, is_create: bool) -> Result<()> {
    for key in fields.keys() {
        if !col.has_field(key) {
            return Err(QuorumError::Validation(format!(
                "unknown field {}.{key}",
                col.name
            )));
        }
    }
    for field in &col.fields {
        match fields.get(&field.name) {
            Some(value) if !value.is_null() => validate_value(col, field, value)?,
            _ if is_create && field.required => {
                return Err(QuorumError::Validation(format!(
                    "missing required field {}.{}",
                    col.name, field.name
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_value(col: &CollectionSchema, field: &Field, value: &Value) -> Result<()> {
    let fail = |expected: &str| {
        Err(QuorumError::Validation(format!(
            "field {}.{} expects {expected}",
            col.name, field.name
        )))
    };
    match &field.ftype {
        FieldType::Text => {
            if !value.is_string() {
                return fail("a string");
            }
        }
        FieldType::Bool => {
            if !value.is_boolean() {
                return fail("a boolean");
            }
        }
        FieldType::Email => match value.as_str() {
            Some(s) if s.contains('@') => {}
            _ => return fail("an email address"),
        },
        FieldType::Url => match value.as_str() {
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => {}
            _ => return fail("an http(s) URL"),
        },
        FieldType::Json => {}
        FieldType::Select { values } => match value.as_str() {
            Some(s) if values.iter().any(|v| v == s) => {}
            _ => return fail(&format!("one of {values:?}")),
        },
        // single-relation fields (profiles.user) store one ID, the rest lists
        FieldType::Relation { .. } | FieldType::File => match value {
            Value::String(_) => {}
            Value::Array(items) if items.iter().all(Value::is_string) => {}
            _ => return fail("an ID or array of IDs"),
        },
    }
    if field.required {
        let empty = match value {
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if empty {
            return Err(QuorumError::Validation(format!(
                "required field {}.{} is empty",
                col.name, field.name
            )));
        }
    }
    Ok(())
}
