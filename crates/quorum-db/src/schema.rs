//! Collection schema model.
//!
//! The schema is data, not code: migrations build it up step by step and the
//! record store validates writes against it. The current schema is persisted
//! alongside the records so a reopened database knows its own shape.

use quorum_common::{QuorumError, Result};
use serde::{Deserialize, Serialize};

pub const COLLECTION_USERS: &str = "users";
pub const COLLECTION_PROFILES: &str = "profiles";
pub const COLLECTION_PROJECTS: &str = "research_projects";
pub const COLLECTION_MODELS: &str = "models";

/// Type of a single collection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Bool,
    Email,
    Url,
    /// Arbitrary JSON payload (lists of strings, key/value pairs, embedded
    /// publication literals).
    Json,
    /// One-of-N string value.
    Select { values: Vec<String> },
    /// List of foreign record IDs in another (or the same) collection.
    Relation { collection: String },
    /// List of uploaded filenames attached to the record.
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub ftype: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl Field {
    pub fn new(name: &str, ftype: FieldType) -> Self {
        Self { name: name.to_string(), ftype, required: false }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl CollectionSchema {
    pub fn new(name: &str, fields: Vec<Field>) -> Self {
        Self { name: name.to_string(), fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// The full schema: an ordered list of collections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub collections: Vec<CollectionSchema>,
}

impl Schema {
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut CollectionSchema> {
        self.collections.iter_mut().find(|c| c.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&CollectionSchema> {
        self.collection(name)
            .ok_or_else(|| QuorumError::NotFound(format!("collection {name}")))
    }
}

/// Collection names become SQLite table names, so keep them tame.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(QuorumError::Validation(format!("invalid collection name: {name:?}")))
    }
}
