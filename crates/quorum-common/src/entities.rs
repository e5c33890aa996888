//! Typed views of the stored collections.
//!
//! The store itself is schema-driven JSON; these structs are the shapes the
//! client works with. List-valued fields default to empty so records written
//! before a field existed still deserialize.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by projects and models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
    Complete,
    Pending,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Complete => "complete",
            Status::Pending => "pending",
        }
    }
}

/// Free-form key/value pair used for details, data sources, metrics and
/// hyperparameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// An external publication linked to a project. Embedded literal data; there
/// is no foreign record behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRef {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub author: String,
}

/// A publication listed on a researcher profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePublication {
    pub name: String,
    pub url: String,
}

/// A record type stored in a named collection.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Uploaded avatar filenames, served from /files/users/{id}/{name}.
    #[serde(default)]
    pub avatar: Vec<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    /// Owning user ID (1:1).
    pub user: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default)]
    pub publications: Vec<ProfilePublication>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl Entity for Profile {
    const COLLECTION: &'static str = "profiles";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResearchProject {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub details: Vec<KeyValue>,
    #[serde(default)]
    pub data_sources: Vec<KeyValue>,
    /// User IDs. Always contains the creating user.
    #[serde(default)]
    pub collaborators: Vec<String>,
    #[serde(default)]
    pub related_projects: Vec<String>,
    #[serde(default)]
    pub related_models: Vec<String>,
    #[serde(default)]
    pub related_publications: Vec<PublicationRef>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl Entity for ResearchProject {
    const COLLECTION: &'static str = "research_projects";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Model {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub performance_metrics: Vec<KeyValue>,
    #[serde(default)]
    pub hyperparameters: Vec<KeyValue>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub collaborators: Vec<String>,
    #[serde(default)]
    pub related_projects: Vec<String>,
    #[serde(default)]
    pub related_models: Vec<String>,
    /// Uploaded artifact filenames, served from /files/models/{id}/{name}.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl Entity for Model {
    const COLLECTION: &'static str = "models";

    fn id(&self) -> &str {
        &self.id
    }
}
