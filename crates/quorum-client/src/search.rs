//! The relation search dialog's data logic.
//!
//! A requested relation kind resolves either to an internal collection query
//! (substring filter on the title/name field) or to the CrossRef publication
//! search, and results already linked on the record being edited are filtered
//! out before they reach the caller.

use crate::api::Api;
use crate::crossref::CrossrefClient;
use async_trait::async_trait;
use quorum_common::entities::PublicationRef;
use quorum_common::Result;
use serde_json::Value;

/// What the search dialog was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Collaborators,
    RelatedProjects,
    RelatedModels,
    RelatedPublications,
}

impl RelationKind {
    /// Internal collection + filter field, or None for the external API.
    pub fn target(&self) -> Option<(&'static str, &'static str)> {
        match self {
            RelationKind::Collaborators => Some(("users", "name")),
            RelationKind::RelatedProjects => Some(("research_projects", "title")),
            RelationKind::RelatedModels => Some(("models", "name")),
            RelationKind::RelatedPublications => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResults {
    Records(Vec<Value>),
    Publications(Vec<PublicationRef>),
}

/// Everything the dialog needs to know about the record being edited.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    /// ID of the record being edited; never offered as its own relation.
    pub exclude_id: Option<&'a str>,
    /// IDs already present in the temp copy's relation list.
    pub linked_ids: &'a [String],
    /// Publications already linked (dedup key is the URL).
    pub linked_publications: &'a [PublicationRef],
}

#[async_trait]
pub trait RecordSearcher: Send + Sync {
    async fn search_records(
        &self,
        collection: &str,
        field: &str,
        query: &str,
    ) -> Result<Vec<Value>>;
}

#[async_trait]
pub trait PublicationSearcher: Send + Sync {
    async fn search_publications(&self, query: &str) -> Result<Vec<PublicationRef>>;
}

const SEARCH_ROWS: usize = 20;

#[async_trait]
impl RecordSearcher for Api {
    async fn search_records(
        &self,
        collection: &str,
        field: &str,
        query: &str,
    ) -> Result<Vec<Value>> {
        let sanitized = query.replace(['"', '\''], " ");
        let filter = format!("{field} ~ \"{}\"", sanitized.trim());
        self.list_raw(collection, Some(&filter), SEARCH_ROWS as u32).await
    }
}

#[async_trait]
impl PublicationSearcher for CrossrefClient {
    async fn search_publications(&self, query: &str) -> Result<Vec<PublicationRef>> {
        self.search(query, SEARCH_ROWS).await
    }
}

/// Run a relation search and drop anything already linked.
pub async fn search_relations(
    kind: RelationKind,
    req: &SearchRequest<'_>,
    records: &impl RecordSearcher,
    publications: &impl PublicationSearcher,
) -> Result<SearchResults> {
    if req.query.trim().is_empty() {
        return Ok(match kind.target() {
            Some(_) => SearchResults::Records(Vec::new()),
            None => SearchResults::Publications(Vec::new()),
        });
    }
    match kind.target() {
        Some((collection, field)) => {
            let hits = records.search_records(collection, field, req.query).await?;
            let filtered = hits
                .into_iter()
                .filter(|item| {
                    let id = item["id"].as_str().unwrap_or("");
                    req.exclude_id != Some(id) && !req.linked_ids.iter().any(|x| x == id)
                })
                .collect();
            Ok(SearchResults::Records(filtered))
        }
        None => {
            let hits = publications.search_publications(req.query).await?;
            let filtered = hits
                .into_iter()
                .filter(|p| !req.linked_publications.iter().any(|x| x.url == p.url))
                .collect();
            Ok(SearchResults::Publications(filtered))
        }
    }
}
