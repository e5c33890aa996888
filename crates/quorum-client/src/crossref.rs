//! CrossRef publication search.
//!
//! The one external read-only API: free-text search over
//! `https://api.crossref.org/works`, mapped into the embedded publication
//! shape the projects store. Polite pool: User-Agent carries a mailto.

use quorum_common::entities::PublicationRef;
use quorum_common::Result;
use serde_json::Value;
use tracing::debug;

const CR_SEARCH_URL: &str = "https://api.crossref.org/works";

pub struct CrossrefClient {
    client: reqwest::Client,
    user_agent: String,
}

impl CrossrefClient {
    pub fn new(contact_email: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: format!("Quorum/0.1 (mailto:{contact_email})"),
        }
    }

    /// Search works by free-text query.
    pub async fn search(&self, query: &str, rows: usize) -> Result<Vec<PublicationRef>> {
        let resp = self
            .client
            .get(CR_SEARCH_URL)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[("query", query), ("rows", &rows.to_string())])
            .send()
            .await?
            .json::<Value>()
            .await?;

        let items = resp["message"]["items"].as_array().cloned().unwrap_or_default();
        debug!(n = items.len(), "CrossRef search results");
        Ok(items.iter().map(work_to_publication).collect())
    }
}

impl Default for CrossrefClient {
    fn default() -> Self {
        Self::new("quorum@example.org")
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────

fn work_to_publication(work: &Value) -> PublicationRef {
    let title = work["title"]
        .as_array()
        .and_then(|t| t.first())
        .and_then(|t| t.as_str())
        .unwrap_or("No title")
        .to_string();

    let journal = work["container-title"]
        .as_array()
        .and_then(|j| j.first())
        .and_then(|j| j.as_str())
        .unwrap_or("No journal")
        .to_string();

    let author = match work["author"].as_array() {
        Some(authors) if !authors.is_empty() => authors
            .iter()
            .map(|a| {
                let given = a["given"].as_str().unwrap_or("").trim();
                let family = a["family"].as_str().unwrap_or("").trim();
                if given.is_empty() {
                    family.to_string()
                } else {
                    format!("{given} {family}")
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => "Unknown".to_string(),
    };

    PublicationRef {
        title,
        url: work["URL"].as_str().unwrap_or("").to_string(),
        journal,
        author,
    }
}
