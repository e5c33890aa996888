//! The temp-copy edit state machine every detail page uses.
//!
//! The editor holds the entity as fetched (`live`) and, while editing, a
//! working copy (`temp`). Field edits only ever touch `temp`; `cancel`
//! discards it and `save` persists it and swaps the server's reply in as the
//! new live copy. A failed save keeps the editor in edit mode so the user can
//! retry.

use crate::api::{strip_envelope, RecordBackend};
use quorum_common::entities::{Entity, PublicationRef};
use quorum_common::{QuorumError, Result};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Editor<T: Entity> {
    live: T,
    temp: Option<T>,
}

impl<T: Entity> Editor<T> {
    pub fn new(live: T) -> Self {
        Self { live, temp: None }
    }

    pub fn live(&self) -> &T {
        &self.live
    }

    pub fn is_editing(&self) -> bool {
        self.temp.is_some()
    }

    /// Enter edit mode, cloning live into temp. Re-entering is a no-op so
    /// in-progress edits survive.
    pub fn begin(&mut self) {
        if self.temp.is_none() {
            self.temp = Some(self.live.clone());
        }
    }

    pub fn temp(&self) -> Option<&T> {
        self.temp.as_ref()
    }

    /// The working copy. Only valid in edit mode.
    pub fn temp_mut(&mut self) -> Option<&mut T> {
        self.temp.as_mut()
    }

    /// Discard the working copy and restore the backup.
    pub fn cancel(&mut self) {
        self.temp = None;
    }

    /// Persist the working copy. On success the server's record becomes the
    /// live copy and edit mode ends; on failure temp is kept.
    pub async fn save<B: RecordBackend>(&mut self, backend: &B) -> Result<&T> {
        let temp = self
            .temp
            .as_ref()
            .ok_or_else(|| QuorumError::Validation("not in edit mode".into()))?;
        let patch = strip_envelope(serde_json::to_value(temp)?);
        let saved = match backend.save_record(T::COLLECTION, self.live.id(), patch).await {
            Ok(v) => v,
            Err(e) => {
                warn!(collection = T::COLLECTION, id = self.live.id(), error = %e, "save failed");
                return Err(e);
            }
        };
        self.live = serde_json::from_value(saved)?;
        self.temp = None;
        Ok(&self.live)
    }
}

// ── Relation list editing ──────────────────────────────────────────────────
//
// Add/remove are idempotent: IDs dedup by value, publications by URL.

pub fn add_relation(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|x| x == id) {
        return false;
    }
    list.push(id.to_string());
    true
}

pub fn remove_relation(list: &mut Vec<String>, id: &str) -> bool {
    let before = list.len();
    list.retain(|x| x != id);
    list.len() != before
}

pub fn add_publication(list: &mut Vec<PublicationRef>, publication: PublicationRef) -> bool {
    if list.iter().any(|p| p.url == publication.url) {
        return false;
    }
    list.push(publication);
    true
}

pub fn remove_publication(list: &mut Vec<PublicationRef>, url: &str) -> bool {
    let before = list.len();
    list.retain(|p| p.url != url);
    list.len() != before
}
