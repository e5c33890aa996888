//! Local record lists, as the dashboard and search pages hold them.
//!
//! When a record is deleted the UI drops it from every cached list and scrubs
//! it out of relation arrays of the records that stay cached, so no page
//! keeps rendering a dangling reference.

use serde_json::Value;
use std::collections::HashMap;

const RELATION_FIELDS: &[&str] =
    &["collaborators", "related_projects", "related_models", "user"];

#[derive(Debug, Clone, Default)]
pub struct ListCache {
    lists: HashMap<String, Vec<Value>>,
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_list(&mut self, collection: &str, items: Vec<Value>) {
        self.lists.insert(collection.to_string(), items);
    }

    pub fn list(&self, collection: &str) -> &[Value] {
        self.lists.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert or replace a record in its collection's list.
    pub fn upsert(&mut self, collection: &str, record: Value) {
        let id = record["id"].as_str().unwrap_or("").to_string();
        let list = self.lists.entry(collection.to_string()).or_default();
        match list.iter_mut().find(|r| r["id"].as_str() == Some(id.as_str())) {
            Some(slot) => *slot = record,
            None => list.push(record),
        }
    }

    /// Drop a deleted record everywhere: its own list entry and any relation
    /// arrays of cached records pointing at it.
    pub fn remove_record(&mut self, id: &str) {
        for list in self.lists.values_mut() {
            list.retain(|r| r["id"].as_str() != Some(id));
            for record in list.iter_mut() {
                for field in RELATION_FIELDS {
                    if let Some(arr) = record.get_mut(*field).and_then(Value::as_array_mut) {
                        arr.retain(|v| v.as_str() != Some(id));
                    }
                }
            }
        }
    }
}
