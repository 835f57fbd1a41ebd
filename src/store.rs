use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::models::{GenerationResult, ProjectRecord, TechPackMeta};

/// Generated projects, namespaced per signed-in principal and keyed by style number.
#[derive(Default)]
pub struct ProjectStore {
    projects: RwLock<HashMap<String, HashMap<String, ProjectRecord>>>,
}

impl ProjectStore {
    /// Inserts or replaces the record for `(principal, meta.style_no)`.
    pub fn save(&self, principal: &str, meta: TechPackMeta, result: GenerationResult) -> ProjectRecord {
        let record = ProjectRecord { meta, result, created_at: Utc::now() };
        self.projects
            .write()
            .entry(principal.to_string())
            .or_default()
            .insert(record.meta.style_no.clone(), record.clone());
        record
    }

    pub fn get(&self, principal: &str, style_no: &str) -> Option<ProjectRecord> {
        self.projects.read().get(principal).and_then(|p| p.get(style_no)).cloned()
    }

    /// Newest first.
    pub fn list(&self, principal: &str) -> Vec<ProjectRecord> {
        let mut records: Vec<ProjectRecord> = self
            .projects
            .read()
            .get(principal)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(style_no: &str) -> TechPackMeta {
        TechPackMeta { style_no: style_no.into(), ..Default::default() }
    }

    fn result(msg: &str) -> GenerationResult {
        GenerationResult { ui_message: msg.into(), ..Default::default() }
    }

    #[test]
    fn records_are_namespaced_by_principal() {
        let store = ProjectStore::default();
        store.save("alice", meta("DP-1001"), result("a"));
        store.save("bob", meta("DP-1001"), result("b"));

        assert_eq!(store.get("alice", "DP-1001").unwrap().result.ui_message, "a");
        assert_eq!(store.get("bob", "DP-1001").unwrap().result.ui_message, "b");
        assert!(store.get("carol", "DP-1001").is_none());
    }

    #[test]
    fn saving_same_style_replaces() {
        let store = ProjectStore::default();
        store.save("alice", meta("DP-1001"), result("first"));
        store.save("alice", meta("DP-1001"), result("second"));
        store.save("alice", meta("DP-2002"), result("other"));

        assert_eq!(store.get("alice", "DP-1001").unwrap().result.ui_message, "second");
        assert_eq!(store.list("alice").len(), 2);
        assert!(store.list("nobody").is_empty());
    }
}
