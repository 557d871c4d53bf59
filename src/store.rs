//! Response storage
//!
//! In-memory storage for assessment responses, keyed by store, section and
//! a `"{question_id}-{procedure_index}"` sub-key. Only the latest write for a
//! key is kept. Nothing is persisted; the store lives as long as the process.
//!
//! Every write bumps a per-store generation counter. Derived values (see
//! [`crate::cache`]) record the generation they were computed at, so a cached
//! score can never outlive the write that made it stale.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Field stamped onto every structured response on write
pub const SAVED_TIMESTAMP_FIELD: &str = "saved_timestamp";

/// Responses of one section: sub-key -> response
pub type SectionResponses = BTreeMap<String, Value>;

/// Key for one section of one store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey {
    pub store: String,
    pub section: String,
}

impl SectionKey {
    pub fn new(store: &str, section: &str) -> Self {
        Self {
            store: store.to_string(),
            section: section.to_string(),
        }
    }
}

/// Build the sub-key a response is stored under
pub fn response_key(question_id: &str, procedure_index: &str) -> String {
    format!("{}-{}", question_id, procedure_index)
}

/// Response store with concurrent access
///
/// Each section is a single map entry, so a write (or a whole batch) to one
/// section holds that entry's lock for its full duration and readers never
/// observe a half-applied batch.
#[derive(Default)]
pub struct ResponseStore {
    /// (store, section) -> responses
    sections: DashMap<SectionKey, SectionResponses>,
    /// store -> write generation
    generations: DashMap<String, u64>,
}

impl ResponseStore {
    /// Create an empty response store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one response, returning the sub-key it was saved under.
    ///
    /// Structured (object) responses get a fresh `saved_timestamp`, replacing
    /// anything the client sent. A prior value at the same key is replaced.
    pub fn put(
        &self,
        store: &str,
        section: &str,
        question_id: &str,
        procedure_index: &str,
        mut response: Value,
    ) -> String {
        let key = response_key(question_id, procedure_index);
        stamp(&mut response, &now_timestamp());

        self.sections
            .entry(SectionKey::new(store, section))
            .or_default()
            .insert(key.clone(), response);
        self.bump_generation(store);

        debug!(store, section, key = %key, "Stored response");
        key
    }

    /// Store every response of a batch under its given sub-key.
    ///
    /// The section is created even for an empty batch. Returns the number of
    /// responses applied.
    pub fn put_batch<I>(&self, store: &str, section: &str, responses: I) -> usize
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let timestamp = now_timestamp();
        let mut applied = 0;

        {
            let mut entry = self
                .sections
                .entry(SectionKey::new(store, section))
                .or_default();
            for (key, mut response) in responses {
                stamp(&mut response, &timestamp);
                entry.insert(key, response);
                applied += 1;
            }
        }
        self.bump_generation(store);

        debug!(store, section, applied, "Stored response batch");
        applied
    }

    /// Responses of a section, `None` if nothing was ever written to it
    pub fn get(&self, store: &str, section: &str) -> Option<SectionResponses> {
        self.sections
            .get(&SectionKey::new(store, section))
            .map(|entry| entry.clone())
    }

    /// All responses of a section, empty if the store or section is unknown
    pub fn get_all(&self, store: &str, section: &str) -> SectionResponses {
        self.get(store, section).unwrap_or_default()
    }

    /// Whether anything was ever written to this section
    pub fn exists(&self, store: &str, section: &str) -> bool {
        self.sections.contains_key(&SectionKey::new(store, section))
    }

    /// Current write generation of a store (0 if never written)
    pub fn generation(&self, store: &str) -> u64 {
        self.generations.get(store).map(|g| *g).unwrap_or(0)
    }

    /// Number of distinct stores with at least one section
    pub fn stores_count(&self) -> usize {
        self.generations.len()
    }

    /// Number of stored responses across all stores and sections
    pub fn total_responses(&self) -> usize {
        self.sections.iter().map(|entry| entry.value().len()).sum()
    }

    /// Copy of the whole store: store -> section -> responses
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, SectionResponses>> {
        let mut out: BTreeMap<String, BTreeMap<String, SectionResponses>> = BTreeMap::new();
        for entry in self.sections.iter() {
            out.entry(entry.key().store.clone())
                .or_default()
                .insert(entry.key().section.clone(), entry.value().clone());
        }
        out
    }

    fn bump_generation(&self, store: &str) {
        *self.generations.entry(store.to_string()).or_insert(0) += 1;
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn stamp(response: &mut Value, timestamp: &str) {
    if let Value::Object(fields) = response {
        fields.insert(
            SAVED_TIMESTAMP_FIELD.to_string(),
            Value::String(timestamp.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_key_format() {
        assert_eq!(response_key("q1", "0"), "q1-0");
        assert_eq!(response_key("avail-3", "12"), "avail-3-12");
    }

    #[test]
    fn test_put_then_get_all() {
        let store = ResponseStore::new();
        let key = store.put("42", "culture", "q1", "0", json!({"hasIssues": "no"}));
        assert_eq!(key, "q1-0");

        let responses = store.get_all("42", "culture");
        assert_eq!(responses.len(), 1);
        let saved = &responses["q1-0"];
        assert_eq!(saved["hasIssues"], "no");
        assert!(!saved[SAVED_TIMESTAMP_FIELD].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_client_timestamp_is_overwritten() {
        let store = ResponseStore::new();
        store.put(
            "42",
            "culture",
            "q1",
            "0",
            json!({"hasIssues": "yes", "saved_timestamp": "1999-01-01"}),
        );

        let responses = store.get_all("42", "culture");
        assert_ne!(responses["q1-0"][SAVED_TIMESTAMP_FIELD], "1999-01-01");
    }

    #[test]
    fn test_scalar_responses_are_not_stamped() {
        let store = ResponseStore::new();
        store.put("42", "culture", "q1", "0", json!("done"));

        assert_eq!(store.get_all("42", "culture")["q1-0"], json!("done"));
    }

    #[test]
    fn test_last_write_wins() {
        let store = ResponseStore::new();
        store.put("42", "people", "q1", "0", json!({"hasIssues": "yes"}));
        store.put("42", "people", "q1", "0", json!({"hasIssues": "no"}));

        let responses = store.get_all("42", "people");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses["q1-0"]["hasIssues"], "no");
    }

    #[test]
    fn test_get_all_missing_is_empty() {
        let store = ResponseStore::new();
        assert!(store.get_all("nope", "culture").is_empty());
        assert!(!store.exists("nope", "culture"));
    }

    #[test]
    fn test_put_batch_counts_and_stamps() {
        let store = ResponseStore::new();
        let batch = vec![
            ("q1-0".to_string(), json!({"hasIssues": "no"})),
            ("q2-0".to_string(), json!({"hasIssues": "yes"})),
            ("q3-0".to_string(), json!(true)),
        ];

        assert_eq!(store.put_batch("7", "checkout", batch), 3);

        let responses = store.get_all("7", "checkout");
        assert_eq!(responses.len(), 3);
        assert!(responses["q1-0"].get(SAVED_TIMESTAMP_FIELD).is_some());
        assert!(responses["q2-0"].get(SAVED_TIMESTAMP_FIELD).is_some());
        assert_eq!(responses["q3-0"], json!(true));
    }

    #[test]
    fn test_empty_batch_creates_section() {
        let store = ResponseStore::new();
        assert_eq!(store.put_batch("7", "checkout", Vec::new()), 0);
        assert!(store.exists("7", "checkout"));
        assert!(store.get_all("7", "checkout").is_empty());
    }

    #[test]
    fn test_generation_advances_per_store() {
        let store = ResponseStore::new();
        assert_eq!(store.generation("1"), 0);

        store.put("1", "people", "q1", "0", json!({}));
        store.put_batch("1", "culture", vec![("q1-0".to_string(), json!({}))]);
        assert_eq!(store.generation("1"), 2);
        assert_eq!(store.generation("2"), 0);
    }

    #[test]
    fn test_snapshot_nests_by_store_and_section() {
        let store = ResponseStore::new();
        store.put("1", "people", "q1", "0", json!({"hasIssues": "no"}));
        store.put("1", "culture", "q1", "0", json!({"hasIssues": "no"}));
        store.put("2", "people", "q1", "0", json!({"hasIssues": "yes"}));

        let snapshot = store.snapshot();
        assert_eq!(store.stores_count(), 2);
        assert_eq!(store.total_responses(), 3);
        assert_eq!(snapshot["1"].len(), 2);
        assert_eq!(snapshot["2"]["people"]["q1-0"]["hasIssues"], "yes");
    }

    #[test]
    fn test_concurrent_puts_are_not_lost() {
        let store = std::sync::Arc::new(ResponseStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.put("9", "people", &format!("q{t}"), &i.to_string(), json!({}));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get_all("9", "people").len(), 400);
        assert_eq!(store.generation("9"), 400);
    }
}
