//! Assessment service
//!
//! The operations the HTTP layer calls: validated writes to the response
//! store, cached reads of responses and scores, and explicit refreshes.
//! Every write invalidates the affected cache entries before it returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheKey, CachedValue, ScoreCache};
use crate::error::{AssessmentError, Result};
use crate::scoring::{self, SectionScore, StoreScore};
use crate::store::{ResponseStore, SectionResponses};

/// Marker some clients send for an unset identifier
pub const UNDEFINED_SENTINEL: &str = "undefined";

/// Reject empty identifiers and the `"undefined"` sentinel
pub fn validate_identifier(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value == UNDEFINED_SENTINEL {
        return Err(AssessmentError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Coerce a JSON identifier to a string: strings verbatim, anything else as
/// its JSON text (so `1660` and `"1660"` name the same store)
pub fn coerce_identifier(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn require(field: &'static str, value: Option<Value>) -> Result<Value> {
    value.ok_or(AssessmentError::MissingField(field))
}

/// Body of a single save; `null` counts as absent
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SaveResponseRequest {
    pub store: Option<Value>,
    pub section: Option<Value>,
    pub question_id: Option<Value>,
    pub procedure_index: Option<Value>,
    pub response: Option<Value>,
}

/// Body of a batch save
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BatchSaveRequest {
    pub store: Option<Value>,
    pub section: Option<Value>,
    pub responses: Option<Value>,
}

/// Result of a single save, with the scores it produced
#[derive(Debug, Clone, Serialize)]
pub struct SavedResponse {
    pub store: String,
    pub section: String,
    pub question_id: String,
    pub procedure_index: String,
    pub key: String,
    pub section_score: SectionScore,
    pub store_score: StoreScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSaved {
    pub store: String,
    pub section: String,
    pub saved_count: usize,
}

/// What a refresh recomputes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    Section(String),
    All,
}

impl RefreshTarget {
    pub fn parse(section: &str) -> Self {
        if section == "all" {
            RefreshTarget::All
        } else {
            RefreshTarget::Section(section.to_string())
        }
    }

    pub fn section(&self) -> Option<&str> {
        match self {
            RefreshTarget::Section(section) => Some(section),
            RefreshTarget::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Refreshed {
    Section(SectionScore),
    Store(StoreScore),
}

/// A value plus whether it came from the cache
#[derive(Debug, Clone)]
pub struct Lookup<T> {
    pub value: T,
    pub cached: bool,
}

pub struct AssessmentService {
    store: Arc<ResponseStore>,
    cache: ScoreCache,
}

impl AssessmentService {
    pub fn new(store: Arc<ResponseStore>, cache: ScoreCache) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &ResponseStore {
        &self.store
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Save one response and return the updated section and store scores
    pub fn save_response(&self, request: SaveResponseRequest) -> Result<SavedResponse> {
        let store_id = coerce_identifier(&require("store", request.store)?);
        let section_id = coerce_identifier(&require("section", request.section)?);
        let question_id = coerce_identifier(&require("question_id", request.question_id)?);
        let procedure_index =
            coerce_identifier(&require("procedure_index", request.procedure_index)?);
        let response = require("response", request.response)?;

        validate_identifier("store", &store_id)?;
        validate_identifier("section", &section_id)?;

        let key = self
            .store
            .put(&store_id, &section_id, &question_id, &procedure_index, response);
        self.cache.invalidate_section(&store_id, &section_id);

        info!(store = %store_id, section = %section_id, key = %key, "Saved response");

        let section_score = self.get_section_score(&store_id, &section_id).value;
        let store_score = self.get_store_score(&store_id).value;

        Ok(SavedResponse {
            store: store_id,
            section: section_id,
            question_id,
            procedure_index,
            key,
            section_score,
            store_score,
        })
    }

    /// Save a batch of keyed responses to one section.
    ///
    /// `responses` must be an object; otherwise nothing is applied.
    pub fn save_responses_batch(&self, request: BatchSaveRequest) -> Result<BatchSaved> {
        let store_id = coerce_identifier(&require("store", request.store)?);
        let section_id = coerce_identifier(&require("section", request.section)?);
        let responses = require("responses", request.responses)?;

        validate_identifier("store", &store_id)?;
        validate_identifier("section", &section_id)?;

        let responses = match responses {
            Value::Object(responses) => responses,
            other => {
                return Err(AssessmentError::InvalidField {
                    field: "responses",
                    reason: format!("expected an object of key -> response, got {}", json_kind(&other)),
                })
            }
        };

        let saved_count = self.store.put_batch(&store_id, &section_id, responses);
        self.cache.invalidate_section(&store_id, &section_id);

        info!(store = %store_id, section = %section_id, saved_count, "Batch saved responses");

        Ok(BatchSaved {
            store: store_id,
            section: section_id,
            saved_count,
        })
    }

    /// All responses of a section (empty when unknown)
    pub fn get_responses(&self, store_id: &str, section_id: &str) -> Lookup<SectionResponses> {
        let lookup = self.cached(
            CacheKey::responses(store_id, section_id),
            store_id,
            |value| match value {
                CachedValue::Responses(responses) => Some(responses),
                _ => None,
            },
            CachedValue::Responses,
            || self.store.get_all(store_id, section_id),
        );
        info!(store = store_id, section = section_id, count = lookup.value.len(), "Retrieved responses");
        lookup
    }

    pub fn get_section_score(&self, store_id: &str, section_id: &str) -> Lookup<SectionScore> {
        self.cached(
            CacheKey::section_score(store_id, section_id),
            store_id,
            |value| match value {
                CachedValue::Section(score) => Some(score),
                _ => None,
            },
            CachedValue::Section,
            || scoring::section_score(&self.store, store_id, section_id),
        )
    }

    pub fn get_store_score(&self, store_id: &str) -> Lookup<StoreScore> {
        self.cached(
            CacheKey::store_score(store_id),
            store_id,
            |value| match value {
                CachedValue::Store(score) => Some(score),
                _ => None,
            },
            CachedValue::Store,
            || scoring::store_score(&self.store, store_id),
        )
    }

    /// Invalidate cached values and recompute
    pub fn refresh_scores(&self, store_id: &str, target: &RefreshTarget) -> Refreshed {
        match target {
            RefreshTarget::Section(section_id) => {
                self.cache.invalidate_section(store_id, section_id);
                let score = self.get_section_score(store_id, section_id).value;
                info!(store = store_id, section = %section_id, percentage = score.percentage, "Refreshed section score");
                Refreshed::Section(score)
            }
            RefreshTarget::All => {
                self.cache.invalidate_store(store_id);
                let score = self.get_store_score(store_id).value;
                info!(store = store_id, percentage = score.overall_percentage, "Refreshed store score");
                Refreshed::Store(score)
            }
        }
    }

    fn cached<T: Clone>(
        &self,
        key: CacheKey,
        store_id: &str,
        extract: fn(CachedValue) -> Option<T>,
        wrap: fn(T) -> CachedValue,
        compute: impl FnOnce() -> T,
    ) -> Lookup<T> {
        // read before computing so a concurrent write leaves this entry stale
        let generation = self.store.generation(store_id);

        if let Some(value) = self.cache.get(&key, generation).and_then(extract) {
            debug!(key = %key, "Cache hit");
            return Lookup {
                value,
                cached: true,
            };
        }

        let value = compute();
        self.cache.insert(key, wrap(value.clone()), generation);
        Lookup {
            value,
            cached: false,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
