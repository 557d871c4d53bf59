//! API route handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Json},
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::ApiError;
use super::{SharedState, ENDPOINTS};
use crate::cache::CacheStats;
use crate::scoring::{SectionScore, StoreScore};
use crate::service::{
    validate_identifier, BatchSaveRequest, BatchSaved, RefreshTarget, Refreshed,
    SaveResponseRequest, SavedResponse,
};
use crate::store::SectionResponses;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Decode a request body that must be a non-empty JSON object
fn request_body<T: DeserializeOwned>(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiError> {
    let Json(value) = payload?;
    if !matches!(&value, Value::Object(fields) if !fields.is_empty()) {
        return Err(ApiError::NoJson);
    }
    serde_json::from_value(value).map_err(|_| ApiError::NoJson)
}

// === Responses ===

#[derive(Serialize)]
pub struct SaveResponseBody {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub saved: SavedResponse,
    pub timestamp: String,
}

/// POST /api/save_response
pub async fn save_response(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SaveResponseBody>, ApiError> {
    let request: SaveResponseRequest = request_body(payload)?;
    let saved = state
        .service
        .save_response(request)
        .map_err(|e| state.reject(e))?;

    Ok(Json(SaveResponseBody {
        success: true,
        message: "Response saved successfully".to_string(),
        saved,
        timestamp: now(),
    }))
}

#[derive(Serialize)]
pub struct BatchSaveBody {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub saved: BatchSaved,
    pub timestamp: String,
}

/// POST /api/batch_save_responses
pub async fn batch_save_responses(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchSaveBody>, ApiError> {
    let request: BatchSaveRequest = request_body(payload)?;
    let saved = state
        .service
        .save_responses_batch(request)
        .map_err(|e| state.reject(e))?;

    Ok(Json(BatchSaveBody {
        success: true,
        message: format!("Batch saved {} responses successfully", saved.saved_count),
        saved,
        timestamp: now(),
    }))
}

#[derive(Serialize)]
pub struct ResponsesBody {
    pub success: bool,
    pub store: String,
    pub section: String,
    pub responses: SectionResponses,
    pub count: usize,
    pub cached: bool,
    pub timestamp: String,
}

/// GET /api/get_responses/:store/:section
pub async fn get_responses(
    State(state): State<SharedState>,
    Path((store, section)): Path<(String, String)>,
) -> Result<Json<ResponsesBody>, ApiError> {
    validate_identifier("store", &store).map_err(|e| state.reject(e))?;
    validate_identifier("section", &section).map_err(|e| state.reject(e))?;

    let lookup = state.service.get_responses(&store, &section);
    Ok(Json(ResponsesBody {
        success: true,
        count: lookup.value.len(),
        responses: lookup.value,
        cached: lookup.cached,
        store,
        section,
        timestamp: now(),
    }))
}

// === Scores ===

#[derive(Serialize)]
pub struct SectionScoreBody {
    pub success: bool,
    pub store: String,
    pub section: String,
    pub score: SectionScore,
    pub cached: bool,
    pub timestamp: String,
}

/// GET /api/get_section_score/:store/:section
pub async fn get_section_score(
    State(state): State<SharedState>,
    Path((store, section)): Path<(String, String)>,
) -> Result<Json<SectionScoreBody>, ApiError> {
    validate_identifier("store", &store).map_err(|e| state.reject(e))?;
    validate_identifier("section", &section).map_err(|e| state.reject(e))?;

    let lookup = state.service.get_section_score(&store, &section);
    tracing::info!(
        store = %store,
        section = %section,
        percentage = lookup.value.percentage,
        "Calculated section score"
    );

    Ok(Json(SectionScoreBody {
        success: true,
        store,
        section,
        score: lookup.value,
        cached: lookup.cached,
        timestamp: now(),
    }))
}

#[derive(Serialize)]
pub struct StoreScoreBody {
    pub success: bool,
    pub store: String,
    pub score: StoreScore,
    pub cached: bool,
    pub timestamp: String,
}

/// GET /api/get_store_score/:store
pub async fn get_store_score(
    State(state): State<SharedState>,
    Path(store): Path<String>,
) -> Result<Json<StoreScoreBody>, ApiError> {
    validate_identifier("store", &store).map_err(|e| state.reject(e))?;

    let lookup = state.service.get_store_score(&store);
    tracing::info!(
        store = %store,
        percentage = lookup.value.overall_percentage,
        "Calculated store score"
    );

    Ok(Json(StoreScoreBody {
        success: true,
        store,
        score: lookup.value,
        cached: lookup.cached,
        timestamp: now(),
    }))
}

#[derive(Serialize)]
pub struct RefreshBody {
    pub success: bool,
    pub message: String,
    pub store: String,
    /// `null` when the whole store was refreshed
    pub section: Option<String>,
    pub score: Refreshed,
    pub cache_invalidated: bool,
    pub timestamp: String,
}

/// POST /api/refresh_scores/:store/:section
///
/// `section` may be `all` to refresh the store score and every section.
pub async fn refresh_scores(
    State(state): State<SharedState>,
    Path((store, section)): Path<(String, String)>,
) -> Result<Json<RefreshBody>, ApiError> {
    validate_identifier("store", &store).map_err(|e| state.reject(e))?;

    let target = RefreshTarget::parse(&section);
    let score = state.service.refresh_scores(&store, &target);

    Ok(Json(RefreshBody {
        success: true,
        message: "Scores refreshed successfully".to_string(),
        section: target.section().map(str::to_string),
        store,
        score,
        cache_invalidated: true,
        timestamp: now(),
    }))
}

// === Debug ===

#[derive(Serialize)]
pub struct StorageBody {
    pub success: bool,
    pub storage: BTreeMap<String, BTreeMap<String, SectionResponses>>,
    pub stores_count: usize,
    pub timestamp: String,
}

/// GET /api/debug/storage
pub async fn debug_storage(State(state): State<SharedState>) -> Json<StorageBody> {
    let store = state.service.store();
    Json(StorageBody {
        success: true,
        storage: store.snapshot(),
        stores_count: store.stores_count(),
        timestamp: now(),
    })
}

#[derive(Serialize)]
pub struct CacheStatsBody {
    pub success: bool,
    pub cache_stats: CacheStats,
    pub timestamp: String,
}

/// GET /api/debug/cache
pub async fn debug_cache(State(state): State<SharedState>) -> Json<CacheStatsBody> {
    Json(CacheStatsBody {
        success: true,
        cache_stats: state.service.cache().stats(),
        timestamp: now(),
    })
}

#[derive(Serialize)]
pub struct MessageBody {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

/// POST /api/debug/clear_cache
pub async fn clear_cache(State(state): State<SharedState>) -> Json<MessageBody> {
    state.service.cache().clear();
    Json(MessageBody {
        success: true,
        message: "Cache cleared successfully".to_string(),
        timestamp: now(),
    })
}

#[derive(Serialize)]
pub struct NotFoundBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub available_endpoints: Vec<&'static str>,
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundBody {
            success: false,
            error: "Endpoint not found".to_string(),
            message: format!("The requested URL {} was not found on this server.", uri),
            available_endpoints: ENDPOINTS.iter().map(|(_, path)| *path).collect(),
        }),
    )
}

/// Fallback for known paths hit with an unsupported method
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
