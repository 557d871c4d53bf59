//! HTTP API
//!
//! JSON endpoints over the assessment service:
//! - Response capture (single and batch)
//! - Response listings and section/store scores
//! - Score refresh and cache debugging
//! - Health check

pub mod error;
pub mod health;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::error::AssessmentError;
use crate::service::AssessmentService;
use error::ApiError;

/// Endpoint index reported by `/` and by the 404 handler
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("health", "/api/health"),
    ("save_response", "/api/save_response"),
    ("batch_save_responses", "/api/batch_save_responses"),
    ("get_responses", "/api/get_responses/<store>/<section>"),
    ("get_store_score", "/api/get_store_score/<store>"),
    ("get_section_score", "/api/get_section_score/<store>/<section>"),
    ("refresh_scores", "/api/refresh_scores/<store>/<section|all>"),
    ("debug_storage", "/api/debug/storage"),
    ("debug_cache", "/api/debug/cache"),
    ("clear_cache", "/api/debug/clear_cache"),
];

/// State shared across handlers
pub struct AppState {
    pub service: AssessmentService,
    pub config: Config,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(service: AssessmentService, config: Config) -> Self {
        Self {
            service,
            config,
            started_at: Instant::now(),
        }
    }

    /// Wrap a service error for the response, honoring debug mode
    pub fn reject(&self, error: AssessmentError) -> ApiError {
        ApiError::Assessment {
            error,
            debug: self.config.server.debug,
        }
    }
}

/// Create the API router
pub fn create_router(state: SharedState) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .route("/", get(health::index))
        .route("/api/health", get(health::health))
        // Responses
        .route("/api/save_response", post(routes::save_response))
        .route("/api/batch_save_responses", post(routes::batch_save_responses))
        .route("/api/get_responses/:store/:section", get(routes::get_responses))
        // Scores
        .route("/api/get_section_score/:store/:section", get(routes::get_section_score))
        .route("/api/get_store_score/:store", get(routes::get_store_score))
        .route("/api/refresh_scores/:store/:section", post(routes::refresh_scores))
        // Debug
        .route("/api/debug/storage", get(routes::debug_storage))
        .route("/api/debug/cache", get(routes::debug_cache))
        .route("/api/debug/clear_cache", post(routes::clear_cache))
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::method_not_allowed)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
