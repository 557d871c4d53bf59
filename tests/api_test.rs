//! HTTP API integration tests
//!
//! Drives the router in-process:
//! - Saving single responses and batches
//! - Identifier and body validation
//! - Section and store scoring through the API
//! - Cache invalidation on write and refresh

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use osr_assessment::api::{create_router, AppState};
use osr_assessment::cache::ScoreCache;
use osr_assessment::{AssessmentService, Config, ResponseStore};

fn app() -> Router {
    let config = Config::default();
    let service = AssessmentService::new(
        Arc::new(ResponseStore::new()),
        ScoreCache::new(true, Duration::from_secs(60), 100),
    );
    create_router(Arc::new(AppState::new(service, config)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn save(app: &Router, store: Value, section: &str, question: &str, has_issues: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/save_response",
        Some(json!({
            "store": store,
            "section": section,
            "question_id": question,
            "procedure_index": 0,
            "response": { "hasIssues": has_issues },
        })),
    )
    .await
}

// =============================================================================
// Saving
// =============================================================================

#[tokio::test]
async fn test_save_then_get_responses() {
    let app = app();

    let (status, body) = save(&app, json!("42"), "culture", "q1", "no").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["key"], "q1-0");
    assert_eq!(body["procedure_index"], "0");

    let (status, body) = send(&app, Method::GET, "/api/get_responses/42/culture", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let response = &body["responses"]["q1-0"];
    assert_eq!(response["hasIssues"], "no");
    assert!(!response["saved_timestamp"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_save_returns_scores() {
    let app = app();
    let (_, body) = save(&app, json!(1660), "people", "q1", "no").await;

    assert_eq!(body["store"], "1660");
    assert_eq!(body["section_score"]["total_questions"], 8);
    assert_eq!(body["store_score"]["overall_max_score"], 46);
}

#[tokio::test]
async fn test_save_rejects_undefined_and_empty_store() {
    let app = app();

    let (status, body) = save(&app, json!("undefined"), "culture", "q1", "no").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("store"));

    let (status, _) = save(&app, json!(""), "culture", "q1", "no").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, "/api/debug/storage", None).await;
    assert_eq!(body["stores_count"], 0);
}

#[tokio::test]
async fn test_save_missing_field() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/save_response",
        Some(json!({ "store": "42", "section": "culture", "question_id": "q1", "procedure_index": "0" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: response");
}

#[tokio::test]
async fn test_save_without_json_body() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/save_response", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No JSON data provided");

    let (status, _) = send(&app, Method::POST, "/api/save_response", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/api/batch_save_responses", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No JSON data provided");
}

#[tokio::test]
async fn test_batch_save() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/batch_save_responses",
        Some(json!({
            "store": "42",
            "section": "availability",
            "responses": {
                "q1-0": { "hasIssues": "no" },
                "q2-0": { "hasIssues": "no" },
                "q3-0": { "hasIssues": "no" },
                "q4-0": { "hasIssues": "no" },
            },
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved_count"], 4);
    assert_eq!(body["message"], "Batch saved 4 responses successfully");

    let (_, body) = send(&app, Method::GET, "/api/get_section_score/42/availability", None).await;
    assert_eq!(body["score"]["score"], 10);
    assert_eq!(body["score"]["percentage"], 100);
    assert_eq!(body["score"]["color"], "green");
}

#[tokio::test]
async fn test_batch_rejects_non_object_responses() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/batch_save_responses",
        Some(json!({ "store": "42", "section": "people", "responses": "nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/batch_save_responses",
        Some(json!({ "store": "undefined", "section": "people", "responses": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("store"));
}

// =============================================================================
// Scoring
// =============================================================================

#[tokio::test]
async fn test_unknown_store_scores_zero() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/get_store_score/9999", None).await;

    assert_eq!(status, StatusCode::OK);
    let score = &body["score"];
    assert_eq!(score["overall_score"], 0);
    assert_eq!(score["overall_max_score"], 46);
    assert_eq!(score["overall_color"], "red");
    assert_eq!(score["sections_completed"], 0);
    assert_eq!(score["total_sections"], 5);
}

#[tokio::test]
async fn test_score_paths_reject_undefined() {
    let app = app();

    let (status, _) = send(&app, Method::GET, "/api/get_store_score/undefined", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/get_section_score/42/undefined", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foundation_store_scoring() {
    let app = app();
    for q in ["q1", "q2", "q3", "q4"] {
        save(&app, json!("1660"), "people", q, "no").await;
    }

    let (_, body) = send(&app, Method::GET, "/api/get_section_score/1660/people", None).await;
    let score = &body["score"];
    assert_eq!(score["raw_score"], 8);
    assert_eq!(score["raw_max_score"], 16);
    assert_eq!(score["normalization_factor"], 0.625);
    assert_eq!(score["score"], 5);
    assert_eq!(score["percentage"], 50);
    assert_eq!(score["color"], "red");
}

#[tokio::test]
async fn test_non_string_answer_keeps_section_score() {
    let app = app();
    for q in ["q1", "q2", "q3", "q4"] {
        save(&app, json!("42"), "availability", q, "no").await;
    }
    send(
        &app,
        Method::POST,
        "/api/save_response",
        Some(json!({
            "store": "42",
            "section": "availability",
            "question_id": "q5",
            "procedure_index": 0,
            "response": { "hasIssues": false },
        })),
    )
    .await;

    let (_, body) = send(&app, Method::GET, "/api/get_section_score/42/availability", None).await;
    let score = &body["score"];
    assert_eq!(score["score"], 10);
    assert_eq!(score["questions_completed"], 5);
    assert_eq!(score["error"], Value::Null);

    let (_, body) = send(&app, Method::GET, "/api/get_store_score/42", None).await;
    assert_eq!(body["score"]["sections_completed"], 1);
}

#[tokio::test]
async fn test_store_score_updates_after_write() {
    let app = app();
    save(&app, json!("42"), "culture", "q1", "no").await;

    let (_, first) = send(&app, Method::GET, "/api/get_store_score/42", None).await;
    let (_, second) = send(&app, Method::GET, "/api/get_store_score/42", None).await;
    assert_eq!(first["score"], second["score"]);
    assert_eq!(second["cached"], true);

    save(&app, json!("42"), "culture", "q2", "no").await;
    let (_, third) = send(&app, Method::GET, "/api/get_store_score/42", None).await;
    assert_eq!(third["score"]["overall_score"], 4);
    assert_eq!(third["score"]["section_scores"]["culture"]["questions_completed"], 2);
}

#[tokio::test]
async fn test_refresh_scores() {
    let app = app();
    save(&app, json!("42"), "checkout", "q1", "no").await;

    let (status, body) = send(&app, Method::POST, "/api/refresh_scores/42/checkout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["section"], "checkout");
    assert_eq!(body["cache_invalidated"], true);
    assert_eq!(body["score"]["score"], 2);

    let (_, body) = send(&app, Method::POST, "/api/refresh_scores/42/all", None).await;
    assert_eq!(body["section"], Value::Null);
    assert_eq!(body["score"]["overall_score"], 2);
}

// =============================================================================
// Debug, health and fallback
// =============================================================================

#[tokio::test]
async fn test_cache_debug_and_clear() {
    let app = app();
    save(&app, json!("42"), "culture", "q1", "no").await;

    let (_, body) = send(&app, Method::GET, "/api/debug/cache", None).await;
    assert_eq!(body["cache_stats"]["enabled"], true);
    assert!(body["cache_stats"]["entries"].as_u64().unwrap() > 0);

    let (status, _) = send(&app, Method::POST, "/api/debug/clear_cache", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/api/debug/cache", None).await;
    assert_eq!(body["cache_stats"]["entries"], 0);
}

#[tokio::test]
async fn test_health_and_index() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "production");
    assert_eq!(body["storage_stats"]["stores"], 0);
    assert_eq!(body["storage_stats"]["total_responses"], 0);

    save(&app, json!("42"), "culture", "q1", "no").await;
    let (_, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(body["storage_stats"]["stores"], 1);
    assert_eq!(body["storage_stats"]["total_responses"], 1);

    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["save_response"], "/api/save_response");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
    assert!(body["available_endpoints"].as_array().unwrap().len() >= 5);
}

#[tokio::test]
async fn test_wrong_method_is_json_405() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/save_response", None).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Method not allowed");
    assert_eq!(
        body["message"],
        "The method GET is not allowed for the requested URL."
    );
}
