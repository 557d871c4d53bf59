//! Health and index endpoints

use axum::{extract::State, response::Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};
use sysinfo::System;

use super::{SharedState, ENDPOINTS};

const SERVICE_NAME: &str = "OSR Assessment API";

/// Process-wide system handle, reused across health checks
static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();

/// Memory usage reported by the health check
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    pub process_memory_mb: f64,
    pub available_memory_mb: f64,
    pub percent_used: f64,
}

/// Response store occupancy reported by the health check
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub stores: usize,
    pub total_responses: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub uptime_secs: u64,
    pub cache_enabled: bool,
    pub storage_stats: StorageStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<MemoryUsage>,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.server.environment.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        cache_enabled: state.service.cache().is_enabled(),
        storage_stats: StorageStats {
            stores: state.service.store().stores_count(),
            total_responses: state.service.store().total_responses(),
        },
        memory_usage: collect_memory_usage(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub success: bool,
    pub message: String,
    pub endpoints: BTreeMap<&'static str, &'static str>,
    pub timestamp: String,
}

/// GET /
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        success: true,
        message: format!("{} is running", SERVICE_NAME),
        endpoints: ENDPOINTS.iter().copied().collect(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn collect_memory_usage() -> Option<MemoryUsage> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = SYSTEM.get_or_init(|| Mutex::new(System::new())).lock().ok()?;

    system.refresh_memory();
    system.refresh_process(pid);

    let process_bytes = system.process(pid).map(|p| p.memory()).unwrap_or(0);
    let total = system.total_memory();
    let available = system.available_memory();
    let percent_used = if total > 0 {
        (total - available.min(total)) as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    Some(MemoryUsage {
        process_memory_mb: round2(bytes_to_mb(process_bytes)),
        available_memory_mb: round2(bytes_to_mb(available)),
        percent_used: round2(percent_used),
    })
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
