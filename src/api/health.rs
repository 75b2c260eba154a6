//! 健康检查接口

use crate::build_info;
use crate::model::{DetailedHealthStatus, HealthStatus};
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use std::time::Duration;
use tracing::warn;

const STORAGE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 基本健康检查
pub async fn basic_health_check() -> impl IntoResponse {
    let mut resp = Json(HealthStatus {
        status: "ok".to_string(),
    })
    .into_response();
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    resp
}

/// 详细健康检查，附带版本与存储探测结果
pub async fn detailed_health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage_healthy =
        match tokio::time::timeout(STORAGE_PROBE_TIMEOUT, state.storage.health_check()).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                warn!(event = "health.storage_failed", backend = state.storage.backend_name(), error = %e);
                false
            }
            Err(_) => {
                warn!(event = "health.storage_timeout", backend = state.storage.backend_name());
                false
            }
        };

    Json(DetailedHealthStatus {
        status: if storage_healthy { "ok" } else { "degraded" }.to_string(),
        version: build_info::summary(),
        storage_healthy,
        timestamp: Utc::now().to_rfc3339(),
    })
}
