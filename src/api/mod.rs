mod error;
mod health;
mod merge;

pub use error::ApiError;

use crate::storage::StorageType;
use crate::util::middleware;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::{HeaderValue, Response};
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::fs::ServeFileSystemResponseBody;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

/// 创建CORS配置
fn create_cors_layer(port: u16) -> CorsLayer {
    // 从环境变量读取允许的域名，默认为本地开发
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| format!("http://localhost:{port},http://127.0.0.1:{port}"));

    info!("[global] CORS配置 - 允许的源: {}", allowed_origins);

    CorsLayer::new()
        .allow_origin(
            allowed_origins
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| match s.trim().parse() {
                    Ok(origin) => Some(origin),
                    Err(e) => {
                        warn!("无效的CORS源: {} - {}", s, e);
                        None
                    }
                })
                .collect::<Vec<_>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true)
}

pub fn routes(app_state: AppState) -> Router {
    let config = app_state.config.clone();

    let merge_routes = Router::new()
        .route("/merge", post(merge::merge_files))
        .route("/merge/from-upload", post(merge::merge_files))
        .layer(DefaultBodyLimit::max(config.merge.max_upload_bytes()));

    let mut router = Router::new()
        .merge(merge_routes)
        .route("/health", get(health::basic_health_check))
        .route("/health/details", get(health::detailed_health_check));

    // 本地存储没有预签名能力，由本服务直接提供下载，链接不过期
    if config.storage.storage_type == StorageType::Local {
        if let Some(local) = config.storage.local.as_ref() {
            info!("[folder] 本地存储文件路由: /files -> {}", local.base_path);
            let files = SetResponseHeader::overriding(
                ServeDir::new(&local.base_path),
                CONTENT_DISPOSITION,
                |response: &Response<ServeFileSystemResponseBody>| {
                    response
                        .status()
                        .is_success()
                        .then(|| HeaderValue::from_static("attachment"))
                },
            );
            router = router.nest_service("/files", files);
        }
    }

    let static_service =
        ServeDir::new(&config.static_dir).append_index_html_on_directories(true);

    let timeout_secs = match config.server.request_timeout_secs {
        0 => 120,
        secs => secs,
    };

    router
        .fallback_service(static_service)
        .with_state(app_state)
        .layer(from_fn(middleware::request_logging_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(timeout_secs)))
        .layer(create_cors_layer(config.server.port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::normalize::fixtures::{jpeg, pdf_with_pages};
    use crate::storage::factory::LocalConfig;
    use crate::storage::{LocalStorage, MemoryStorage, Storage, StorageConfig};
    use crate::util::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "merge-test-boundary";

    fn test_app() -> (Router, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let mut config = Config::default();
        config.static_dir = "does-not-exist".to_string();
        let state = AppState::new(config, storage.clone());
        (routes(state), storage)
    }

    fn multipart_body(files: &[(&str, Vec<u8>)], fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn merge_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_health_details_reports_storage() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::get("/health/details").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["storage_healthy"], true);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_merge_success() {
        let (app, storage) = test_app();
        let body = multipart_body(
            &[
                ("a.pdf", pdf_with_pages("a", 2)),
                ("photo.jpg", jpeg(20, 10)),
            ],
            &[("filename", "bundle.pdf"), ("expires_in", "120")],
        );

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));

        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["total_pages"], 3);
        assert_eq!(body["errors"], serde_json::json!([]));
        assert!(body["url"].as_str().unwrap().contains("expires=120"));
        let key = body["key"].as_str().unwrap();
        assert!(key.ends_with("_bundle.pdf"));
        assert!(key.starts_with(&format!("jobs/{}/merged/", body["batch_id"].as_str().unwrap())));
        assert!(storage.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_reports_soft_failures() {
        let (app, _) = test_app();
        let body = multipart_body(
            &[
                ("notes.txt", b"hello".to_vec()),
                ("doc.pdf", pdf_with_pages("d", 1)),
            ],
            &[],
        );

        let response = app
            .oneshot(merge_request("/merge/from-upload?filename=q.pdf", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["total_pages"], 1);
        assert_eq!(
            body["errors"],
            serde_json::json!([{"file": "notes.txt", "reason": "unsupported media type"}])
        );
        assert!(body["key"].as_str().unwrap().ends_with("_q.pdf"));
    }

    #[tokio::test]
    async fn test_merge_without_files() {
        let (app, storage) = test_app();
        let response = app
            .oneshot(merge_request("/merge", multipart_body(&[], &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "Please select at least one file"
        );
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_budget_exceeded_writes_nothing() {
        let (app, storage) = test_app();
        let body = multipart_body(
            &[
                ("one.pdf", pdf_with_pages("x", 6)),
                ("two.pdf", pdf_with_pages("y", 6)),
            ],
            &[],
        );

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "Exceeds total page limit: 10"
        );
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_all_files_rejected() {
        let (app, storage) = test_app();
        let body = multipart_body(&[("bad.pdf", b"garbage".to_vec())], &[]);

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "There are no valid pages to merge"
        );
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_expires_in() {
        let (app, _) = test_app();
        let body = multipart_body(
            &[("a.pdf", pdf_with_pages("a", 1))],
            &[("expires_in", "tomorrow")],
        );

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("expires_in"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_bad_gateway() {
        let (app, storage) = test_app();
        storage.fail_writes(true);
        let body = multipart_body(&[("a.pdf", pdf_with_pages("a", 1))], &[]);

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(json_body(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_presign_failure_writes_nothing() {
        let (app, storage) = test_app();
        storage.fail_presign(true);
        let body = multipart_body(&[("a.pdf", pdf_with_pages("a", 1))], &[]);

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_request_never_publishes() {
        let (app, storage) = test_app();
        let body = multipart_body(
            &[
                ("a.pdf", pdf_with_pages("a", 4)),
                ("scan.jpg", jpeg(1200, 1200)),
                ("b.pdf", pdf_with_pages("b", 4)),
            ],
            &[],
        );

        // 请求只被轮询一次就被丢弃，相当于客户端在合并过程中断开
        tokio::select! {
            biased;
            _ = app.oneshot(merge_request("/merge", body)) => {
                panic!("merge finished within a single poll");
            }
            _ = std::future::ready(()) => {}
        }

        // 阻塞线程池中的合并任务仍会跑完，但结果无人接收
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_filename_is_sanitized() {
        let (app, _) = test_app();
        let body = multipart_body(
            &[("a.pdf", pdf_with_pages("a", 1))],
            &[("filename", "   ")],
        );

        let response = app.oneshot(merge_request("/merge", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(json_body(response).await["key"]
            .as_str()
            .unwrap()
            .ends_with("__"));
    }

    #[tokio::test]
    async fn test_local_files_are_served_as_attachment() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base_path = temp_dir.path().to_string_lossy().to_string();
        let storage = Arc::new(
            LocalStorage::new(&base_path, "http://localhost:8000/files").unwrap(),
        );
        let key = "jobs/abc/merged/0011aabb_report.pdf";
        storage.put(key, b"%PDF-1.5", "application/pdf").await.unwrap();

        let mut config = Config::default();
        config.static_dir = "does-not-exist".to_string();
        config.storage = StorageConfig {
            storage_type: StorageType::Local,
            local: Some(LocalConfig {
                base_path,
                base_url: "http://localhost:8000/files".to_string(),
            }),
            s3: None,
        };
        let app = routes(AppState::new(config, storage));

        let response = app
            .clone()
            .oneshot(Request::get(format!("/files/{key}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-disposition"], "attachment");
        assert_eq!(response.headers()["content-type"], "application/pdf");

        let missing = app
            .oneshot(Request::get("/files/jobs/none.pdf").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(!missing.headers().contains_key("content-disposition"));
    }
}
