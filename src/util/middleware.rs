use crate::util::log::ACCESS_TARGET;
use crate::util::logging::standards::events;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

/// 处理时间超过该值的请求额外记录一条慢请求日志
const SLOW_REQUEST_MS: u128 = 5_000;

/// 响应中回传请求ID的头
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 请求ID，放入请求扩展供处理函数读取
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
}

fn extract_user_agent(headers: &HeaderMap) -> &str {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

fn parse_content_length(headers: &HeaderMap) -> usize {
    headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

fn is_quiet_path(path: &str) -> bool {
    const QUIET_EXACT: &[&str] = &["/health", "/health/details", "/favicon.ico"];
    const QUIET_PREFIX: &[&str] = &["/static", "/files"];

    QUIET_EXACT.contains(&path) || QUIET_PREFIX.iter().any(|prefix| path.starts_with(prefix))
}

// 统一请求日志中间件
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers();
    let user_agent = extract_user_agent(headers).to_string();
    let client_ip = extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string());
    let request_size = parse_content_length(headers);
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let quiet_path = is_quiet_path(uri.path());
    if !quiet_path {
        tracing::debug!(
            target: ACCESS_TARGET,
            event = events::REQUEST_START,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            query = uri.query().unwrap_or(""),
            user_agent = %user_agent,
            client_ip = %client_ip
        );
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    let duration = start_time.elapsed();
    let status = response.status();
    let response_size = parse_content_length(response.headers());
    let query = uri.query().unwrap_or("");

    if status.is_server_error() {
        tracing::error!(
            target: ACCESS_TARGET,
            event = events::REQUEST_ERROR,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            query = query,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            response_bytes = response_size,
            user_agent = %user_agent,
            client_ip = %client_ip
        );
    } else if status.is_client_error() && !quiet_path {
        tracing::warn!(
            target: ACCESS_TARGET,
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            query = query,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            response_bytes = response_size,
            client_ip = %client_ip
        );
    } else if quiet_path {
        tracing::debug!(
            target: ACCESS_TARGET,
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64
        );
    } else {
        tracing::info!(
            target: ACCESS_TARGET,
            event = events::REQUEST_COMPLETE,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            query = query,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            request_bytes = request_size,
            response_bytes = response_size,
            user_agent = %user_agent,
            client_ip = %client_ip
        );
    }

    if !quiet_path && duration.as_millis() > SLOW_REQUEST_MS {
        tracing::warn!(
            target: ACCESS_TARGET,
            event = events::REQUEST_SLOW,
            request_id = %request_id,
            method = %method,
            path = %uri.path(),
            duration_ms = duration.as_millis() as u64,
            status = status.as_u16()
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_quiet_paths() {
        assert!(is_quiet_path("/health"));
        assert!(is_quiet_path("/files/jobs/a.pdf"));
        assert!(!is_quiet_path("/merge"));
    }
}
