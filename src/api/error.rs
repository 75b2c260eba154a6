//! HTTP 错误映射
//!
//! 所有失败响应体都是 `{"detail": "<message>"}`。

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::merge::MergeError;
use crate::model::ErrorBody;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<MergeError> for ApiError {
    fn from(err: MergeError) -> Self {
        let status = match &err {
            MergeError::NoFilesSupplied
            | MergeError::BudgetExceeded { .. }
            | MergeError::NoValidPages
            | MergeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MergeError::Storage(_) => StatusCode::BAD_GATEWAY,
            MergeError::Assembly(_) | MergeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        // 超出请求体上限时为 413，其余按格式错误处理
        let status = match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}
