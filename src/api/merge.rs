//! 合并接口
//!
//! `POST /merge`（及旧路径 `/merge/from-upload`）：读取 multipart 中的 `files`，
//! 在阻塞线程池中运行合并流水线，上传结果并返回限时下载链接。

use axum::extract::{Extension, Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::ApiError;
use crate::merge::{self, MergeError};
use crate::model::{BatchJob, InputItem, MergeResponse};
use crate::util::logging::standards::events;
use crate::util::middleware::RequestId;
use crate::AppState;

/// 查询参数形式的选项，multipart 同名字段优先
#[derive(Debug, Default, Deserialize)]
pub struct MergeQuery {
    pub filename: Option<String>,
    pub expires_in: Option<String>,
}

/// 从请求中解析出的批次输入
#[derive(Debug, Default)]
struct MergeForm {
    items: Vec<InputItem>,
    filename: Option<String>,
    expires_in: Option<String>,
}

pub async fn merge_files(
    State(state): State<AppState>,
    Query(query): Query<MergeQuery>,
    request_id: Option<Extension<RequestId>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MergeResponse>), ApiError> {
    let start = Instant::now();
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_default();
    let form = read_form(multipart).await?;

    info!(
        event = events::MERGE_RECEIVED,
        request_id = %request_id,
        files = form.items.len(),
        bytes = form.items.iter().map(|item| item.data.len()).sum::<usize>()
    );

    let filename = form.filename.or(query.filename);
    let expires_in = match form.expires_in.or(query.expires_in) {
        Some(raw) => Some(parse_expires_in(&raw).inspect_err(|e| {
            warn!(
                event = events::MERGE_REJECTED_REQUEST,
                request_id = %request_id,
                reason = %e
            );
        })?),
        None => None,
    };
    let job = BatchJob::new(filename.as_deref(), expires_in, &state.config.merge);

    match run(&state, &job, form.items).await {
        Ok(response) => {
            info!(
                event = events::MERGE_COMPLETE,
                request_id = %request_id,
                batch_id = %job.batch_id,
                total_pages = response.total_pages,
                rejected = response.errors.len(),
                elapsed_ms = start.elapsed().as_millis() as u64
            );
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            if e.is_client_error() {
                warn!(
                    event = events::MERGE_FAILED,
                    request_id = %request_id,
                    batch_id = %job.batch_id,
                    kind = e.kind(),
                    error = %e
                );
            } else {
                error!(
                    event = events::MERGE_FAILED,
                    request_id = %request_id,
                    batch_id = %job.batch_id,
                    kind = e.kind(),
                    error = %e
                );
            }
            Err(e.into())
        }
    }
}

async fn run(
    state: &AppState,
    job: &BatchJob,
    mut items: Vec<InputItem>,
) -> Result<MergeResponse, MergeError> {
    if items.is_empty() {
        return Err(MergeError::NoFilesSupplied);
    }

    let max_pages = state.config.merge.max_pages;
    let output = tokio::task::spawn_blocking(move || merge::run_batch(&mut items, max_pages))
        .await
        .map_err(|e| MergeError::Internal(format!("merge task failed: {e}")))??;

    let published = state.publisher.publish(job, output).await?;
    Ok(MergeResponse::from(published))
}

async fn read_form(mut multipart: Multipart) -> Result<MergeForm, ApiError> {
    let mut form = MergeForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // 浏览器对未选择文件的输入框会提交一个空的匿名部分
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.items.push(InputItem::new(&file_name, data.to_vec()));
            }
            "filename" => form.filename = Some(field.text().await?),
            "expires_in" => form.expires_in = Some(field.text().await?),
            other => debug!("忽略未知的表单字段: {}", other),
        }
    }

    Ok(form)
}

fn parse_expires_in(raw: &str) -> Result<i64, MergeError> {
    raw.trim().parse::<i64>().map_err(|_| {
        MergeError::InvalidRequest(format!("expires_in must be an integer, got {raw:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in(" 120 ").unwrap(), 120);
        assert_eq!(parse_expires_in("-5").unwrap(), -5);
        assert!(matches!(
            parse_expires_in("soon"),
            Err(MergeError::InvalidRequest(_))
        ));
    }
}
