use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::merge::error::Rejection;
use crate::util::config::MergeSettings;
use crate::util::naming;

/// 一次合并请求
///
/// 请求开始时创建，响应发送后丢弃；除存储键外不做持久化。
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub batch_id: String,
    pub output_filename: String,
    pub ttl: Duration,
}

impl BatchJob {
    pub fn new(filename: Option<&str>, expires_in: Option<i64>, settings: &MergeSettings) -> Self {
        let output_filename = filename
            .filter(|name| !name.is_empty())
            .unwrap_or(&settings.default_filename)
            .to_string();
        let expires_in = expires_in.unwrap_or(settings.default_expires_in);

        Self {
            batch_id: naming::generate_batch_id(),
            output_filename,
            ttl: Duration::from_secs(settings.clamp_ttl(expires_in)),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }
}

/// 单个上传文件的处理状态
///
/// `Received → Rejected | Normalized → Admitted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Received,
    Normalized { pages: u32 },
    Admitted { pages: u32 },
    Rejected(Rejection),
}

impl ItemStatus {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ItemStatus::Rejected(_))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            ItemStatus::Normalized { .. } | ItemStatus::Admitted { .. }
        )
    }
}

/// 上传的单个文件，仅归属于处理它的批次
#[derive(Debug, Clone)]
pub struct InputItem {
    /// 原始文件名（已去掉路径部分，仍视为不可信）
    pub name: String,
    /// 小写扩展名，不含点
    pub extension: String,
    pub data: Vec<u8>,
    pub status: ItemStatus,
}

impl InputItem {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        let name = naming::base_name(name).to_string();
        let extension = naming::extension_of(&name);
        Self {
            name,
            extension,
            data,
            status: ItemStatus::Received,
        }
    }
}

/// 软失败记录，顺序与输入顺序一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file: String,
    pub reason: String,
}

/// 合并流水线产物，交给输出发布器
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub total_pages: u32,
    pub errors: Vec<ErrorRecord>,
}

/// 对外可见的合并结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedResult {
    pub url: String,
    pub batch_id: String,
    pub storage_key: String,
    pub total_pages: u32,
    pub errors: Vec<ErrorRecord>,
}

/// `POST /merge` 成功响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResponse {
    pub ok: bool,
    pub url: String,
    pub batch_id: String,
    pub key: String,
    pub total_pages: u32,
    pub errors: Vec<ErrorRecord>,
}

impl From<PublishedResult> for MergeResponse {
    fn from(result: PublishedResult) -> Self {
        Self {
            ok: true,
            url: result.url,
            batch_id: result.batch_id,
            key: result.storage_key,
            total_pages: result.total_pages,
            errors: result.errors,
        }
    }
}

/// 错误响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

// 健康检查相关的数据结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthStatus {
    pub status: String,
    pub version: String,
    pub storage_healthy: bool,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_item_strips_path_and_lowercases_extension() {
        let item = InputItem::new("C:\\Users\\me\\Scan.PDF", vec![1]);
        assert_eq!(item.name, "Scan.PDF");
        assert_eq!(item.extension, "pdf");
        assert_eq!(item.status, ItemStatus::Received);
    }

    #[test]
    fn test_batch_job_defaults_and_clamps() {
        let settings = MergeSettings::default();

        let job = BatchJob::new(None, None, &settings);
        assert_eq!(job.output_filename, "merged.pdf");
        assert_eq!(job.ttl_secs(), 900);
        assert_eq!(job.batch_id.len(), naming::BATCH_ID_LEN);

        let job = BatchJob::new(Some(""), Some(10), &settings);
        assert_eq!(job.output_filename, "merged.pdf");
        assert_eq!(job.ttl_secs(), 60);

        // 只有空值才回退默认名，空白名交给清洗处理
        let job = BatchJob::new(Some("  "), None, &settings);
        assert_eq!(job.output_filename, "  ");
        assert_eq!(naming::sanitize_filename(&job.output_filename), "_");

        let job = BatchJob::new(Some("report.pdf"), Some(999_999_999), &settings);
        assert_eq!(job.output_filename, "report.pdf");
        assert_eq!(job.ttl_secs(), 604_800);

        let job = BatchJob::new(None, Some(-5), &settings);
        assert_eq!(job.ttl_secs(), 60);
    }

    #[test]
    fn test_batch_ids_are_unique_per_request() {
        let settings = MergeSettings::default();
        let a = BatchJob::new(None, None, &settings);
        let b = BatchJob::new(None, None, &settings);
        assert_ne!(a.batch_id, b.batch_id);
    }

    #[test]
    fn test_merge_response_shape() {
        let response = MergeResponse::from(PublishedResult {
            url: "https://example/x".into(),
            batch_id: "abc".into(),
            storage_key: "jobs/abc/merged/1_merged.pdf".into(),
            total_pages: 2,
            errors: vec![ErrorRecord {
                file: "a.txt".into(),
                reason: "unsupported media type".into(),
            }],
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["key"], "jobs/abc/merged/1_merged.pdf");
        assert_eq!(json["total_pages"], 2);
        assert_eq!(json["errors"][0]["file"], "a.txt");
    }
}
