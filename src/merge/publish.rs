//! 输出发布：构造对象键，申请限时下载链接并写入对象存储
//!
//! 预签名不要求对象已存在，因此先签发链接再写入对象。
//! 存储后端的持久性、可用性与重试不在此处处理，任何存储错误都直接上抛。

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::error::MergeError;
use crate::model::{BatchJob, MergeOutput, PublishedResult};
use crate::storage::{DownloadOptions, Storage};
use crate::util::logging::standards::events;
use crate::util::naming;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// `jobs/{batch_id}/merged/{8位随机十六进制}_{清洗后的文件名}`
pub fn merged_object_key(batch_id: &str, suffix: &str, safe_filename: &str) -> String {
    format!("jobs/{batch_id}/merged/{suffix}_{safe_filename}")
}

/// 输出发布器，持有进程级共享的存储客户端
#[derive(Clone)]
pub struct OutputPublisher {
    storage: Arc<dyn Storage>,
}

impl OutputPublisher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn publish(
        &self,
        job: &BatchJob,
        output: MergeOutput,
    ) -> Result<PublishedResult, MergeError> {
        if output.total_pages == 0 {
            return Err(MergeError::NoValidPages);
        }

        let start = Instant::now();
        let safe_name = naming::sanitize_filename(&job.output_filename);
        let key = merged_object_key(&job.batch_id, &naming::generate_key_suffix(), &safe_name);

        let options = DownloadOptions::attachment(PDF_CONTENT_TYPE, &safe_name);
        let url = self
            .storage
            .get_presigned_url(&key, job.ttl, &options)
            .await
            .map_err(|e| {
                error!(
                    event = events::STORAGE_PRESIGN_FAILED,
                    batch_id = %job.batch_id,
                    key = %key,
                    error = %e
                );
                MergeError::Storage(e)
            })?;

        self.storage
            .put(&key, &output.bytes, PDF_CONTENT_TYPE)
            .await
            .map_err(|e| {
                error!(
                    event = events::STORAGE_PUT_FAILED,
                    batch_id = %job.batch_id,
                    key = %key,
                    error = %e
                );
                MergeError::Storage(e)
            })?;

        info!(
            event = events::MERGE_PUBLISHED,
            batch_id = %job.batch_id,
            key = %key,
            bytes = output.bytes.len(),
            total_pages = output.total_pages,
            ttl_secs = job.ttl_secs(),
            elapsed_ms = start.elapsed().as_millis() as u64
        );

        Ok(PublishedResult {
            url,
            batch_id: job.batch_id.clone(),
            storage_key: key,
            total_pages: output.total_pages,
            errors: output.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ErrorRecord;
    use crate::storage::MemoryStorage;
    use crate::util::config::MergeSettings;

    fn output(pages: u32) -> MergeOutput {
        MergeOutput {
            bytes: b"%PDF-1.5 fake".to_vec(),
            total_pages: pages,
            errors: vec![ErrorRecord {
                file: "x.txt".into(),
                reason: "unsupported media type".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_publish_stores_under_batch_key() {
        let storage = Arc::new(MemoryStorage::new());
        let publisher = OutputPublisher::new(storage.clone());
        let job = BatchJob::new(Some("../My Report.pdf"), Some(10), &MergeSettings::default());

        let result = publisher.publish(&job, output(2)).await.unwrap();

        let prefix = format!("jobs/{}/merged/", job.batch_id);
        assert!(result.storage_key.starts_with(&prefix));
        let tail = &result.storage_key[prefix.len()..];
        let (suffix, name) = tail.split_once('_').unwrap();
        assert_eq!(suffix.len(), naming::KEY_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, "My_Report.pdf");

        assert_eq!(result.total_pages, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            storage.get(&result.storage_key).await.unwrap().unwrap(),
            b"%PDF-1.5 fake"
        );
        assert_eq!(
            storage.content_type(&result.storage_key).as_deref(),
            Some(PDF_CONTENT_TYPE)
        );

        // ttl 已夹到下限 60 秒
        assert!(result.url.contains("expires=60"));
        assert!(result.url.contains("My_Report.pdf"));
    }

    #[tokio::test]
    async fn test_zero_pages_never_reach_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let publisher = OutputPublisher::new(storage.clone());
        let job = BatchJob::new(None, None, &MergeSettings::default());

        let err = publisher.publish(&job, output(0)).await.unwrap_err();
        assert!(matches!(err, MergeError::NoValidPages));
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_presign_failure_leaves_no_object() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_presign(true);
        let publisher = OutputPublisher::new(storage.clone());
        let job = BatchJob::new(None, None, &MergeSettings::default());
        let err = publisher.publish(&job, output(1)).await.unwrap_err();
        assert!(matches!(err, MergeError::Storage(_)));
        assert_eq!(storage.object_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_writes(true);
        let publisher = OutputPublisher::new(storage.clone());
        let job = BatchJob::new(None, None, &MergeSettings::default());

        let err = publisher.publish(&job, output(1)).await.unwrap_err();
        assert!(matches!(err, MergeError::Storage(_)));
        assert!(!err.is_client_error());
    }
}
