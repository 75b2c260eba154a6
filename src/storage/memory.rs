use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

use super::traits::{DownloadOptions, Storage};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// 进程内存储，用于测试与无外部依赖的本地调试
///
/// 生成的链接形如 `memory:///<key>?expires=<秒>&...`，只在进程内有意义。
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_writes: AtomicBool,
    fail_presign: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入时记录的内容类型
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .get(key)
            .map(|object| object.content_type.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// 让后续写入失败，模拟存储不可用
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 让后续链接签发失败
    pub fn fail_presign(&self, fail: bool) {
        self.fail_presign.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("memory storage rejected write: {}", key);
        }
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().get(key).map(|object| object.data.clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().contains_key(key))
    }

    async fn get_presigned_url(
        &self,
        key: &str,
        expires: Duration,
        options: &DownloadOptions,
    ) -> Result<String> {
        if self.fail_presign.load(Ordering::SeqCst) {
            anyhow::bail!("memory storage refused to presign: {}", key);
        }
        let mut url = Url::parse("memory:///")?.join(key.trim_start_matches('/'))?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.as_secs().to_string())
            .append_pair("response-content-type", &options.content_type)
            .append_pair("response-content-disposition", &options.content_disposition);
        Ok(url.to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_and_fail_writes() {
        let storage = MemoryStorage::new();
        storage.put("a/b.pdf", b"data", "application/pdf").await.unwrap();
        assert!(storage.exists("a/b.pdf").await.unwrap());
        assert_eq!(storage.get("a/b.pdf").await.unwrap().unwrap(), b"data");
        assert!(storage.get("missing").await.unwrap().is_none());

        storage.fail_writes(true);
        assert!(storage.put("a/c.pdf", b"x", "application/pdf").await.is_err());
        assert_eq!(storage.object_count(), 1);
    }

    #[tokio::test]
    async fn test_presigned_url_carries_expiry_and_filename() {
        let storage = MemoryStorage::new();
        let options = DownloadOptions::attachment("application/pdf", "report.pdf");
        let url = storage
            .get_presigned_url("jobs/1/merged/ab_report.pdf", Duration::from_secs(900), &options)
            .await
            .unwrap();
        assert!(url.starts_with("memory:///jobs/1/merged/ab_report.pdf?"));
        assert!(url.contains("expires=900"));
        assert!(url.contains("filename%3D%22report.pdf%22"));

        storage.fail_presign(true);
        assert!(storage
            .get_presigned_url("jobs/1/merged/ab_report.pdf", Duration::from_secs(900), &options)
            .await
            .is_err());
    }
}
