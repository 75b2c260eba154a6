use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 存储操作trait
///
/// 进程内只构建一个实例，通过 `Arc<dyn Storage>` 在并发请求间共享，
/// 实现方不得依赖请求级的可变状态。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 存储文件
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// 获取文件
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 检查文件是否存在
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 获取文件的临时访问URL（带过期时间）
    async fn get_presigned_url(
        &self,
        key: &str,
        expires: Duration,
        options: &DownloadOptions,
    ) -> Result<String>;

    /// 健康检查
    async fn health_check(&self) -> Result<bool>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}

/// 下载链接上覆盖的响应头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub content_type: String,
    pub content_disposition: String,
}

impl DownloadOptions {
    /// `attachment; filename="<name>"`，`name` 需已清洗
    pub fn attachment(content_type: &str, safe_filename: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            content_disposition: format!("attachment; filename=\"{safe_filename}\""),
        }
    }
}
