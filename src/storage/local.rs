use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use super::traits::{DownloadOptions, Storage};

/// 本地文件系统存储实现
///
/// 文件通过 HTTP 层的 `/files` 路由对外提供，不支持限时链接。
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(base_path: impl AsRef<Path>, base_url: &str) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        // 确保基础目录存在
        std::fs::create_dir_all(&base_path).context("Failed to create base directory")?;

        Ok(Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 获取文件的完整路径，拒绝跳出基础目录的键
    fn get_full_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            anyhow::bail!("Invalid storage key: {}", key);
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let path = self.get_full_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create parent directory")?;
        }

        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.get_full_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read file"),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.get_full_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn get_presigned_url(
        &self,
        key: &str,
        _expires: Duration,
        _options: &DownloadOptions,
    ) -> Result<String> {
        // 本地存储不支持临时URL，返回永久URL
        Ok(format!("{}/{}", self.base_url, key.trim_start_matches('/')))
    }

    async fn health_check(&self) -> Result<bool> {
        self.base_path
            .try_exists()
            .context("Failed to check base directory")
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
