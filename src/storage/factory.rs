use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::local::LocalStorage;
use super::memory::MemoryStorage;
use super::s3::{S3Config as InternalS3Config, S3Storage};
use super::traits::Storage;

/// 存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    S3,
    Local,
    Memory,
}

impl std::str::FromStr for StorageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown storage type: {}", other)),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(rename = "type", default = "default_storage_type")]
    pub storage_type: StorageType,

    /// 本地存储配置
    #[serde(default)]
    pub local: Option<LocalConfig>,

    /// S3存储配置
    #[serde(default)]
    pub s3: Option<S3Config>,
}

fn default_storage_type() -> StorageType {
    StorageType::S3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: default_storage_type(),
            local: None,
            s3: Some(S3Config::default()),
        }
    }
}

/// 本地存储配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    pub base_path: String,
    pub base_url: String,
}

/// S3存储配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// 兼容 S3 协议的自建端点（MinIO 等）
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub root: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            root: None,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// 创建存储实例
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.storage_type {
        StorageType::Local => {
            let local_config = config
                .local
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Local storage configuration missing"))?;

            let storage = LocalStorage::new(&local_config.base_path, &local_config.base_url)?;

            tracing::info!("Local storage initialized at: {}", local_config.base_path);
            Ok(Arc::new(storage))
        }

        StorageType::S3 => {
            let s3_config = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 configuration missing"))?;

            let internal_config = InternalS3Config {
                bucket: s3_config.bucket.clone(),
                region: s3_config.region.clone(),
                endpoint: s3_config.endpoint.clone(),
                access_key_id: s3_config.access_key_id.clone(),
                secret_access_key: s3_config.secret_access_key.clone(),
                root: s3_config.root.clone(),
            };

            let storage = S3Storage::new(internal_config)?;

            tracing::info!("S3 storage initialized for bucket: {}", s3_config.bucket);
            Ok(Arc::new(storage))
        }

        StorageType::Memory => {
            tracing::warn!("Memory storage in use, merged files are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
