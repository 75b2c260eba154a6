//! 配置加载和管理模块
//! 处理配置文件的读取、写入与环境变量覆盖

use super::types::*;
use crate::storage::{factory::S3Config, StorageType};
use anyhow::Result;
use std::fs;
use std::path::Path;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从YAML文件读取配置
    pub fn read_yaml(path: impl AsRef<Path>) -> Result<Config> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    /// 从环境变量读取配置覆盖
    pub fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides_from(config, |name| std::env::var(name).ok())
    }

    /// 以给定的查找函数应用覆盖，便于测试
    pub fn apply_overrides_from<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        tracing::info!("[tool] 应用环境变量配置覆盖...");

        // 服务器配置覆盖
        if let Some(host) = lookup("MERGE_HOST") {
            tracing::info!("[ok] 环境变量覆盖服务器地址: {}", host);
            config.server.host = host;
        }

        if let Some(port_str) = lookup("MERGE_PORT") {
            match port_str.parse::<u16>() {
                Ok(port_num) => {
                    config.server.port = port_num;
                    tracing::info!("[ok] 环境变量覆盖服务器端口: {}", port_num);
                }
                Err(_) => tracing::warn!("[warn] MERGE_PORT 无法解析，忽略: {}", port_str),
            }
        }

        if let Some(kind) = lookup("STORAGE_TYPE") {
            match kind.parse::<StorageType>() {
                Ok(storage_type) => {
                    config.storage.storage_type = storage_type;
                    tracing::info!("[ok] 环境变量覆盖存储类型: {:?}", storage_type);
                }
                Err(e) => tracing::warn!("[warn] STORAGE_TYPE 无效，忽略: {}", e),
            }
        }

        // S3配置覆盖（安全优先）
        let s3_vars = [
            "S3_BUCKET",
            "AWS_REGION",
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "S3_ENDPOINT",
        ];
        if s3_vars.iter().any(|name| lookup(name).is_some()) {
            let s3 = config.storage.s3.get_or_insert_with(S3Config::default);

            if let Some(bucket) = lookup("S3_BUCKET") {
                tracing::info!("[ok] 环境变量覆盖S3存储桶: {}", bucket);
                s3.bucket = bucket;
            }
            if let Some(region) = lookup("AWS_REGION") {
                tracing::info!("[ok] 环境变量覆盖S3区域: {}", region);
                s3.region = region;
            }
            if let Some(key) = lookup("AWS_ACCESS_KEY_ID") {
                s3.access_key_id = key;
                tracing::info!("[ok] 环境变量覆盖S3访问密钥: [安全隐藏]");
            }
            if let Some(secret) = lookup("AWS_SECRET_ACCESS_KEY") {
                s3.secret_access_key = secret;
                tracing::info!("[ok] 环境变量覆盖S3密钥: [安全隐藏]");
            }
            if let Some(endpoint) = lookup("S3_ENDPOINT") {
                tracing::info!("[ok] 环境变量覆盖S3端点: {}", endpoint);
                s3.endpoint = Some(endpoint);
            }
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            tracing::info!("[ok] 环境变量覆盖日志级别: {}", level);
            config.logging.level = level;
        }

        config
    }

    /// 读取配置文件并应用环境变量覆盖
    pub fn load_with_env_overrides(path: impl AsRef<Path>) -> Result<Config> {
        let config = Self::read_yaml(path)?;
        Ok(Self::apply_env_overrides(config))
    }

    /// 生成配置模板
    pub fn generate_template() -> Config {
        Config::default()
    }
}

/// 配置写入器
pub struct ConfigWriter;

impl ConfigWriter {
    /// 写入配置到指定路径，确保目录存在
    pub fn write_yaml_with_dir(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml_content = serde_yaml::to_string(config)?;
        std::fs::write(path, yaml_content)?;
        Ok(())
    }
}
