//! 配置结构定义模块
//! 包含服务配置的所有数据结构，每个字段都有 serde 默认值

use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub merge: MergeSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 静态页面目录，作为路由兜底
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            merge: MergeSettings::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_static_dir() -> String {
    "static".to_string()
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 单个请求的处理上限（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// 合并参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    /// 单批次允许的总页数
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_filename")]
    pub default_filename: String,
    /// 下载链接默认有效期（秒）
    #[serde(default = "default_expires_in")]
    pub default_expires_in: i64,
    #[serde(default = "default_min_expires_in")]
    pub min_expires_in: i64,
    /// S3 预签名上限为 7 天
    #[serde(default = "default_max_expires_in")]
    pub max_expires_in: i64,
    /// 请求体上限（MB）
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl MergeSettings {
    /// 将请求的有效期夹到 `[min_expires_in, max_expires_in]`
    pub fn clamp_ttl(&self, requested: i64) -> u64 {
        let min = self.min_expires_in.max(1);
        let max = self.max_expires_in.max(min);
        requested.clamp(min, max) as u64
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            default_filename: default_filename(),
            default_expires_in: default_expires_in(),
            min_expires_in: default_min_expires_in(),
            max_expires_in: default_max_expires_in(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_max_pages() -> u32 {
    10
}

fn default_filename() -> String {
    "merged.pdf".to_string()
}

fn default_expires_in() -> i64 {
    900
}

fn default_min_expires_in() -> i64 {
    60
}

fn default_max_expires_in() -> i64 {
    604_800
}

fn default_max_upload_mb() -> usize {
    50
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: LogFileConfig,
    /// 是否输出 JSON 结构化日志
    #[serde(default)]
    pub structured: Option<bool>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: LogFileConfig::default(),
            structured: Some(false),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 日志文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default)]
    pub retention_days: Option<u32>,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_log_directory(),
            retention_days: Some(7),
        }
    }
}

fn default_log_directory() -> String {
    "logs".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_ttl() {
        let settings = MergeSettings::default();
        assert_eq!(settings.clamp_ttl(900), 900);
        assert_eq!(settings.clamp_ttl(5), 60);
        assert_eq!(settings.clamp_ttl(-30), 60);
        assert_eq!(settings.clamp_ttl(10_000_000), 604_800);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.merge.max_pages, 10);
        assert_eq!(config.merge.max_upload_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.static_dir, "static");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
server:
  port: 9001
merge:
  max_pages: 20
storage:
  type: local
  local:
    base_path: ./data
    base_url: http://localhost:9001/files
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.merge.max_pages, 20);
        assert_eq!(config.merge.default_filename, "merged.pdf");
        assert_eq!(
            config.storage.storage_type,
            crate::storage::StorageType::Local
        );
    }
}
