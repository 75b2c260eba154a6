//! 配置验证模块
//! 启动前检查配置，错误阻止启动，警告只记录日志

use super::types::*;
use crate::storage::StorageType;

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 全面验证配置
    pub fn validate_all(config: &Config) -> ValidationReport {
        let mut report = ValidationReport::new();

        Self::validate_server_config(&config.server, &mut report);
        Self::validate_merge_config(&config.merge, &mut report);
        Self::validate_storage_config(config, &mut report);
        Self::validate_logging_config(&config.logging, &mut report);

        report
    }

    fn validate_server_config(server: &ServerConfig, report: &mut ValidationReport) {
        if server.port == 0 {
            report.add_error("server.port", "无效的端口号: 0");
        }
        if server.host.trim().is_empty() {
            report.add_error("server.host", "监听地址不能为空");
        }
        if server.request_timeout_secs == 0 {
            report.add_warning("server.request_timeout_secs", "请求超时为0，将使用默认值");
        }
    }

    fn validate_merge_config(merge: &MergeSettings, report: &mut ValidationReport) {
        if merge.max_pages == 0 {
            report.add_error("merge.max_pages", "总页数上限必须大于0");
        }
        if merge.min_expires_in > merge.max_expires_in {
            report.add_error(
                "merge.min_expires_in",
                &format!(
                    "有效期下限 {} 大于上限 {}",
                    merge.min_expires_in, merge.max_expires_in
                ),
            );
        }
        if merge.max_expires_in > 604_800 {
            report.add_warning("merge.max_expires_in", "S3 预签名链接最长 7 天");
        }
        if merge.max_upload_mb == 0 {
            report.add_error("merge.max_upload_mb", "上传大小上限必须大于0");
        }
        if merge.default_filename.trim().is_empty() {
            report.add_warning("merge.default_filename", "默认文件名为空，将被替换为 file");
        }
    }

    fn validate_storage_config(config: &Config, report: &mut ValidationReport) {
        match config.storage.storage_type {
            StorageType::S3 => match config.storage.s3.as_ref() {
                Some(s3) if !s3.bucket.trim().is_empty() => {
                    if s3.access_key_id.is_empty() {
                        report.add_info("storage.s3", "未配置访问密钥，使用默认凭证链");
                    }
                }
                _ => report.add_error("storage.s3.bucket", "S3_BUCKET env is missing"),
            },
            StorageType::Local => {
                if config.storage.local.is_none() {
                    report.add_error("storage.local", "本地存储配置缺失");
                }
            }
            StorageType::Memory => {
                report.add_warning("storage.type", "内存存储仅用于调试，重启后文件丢失");
            }
        }
    }

    fn validate_logging_config(logging: &LoggingConfig, report: &mut ValidationReport) {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&logging.level.to_ascii_lowercase().as_str()) {
            report.add_warning(
                "logging.level",
                &format!("未知的日志级别: {}，将按过滤表达式解析", logging.level),
            );
        }
        if logging.file.enabled && logging.file.directory.trim().is_empty() {
            report.add_error("logging.file.directory", "启用文件日志时目录不能为空");
        }
    }
}

/// 验证报告
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    pub fn add_info(&mut self, field: &str, message: &str) {
        self.info.push(ValidationIssue::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }
}

/// 验证问题
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
