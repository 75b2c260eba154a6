//! 配置管理模块
//! 负责配置文件的查找、加载、验证与日志初始化

use crate::util::config::{Config, ConfigLoader, ConfigValidator, ValidationReport};
use crate::util::log::log_init_with_config;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "pdf-merge-server";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 加载和验证配置
    pub fn load_and_validate() -> Result<(Config, ValidationReport)> {
        let config_path = Self::find_config_file_path("config.yaml");

        let config = match ConfigLoader::load_with_env_overrides(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[warn] 配置文件读取失败: {} - {}", config_path.display(), e);
                Self::handle_config_load_failure(&config_path)?
            }
        };

        let report = ConfigValidator::validate_all(&config);
        Ok((config, report))
    }

    /// 初始化日志系统；未启用文件日志时返回 None
    pub fn initialize_logging(config: &Config) -> Result<Option<WorkerGuard>> {
        let guard = log_init_with_config(LOG_FILE_PREFIX, &config.logging)?;
        info!("[ok] 日志系统初始化完成");
        Ok(guard)
    }

    /// 输出验证结果
    pub fn log_validation_report(report: &ValidationReport) {
        for error in &report.errors {
            warn!(event = "config.validate.error", "{}", error);
        }
        for warning in &report.warnings {
            warn!(event = "config.validate.warning", "{}", warning);
        }
        for item in &report.info {
            info!(event = "config.validate.info", "{}", item);
        }
    }

    /// 查找配置文件路径：`./config/`、`../config/`、`./`
    pub fn find_config_file_path(filename: &str) -> PathBuf {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::find_config_file_in(&current_dir, filename)
    }

    fn find_config_file_in(current_dir: &Path, filename: &str) -> PathBuf {
        let config_in_current = current_dir.join("config").join(filename);
        if config_in_current.exists() {
            return config_in_current;
        }

        // 在 bin/ 目录启动时使用上级目录的 config/
        if let Some(parent) = current_dir.parent() {
            let config_in_parent = parent.join("config").join(filename);
            if config_in_parent.exists() {
                return config_in_parent;
            }
        }

        let dev_path = current_dir.join(filename);
        if dev_path.exists() {
            return dev_path;
        }

        // 都不存在时在 config/ 下生成模板
        config_in_current
    }

    /// 处理配置加载失败
    fn handle_config_load_failure(config_path: &Path) -> Result<Config> {
        if !config_path.exists() {
            eprintln!("[note] 创建默认配置文件: {}", config_path.display());
            let template = ConfigLoader::generate_template();
            if let Err(write_err) = template.write_yaml_to_path(config_path) {
                eprintln!("[fail] 创建默认配置文件失败: {}", write_err);
            }
            Ok(ConfigLoader::apply_env_overrides(template))
        } else {
            Err(anyhow::anyhow!(
                "配置文件解析失败: {}",
                config_path.display()
            ))
        }
    }
}
