//! 服务器模块
//!
//! - 配置管理 (config.rs)
//! - 存储系统初始化 (storage.rs)
//! - HTTP服务器设置 (http.rs)

pub mod config;
pub mod http;
pub mod storage;

pub use config::ConfigManager;
pub use http::{HttpServer, ServerManager};
pub use storage::{StorageHealth, StorageInitializer};

use crate::build_info;
use crate::util::config::{Config, ValidationReport};
use crate::AppState;
use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// 服务器引导程序 - 统一的服务器启动入口
pub struct ServerBootstrap {
    config: Config,
    _log_guard: Option<WorkerGuard>,
}

impl ServerBootstrap {
    /// 加载配置、初始化日志并检查配置
    pub async fn new() -> Result<Self> {
        let (config, validation_report) = ConfigManager::load_and_validate()?;
        let log_guard = ConfigManager::initialize_logging(&config)?;

        ConfigManager::log_validation_report(&validation_report);
        Self::ensure_valid(&validation_report)?;

        info!("[ok] 服务器引导程序初始化完成");
        Ok(Self {
            config,
            _log_guard: log_guard,
        })
    }

    fn ensure_valid(report: &ValidationReport) -> Result<()> {
        if report.has_errors() {
            let details: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
            return Err(anyhow::anyhow!(
                "配置验证失败: {} 个错误: {}",
                report.errors.len(),
                details.join("; ")
            ));
        }
        Ok(())
    }

    /// 启动服务器
    pub async fn start(self) -> Result<()> {
        info!("=== PDF合并服务启动 ===");
        info!("版本信息: {}", build_info::summary());
        info!(
            "监听: {}:{}，单批页数上限: {}",
            self.config.server.host, self.config.server.port, self.config.merge.max_pages
        );

        let app_state = self.create_app_state().await?;
        let server = ServerManager::create_server(&self.config.server, app_state).await?;
        ServerManager::start_server(server).await
    }

    /// 创建应用状态
    async fn create_app_state(&self) -> Result<AppState> {
        info!("[build] 创建应用状态...");
        let storage = StorageInitializer::create_from_config(&self.config).await?;
        Ok(AppState::new(self.config.clone(), storage))
    }

    /// 执行系统健康检查
    pub async fn health_check(&self) -> Result<SystemHealthReport> {
        let storage = StorageInitializer::create_from_config(&self.config).await?;
        let storage_health = StorageInitializer::health_check(&storage).await;

        Ok(SystemHealthReport {
            overall_healthy: storage_health.is_healthy,
            version: build_info::summary(),
            storage_health,
        })
    }
}

/// 系统健康报告
#[derive(Debug, Clone)]
pub struct SystemHealthReport {
    pub overall_healthy: bool,
    pub version: String,
    pub storage_health: StorageHealth,
}

/// 便捷函数：启动服务器
pub async fn start_server() -> Result<()> {
    let bootstrap = ServerBootstrap::new().await?;
    bootstrap.start().await
}

/// 便捷函数：执行健康检查
pub async fn check_system_health() -> Result<SystemHealthReport> {
    let bootstrap = ServerBootstrap::new().await?;
    bootstrap.health_check().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::ConfigValidator;

    #[test]
    fn test_invalid_config_blocks_startup() {
        let report = ConfigValidator::validate_all(&Config::default());
        let err = ServerBootstrap::ensure_valid(&report).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET env is missing"));
    }
}
