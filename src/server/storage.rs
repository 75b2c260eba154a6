//! 存储系统初始化模块
//! 负责根据配置创建存储实例并执行连接检查

use crate::storage::{self, Storage};
use crate::util::config::Config;
use crate::util::logging::standards::events;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// 存储系统初始化器
pub struct StorageInitializer;

impl StorageInitializer {
    /// 根据配置创建存储实例
    pub async fn create_from_config(config: &Config) -> Result<Arc<dyn Storage>> {
        info!("[storage] 初始化存储系统...");
        let storage = storage::create_storage(&config.storage).await?;
        info!(
            event = events::STORAGE_INIT,
            backend = storage.backend_name()
        );
        Ok(storage)
    }

    /// 执行存储系统健康检查
    pub async fn health_check(storage: &Arc<dyn Storage>) -> StorageHealth {
        let start_time = Instant::now();
        let result = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, storage.health_check()).await;
        let response_time_ms = start_time.elapsed().as_millis() as u64;

        let (is_healthy, error_message) = match result {
            Ok(Ok(true)) => (true, None),
            Ok(Ok(false)) => (false, Some("存储健康检查未通过".to_string())),
            Ok(Err(e)) => (false, Some(e.to_string())),
            Err(_) => (false, Some("存储健康检查超时".to_string())),
        };

        if let Some(message) = error_message.as_deref() {
            warn!(
                event = "storage.health_failed",
                backend = storage.backend_name(),
                error = %message
            );
        }

        StorageHealth {
            backend: storage.backend_name(),
            is_healthy,
            response_time_ms,
            error_message,
        }
    }
}

/// 存储健康状态
#[derive(Debug, Clone)]
pub struct StorageHealth {
    pub backend: &'static str,
    pub is_healthy: bool,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageType;

    #[tokio::test]
    async fn test_memory_storage_health() {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Memory;

        let storage = StorageInitializer::create_from_config(&config)
            .await
            .unwrap();
        let health = StorageInitializer::health_check(&storage).await;
        assert!(health.is_healthy);
        assert_eq!(health.backend, "memory");
        assert!(health.error_message.is_none());
    }
}
