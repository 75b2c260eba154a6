use std::sync::Arc;

pub mod api;
pub mod build_info;
pub mod merge;
pub mod model;
pub mod server;
pub mod storage;
pub mod util;

use merge::OutputPublisher;
use storage::Storage;
use util::config::Config;

/// 应用状态结构
///
/// 存储客户端在启动时构建一次，所有请求共享。
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub publisher: OutputPublisher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Self {
        Self {
            publisher: OutputPublisher::new(storage.clone()),
            storage,
            config: Arc::new(config),
        }
    }
}

/// 智能查找配置文件路径
pub fn find_config_file_path(filename: &str) -> std::path::PathBuf {
    server::config::ConfigManager::find_config_file_path(filename)
}
