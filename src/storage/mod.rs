// 存储抽象层模块

pub mod factory;
pub mod local;
pub mod memory;
pub mod s3;
pub mod traits;

pub use factory::{create_storage, StorageConfig, StorageType};
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use s3::S3Storage;
pub use traits::{DownloadOptions, Storage};
