use anyhow::{Context, Result};
use async_trait::async_trait;
use opendal::{services::S3 as S3Service, Operator};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::traits::{DownloadOptions, Storage};

/// 健康检查探针对象
const HEALTH_PROBE_KEY: &str = ".health_check";

/// S3 兼容对象存储实现
pub struct S3Storage {
    operator: Operator,
    bucket: String,
    region: String,
}

impl S3Storage {
    pub fn new(config: S3Config) -> Result<Self> {
        info!(
            target: "storage.s3",
            event = "s3.connect.start",
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws")
        );

        let mut builder = S3Service::default()
            .root(config.root.as_deref().unwrap_or("/"))
            .bucket(&config.bucket)
            .region(&config.region);

        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            builder = builder.endpoint(endpoint);
        }
        // 未配置显式密钥时交给默认凭证链（环境变量 / 实例角色）
        if !config.access_key_id.is_empty() {
            builder = builder
                .access_key_id(&config.access_key_id)
                .secret_access_key(&config.secret_access_key);
        }

        let operator = Operator::new(builder)
            .context("Failed to build S3 operator")?
            .finish();

        info!(
            target: "storage.s3",
            event = "s3.connect.success",
            bucket = %config.bucket
        );

        Ok(Self {
            operator,
            bucket: config.bucket,
            region: config.region,
        })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let start = Instant::now();
        info!(
            target: "storage.s3",
            event = "s3.put.start",
            key = %key,
            size = data.len(),
            bucket = %self.bucket
        );

        match self
            .operator
            .write_with(key, data.to_vec())
            .content_type(content_type)
            .await
        {
            Ok(_) => {
                info!(
                    target: "storage.s3",
                    event = "s3.put.success",
                    key = %key,
                    elapsed_ms = start.elapsed().as_millis() as u64
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    target: "storage.s3",
                    event = "s3.put.failed",
                    key = %key,
                    kind = ?e.kind(),
                    error = %e
                );
                debug!("S3写入错误详情: {:?}", e);
                Err(e).context("Failed to write to S3")
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.operator.read(key).await {
            Ok(data) => Ok(Some(data.to_vec())),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => {
                debug!("S3读取: key不存在: {}", key);
                Ok(None)
            }
            Err(e) => {
                error!(
                    target: "storage.s3",
                    event = "s3.get.failed",
                    key = %key,
                    kind = ?e.kind(),
                    error = %e
                );
                Err(e).context("Failed to read from S3")
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.operator.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to check existence in S3"),
        }
    }

    async fn get_presigned_url(
        &self,
        key: &str,
        expires: Duration,
        options: &DownloadOptions,
    ) -> Result<String> {
        let request = self
            .operator
            .presign_read_with(key, expires)
            .override_content_type(&options.content_type)
            .override_content_disposition(&options.content_disposition)
            .await
            .context("Failed to presign S3 read")?;

        debug!(
            target: "storage.s3",
            event = "s3.presign.success",
            key = %key,
            expires_secs = expires.as_secs()
        );
        Ok(request.uri().to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        info!(
            target: "storage.s3",
            event = "s3.health.start",
            bucket = %self.bucket,
            region = %self.region
        );

        match self.operator.stat(HEALTH_PROBE_KEY).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => {
                // 探针不存在时尝试写入，以验证写权限
                let probe = format!(
                    "{{\"timestamp\":\"{}\",\"status\":\"healthy\"}}",
                    chrono::Utc::now().to_rfc3339()
                );
                match self
                    .operator
                    .write_with(HEALTH_PROBE_KEY, probe.into_bytes())
                    .content_type("application/json")
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(e) => {
                        warn!(
                            target: "storage.s3",
                            event = "s3.health.write_failed",
                            kind = ?e.kind(),
                            error = %e
                        );
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                warn!(
                    target: "storage.s3",
                    event = "s3.health.failed",
                    kind = ?e.kind(),
                    error = %e
                );
                Ok(false)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// S3配置
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub root: Option<String>,
}
