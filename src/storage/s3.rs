use super::ObjectStorage;
use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, config::Credentials, primitives::ByteStream};
use std::sync::Arc;

/// S3兼容对象存储实现（AWS S3 / MinIO）
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Arc<Client>,
    #[allow(dead_code)]
    config: StorageConfig,
}

impl S3Storage {
    /// 创建新的存储客户端
    pub async fn new(config: StorageConfig) -> AppResult<Self> {
        // 显式凭证，不依赖进程环境
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None, // session token
            None, // expiration
            "scanpipe",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .behavior_version(BehaviorVersion::latest());

        // MinIO等兼容实现需要自定义endpoint和路径样式
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// 确保bucket存在
    pub async fn ensure_bucket(&self, bucket: &str) -> AppResult<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::debug!("Bucket '{}' 已存在", bucket);
                Ok(())
            }
            Err(_) => {
                tracing::info!("Bucket '{}' 不存在，正在创建", bucket);
                self.client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| AppError::storage(format!("创建bucket失败: {}", e)))?;
                tracing::info!("成功创建bucket: {}", bucket);
                Ok(())
            }
        }
    }

    /// 健康检查
    pub async fn health_check(&self) -> AppResult<bool> {
        match self.client.list_buckets().send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::error!("存储健康检查失败: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> AppResult<String> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request
            .send()
            .await
            .map_err(|e| AppError::storage(format!("上传对象失败: {}", e)))?;

        let etag = result.e_tag().unwrap_or("").to_string();
        tracing::info!("成功上传对象: {}/{}, ETag: {}", bucket, key, etag);

        Ok(etag)
    }

    async fn download(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::storage(format!("下载对象失败: {}", e)))?;

        let data = result
            .body
            .collect()
            .await
            .map_err(|e| AppError::storage(format!("读取对象数据失败: {}", e)))?;

        Ok(data.to_vec())
    }

    async fn exists(&self, bucket: &str, key: &str) -> AppResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::storage(format!(
                        "检查对象是否存在失败: {}",
                        service_err
                    )))
                }
            }
        }
    }
}
