//! Object storage facade / 对象存储门面
//!
//! Wraps one bucket plus a key prefix. Every transport failure comes back
//! as an `Err(StorageError)`; nothing is retried here.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::{
    Acl, ClientResolver, ObjectStream, PutObjectRequest, TransportCredentials, TransportFactory,
    TransportRegistry, UploadRequest, UploadResult,
};
use crate::error::{ConfigError, StorageError};

/// Storage configuration / 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Transport provider ("s3" or "memory") / 传输提供方
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    /// Prepended to every managed key / 所有对象键的前缀
    #[serde(default)]
    pub prefix: String,
    /// Custom endpoint (MinIO, OSS, ...) / 自定义端点
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Use path style instead of virtual hosted style / 使用路径风格
    #[serde(default)]
    pub path_style: bool,
}

fn default_provider() -> String {
    "s3".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            access_key: String::new(),
            secret_key: String::new(),
            region: default_region(),
            bucket: String::new(),
            prefix: String::new(),
            endpoint: None,
            path_style: false,
        }
    }
}

impl StorageConfig {
    /// Fail fast on missing bucket or credentials / 校验必填项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::MissingField("bucket"));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingField("region"));
        }
        // The in-process store has nothing to authenticate against
        if self.provider != "memory" {
            if self.access_key.trim().is_empty() {
                return Err(ConfigError::MissingField("access_key"));
            }
            if self.secret_key.trim().is_empty() {
                return Err(ConfigError::MissingField("secret_key"));
            }
        }
        Ok(())
    }

    fn credentials(&self) -> TransportCredentials {
        TransportCredentials {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone().filter(|e| !e.trim().is_empty()),
            path_style: self.path_style,
        }
    }
}

/// Object storage facade / 对象存储门面
pub struct ObjectStorage {
    config: StorageConfig,
    resolver: ClientResolver,
}

impl ObjectStorage {
    /// Create from config, picking the transport from the registry / 根据配置创建
    pub fn new(config: StorageConfig, registry: &TransportRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let factory = registry.get_factory(&config.provider)?;
        Ok(Self::build(config, factory))
    }

    /// Create with an explicit transport factory / 使用指定工厂创建
    pub fn with_factory(
        config: StorageConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, factory))
    }

    fn build(config: StorageConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let resolver = ClientResolver::new(config.credentials(), factory);
        Self { config, resolver }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Full object key for a target name / 获取完整对象键
    pub fn object_key(&self, target_name: &str) -> String {
        format!("{}{}", self.config.prefix, target_name)
    }

    fn bucket_or_default<'a>(&'a self, bucket: Option<&'a str>) -> &'a str {
        match bucket {
            Some(b) if !b.is_empty() => b,
            _ => &self.config.bucket,
        }
    }

    /// Upload a local file publicly readable, returns its public URL / 上传文件
    pub async fn upload_file(
        &self,
        source_path: impl AsRef<Path>,
        target_name: &str,
        bucket: Option<&str>,
    ) -> UploadResult {
        let request = UploadRequest::new(source_path.as_ref(), target_name);
        self.upload(&request, bucket).await
    }

    /// Upload with full control over content type and visibility / 上传（完整参数）
    pub async fn upload(&self, request: &UploadRequest, bucket: Option<&str>) -> UploadResult {
        let bucket = self.bucket_or_default(bucket);
        let key = self.object_key(&request.target_name);

        let result = self.put(request, bucket, &key).await;
        match &result {
            Ok(url) => tracing::debug!("Uploaded {} to {} ({})", key, bucket, url),
            Err(e) => tracing::warn!("Upload of {} to {} failed: {}", key, bucket, e),
        }
        result
    }

    async fn put(&self, request: &UploadRequest, bucket: &str, key: &str) -> UploadResult {
        if request.target_name.is_empty() {
            return Err(StorageError::invalid_input("empty target name"));
        }

        // Handle is opened and closed inside this call
        let body = tokio::fs::read(&request.source_path).await.map_err(|e| {
            StorageError::invalid_input(format!(
                "cannot read {}: {}",
                request.source_path.display(),
                e
            ))
        })?;

        let content_type = match &request.content_type {
            Some(ct) => ct.clone(),
            None => infer_content_type(&request.source_path, &request.target_name),
        };

        let client = self.resolver.client()?;
        client
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body: Bytes::from(body),
                content_type,
                acl: if request.is_public { Acl::PublicRead } else { Acl::Private },
            })
            .await?;

        Ok(self.get_object_url(Some(bucket), key))
    }

    /// Delete an object; `Ok(true)` when a delete marker was produced / 删除文件
    pub async fn remove_file(&self, target_name: &str, bucket: Option<&str>) -> Result<bool, StorageError> {
        let bucket = self.bucket_or_default(bucket);
        let key = self.object_key(target_name);

        let client = self.resolver.client()?;
        match client.delete_object(bucket, &key).await {
            Ok(outcome) => {
                tracing::debug!("Deleted {} from {} (marker: {})", key, bucket, outcome.delete_marker);
                Ok(outcome.delete_marker)
            }
            Err(e) => {
                tracing::warn!("Delete of {} from {} failed: {}", key, bucket, e);
                Err(e)
            }
        }
    }

    /// Lazily list objects under the effective prefix / 惰性列举对象
    ///
    /// Nothing is fetched until the stream is polled; each call starts a
    /// fresh listing from the first page.
    pub fn list_files(&self, prefix: Option<&str>, bucket: Option<&str>) -> Result<ObjectStream, StorageError> {
        let client = self.resolver.client()?;
        let bucket = self.bucket_or_default(bucket).to_string();
        let prefix = prefix.unwrap_or(&self.config.prefix).to_string();

        let pages = stream::unfold(PageCursor::Start, move |cursor| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            async move {
                let continuation = match cursor {
                    PageCursor::Start => None,
                    PageCursor::Next(token) => Some(token),
                    PageCursor::Done => return None,
                };
                match client.list_page(&bucket, &prefix, continuation).await {
                    Ok(page) => {
                        let next = match page.next_continuation {
                            Some(token) => PageCursor::Next(token),
                            None => PageCursor::Done,
                        };
                        let items: Vec<_> = page.objects.into_iter().map(Ok).collect();
                        Some((stream::iter(items), next))
                    }
                    Err(e) => {
                        tracing::warn!("Listing {} under '{}' failed: {}", bucket, prefix, e);
                        Some((stream::iter(vec![Err(e)]), PageCursor::Done))
                    }
                }
            }
        });

        Ok(pages.flatten().boxed())
    }

    /// Public URL for bucket + key, no network call / 构造公开访问URL
    pub fn get_object_url(&self, bucket: Option<&str>, key: &str) -> String {
        let bucket = self.bucket_or_default(bucket);
        let key = encode_key(key);
        let region = self.resolver.region();

        match self.config.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                if self.config.path_style {
                    format!("{}/{}/{}", endpoint, bucket, key)
                } else {
                    let (scheme, host) = endpoint.split_once("://").unwrap_or(("https", endpoint));
                    format!("{}://{}.{}/{}", scheme, bucket, host, key)
                }
            }
            None if self.config.path_style => {
                format!("https://s3.{}.amazonaws.com/{}/{}", region, bucket, key)
            }
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
        }
    }
}

enum PageCursor {
    Start,
    Next(String),
    Done,
}

/// Percent-encode each key segment, keeping `/` / 对键的每一段做URL编码
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Guess the MIME type from the source path, then the target name / 推断内容类型
fn infer_content_type(source: &Path, target_name: &str) -> String {
    mime_guess::from_path(source)
        .first()
        .or_else(|| mime_guess::from_path(target_name).first())
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
