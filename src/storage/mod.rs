use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Stored object metadata produced by listing / 列举得到的对象信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Canned ACL applied on upload / 上传时使用的ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    Private,
    PublicRead,
}

impl Acl {
    /// Value for the `x-amz-acl` header / x-amz-acl 头的值
    pub fn as_header(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }
}

/// Single put request handed to a transport / 上传请求
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    pub acl: Acl,
}

/// Delete result / 删除结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// True when the delete produced a tombstone version (versioned buckets)
    pub delete_marker: bool,
}

/// One page of a listing / 列举结果的一页
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<StoredObject>,
    /// Continuation token for the next page, `None` on the last page
    pub next_continuation: Option<String>,
}

/// Lazy, forward-only object listing / 惰性对象列表
pub type ObjectStream = BoxStream<'static, Result<StoredObject, StorageError>>;

/// Outcome of an upload: public URL or a categorized failure / 上传结果
pub type UploadResult = Result<String, StorageError>;

/// Per-call upload request. The source file is read within the call and never retained.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source_path: PathBuf,
    pub target_name: String,
    /// Explicit content type; inferred from the file names when `None`
    pub content_type: Option<String>,
    pub is_public: bool,
}

impl UploadRequest {
    pub fn new(source_path: impl Into<PathBuf>, target_name: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_name: target_name.into(),
            content_type: None,
            is_public: true,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Credentials and endpoint used to build a transport client / 传输客户端凭证
#[derive(Debug, Clone, Default)]
pub struct TransportCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub path_style: bool,
}

/// Storage provider client / 对象存储传输接口
///
/// Implementations only move bytes; key composition, URL building and
/// pagination chaining live in [`ObjectStorage`].
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Provider name / 提供方名称
    fn name(&self) -> &str;

    /// Create or overwrite an object / 创建或覆盖对象
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StorageError>;

    /// Delete an object / 删除对象
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteOutcome, StorageError>;

    /// Fetch one listing page / 获取一页列举结果
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StorageError>;
}

/// Transport factory, one per provider / 传输工厂
pub trait TransportFactory: Send + Sync {
    /// Provider name used in configuration / 配置中使用的提供方名称
    fn provider(&self) -> &'static str;

    /// Build a client. Called at most once per resolver.
    fn create_transport(
        &self,
        credentials: &TransportCredentials,
    ) -> Result<Arc<dyn ObjectTransport>, StorageError>;
}

pub mod manager;
pub mod object_storage;
pub mod resolver;

pub use manager::TransportRegistry;
pub use object_storage::{ObjectStorage, StorageConfig};
pub use resolver::ClientResolver;
