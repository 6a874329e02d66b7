//! In-process object store / 内存对象存储
//!
//! Used for local development (`provider = "memory"`) and as the transport
//! double in tests: it counts calls and can be switched into a failing mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{ErrorKind, StorageError};
use crate::storage::{
    Acl, DeleteOutcome, ObjectPage, ObjectTransport, PutObjectRequest, StoredObject,
    TransportCredentials, TransportFactory,
};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Stored object with its payload / 内存中的对象
#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub body: Bytes,
    pub content_type: String,
    pub acl: Acl,
    pub last_modified: DateTime<Utc>,
}

/// Call counters / 调用计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCalls {
    pub put: usize,
    pub delete: usize,
    pub list: usize,
}

impl TransportCalls {
    pub fn total(&self) -> usize {
        self.put + self.delete + self.list
    }
}

pub struct MemoryTransport {
    /// (bucket, key) -> object, ordered like an S3 listing
    objects: RwLock<BTreeMap<(String, String), MemoryObject>>,
    page_size: usize,
    versioned: bool,
    failure: RwLock<Option<ErrorKind>>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            versioned: false,
            failure: RwLock::new(None),
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        }
    }

    /// Max objects per listing page / 每页最大对象数
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Behave like a versioned bucket (deletes leave a marker) / 模拟开启版本控制
    pub fn versioned(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    /// Fail every following call with `kind` / 之后的调用全部失败
    pub fn fail_with(&self, kind: ErrorKind) {
        *self.failure.write() = Some(kind);
    }

    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    pub fn calls(&self) -> TransportCalls {
        TransportCalls {
            put: self.puts.load(Ordering::SeqCst),
            delete: self.deletes.load(Ordering::SeqCst),
            list: self.lists.load(Ordering::SeqCst),
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<MemoryObject> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        match *self.failure.read() {
            Some(kind) => Err(StorageError::new(kind, "simulated failure")),
            None => Ok(()),
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let object = MemoryObject {
            body: request.body,
            content_type: request.content_type,
            acl: request.acl,
            last_modified: Utc::now(),
        };
        self.objects.write().insert((request.bucket, request.key), object);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteOutcome, StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        self.objects.write().remove(&(bucket.to_string(), key.to_string()));
        Ok(DeleteOutcome { delete_marker: self.versioned })
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StorageError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let objects = self.objects.read();
        // Continuation token is the last key of the previous page
        let mut matching = objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .filter(|((_, k), _)| continuation.as_deref().map_or(true, |after| k.as_str() > after))
            .map(|((_, key), object)| StoredObject {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: object.last_modified,
            });

        let page: Vec<StoredObject> = matching.by_ref().take(self.page_size).collect();
        let has_more = matching.next().is_some();
        let next_continuation = if has_more {
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectPage { objects: page, next_continuation })
    }
}

/// Memory transport factory; every resolver shares one store / 内存传输工厂
pub struct MemoryTransportFactory {
    transport: Arc<MemoryTransport>,
}

impl MemoryTransportFactory {
    pub fn new() -> Self {
        Self::with_transport(Arc::new(MemoryTransport::new()))
    }

    pub fn with_transport(transport: Arc<MemoryTransport>) -> Self {
        Self { transport }
    }
}

impl Default for MemoryTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for MemoryTransportFactory {
    fn provider(&self) -> &'static str {
        "memory"
    }

    fn create_transport(
        &self,
        _credentials: &TransportCredentials,
    ) -> Result<Arc<dyn ObjectTransport>, StorageError> {
        Ok(self.transport.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(bucket: &str, key: &str) -> PutObjectRequest {
        PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body: Bytes::from_static(b"data"),
            content_type: "text/plain".to_string(),
            acl: Acl::Private,
        }
    }

    #[tokio::test]
    async fn test_pagination() {
        let transport = MemoryTransport::new().page_size(2);
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            transport.put_object(put("bkt", key)).await.unwrap();
        }

        let first = transport.list_page("bkt", "a/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_continuation.as_deref(), Some("a/2"));

        let second = transport.list_page("bkt", "a/", first.next_continuation).await.unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "a/3");
        assert_eq!(second.objects[0].size, 4);
        assert!(second.next_continuation.is_none());
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let transport = MemoryTransport::new();
        transport.put_object(put("one", "k")).await.unwrap();
        assert!(transport.list_page("two", "", None).await.unwrap().objects.is_empty());
        assert_eq!(transport.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_mode_counts_calls() {
        let transport = MemoryTransport::new();
        transport.fail_with(ErrorKind::Transport);
        assert!(transport.put_object(put("bkt", "k")).await.is_err());
        assert!(transport.is_empty());
        assert_eq!(transport.calls(), TransportCalls { put: 1, delete: 0, list: 0 });
    }
}
