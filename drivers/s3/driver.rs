//! S3传输核心实现
//!
//! 只提供原语（put, delete, list_page），签名与HTTP交给 rust-s3

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::Region;

use super::config;
use crate::error::StorageError;
use crate::storage::{DeleteOutcome, ObjectPage, ObjectTransport, PutObjectRequest, StoredObject, TransportCredentials};

/// S3传输客户端，按存储桶名缓存 Bucket
pub struct S3Transport {
    region: Region,
    credentials: Credentials,
    path_style: bool,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl S3Transport {
    pub fn new(credentials: &TransportCredentials) -> Result<Self, StorageError> {
        Ok(Self {
            region: config::region(credentials),
            credentials: config::credentials(credentials)?,
            path_style: credentials.path_style,
            buckets: RwLock::new(HashMap::new()),
        })
    }

    /// 获取（或创建）存储桶客户端，不发起网络请求
    fn bucket(&self, name: &str) -> Result<Bucket, StorageError> {
        if let Some(bucket) = self.buckets.read().get(name) {
            return Ok(bucket.clone());
        }

        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StorageError::invalid_input(format!("创建S3 Bucket失败: {}", e)))?;
        let bucket = if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        let bucket: Bucket = *bucket;
        self.buckets.write().insert(name.to_string(), bucket.clone());
        Ok(bucket)
    }
}

/// 将 rust-s3 错误归类
fn map_s3_error(error: S3Error) -> StorageError {
    match error {
        S3Error::HttpFailWithBody(status, body) => StorageError::from_status(status, body),
        other => StorageError::transport(other.to_string()),
    }
}

/// 非2xx状态码视为失败（fail-on-err 已将其转为 HttpFailWithBody，这里兜底）
fn check_status(status: u16, body: &[u8]) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StorageError::from_status(status, String::from_utf8_lossy(body)))
    }
}

fn parse_last_modified(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!("S3返回的时间无法解析: {} ({})", value, e);
            DateTime::<Utc>::default()
        })
}

#[async_trait]
impl ObjectTransport for S3Transport {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StorageError> {
        let mut bucket = self.bucket(&request.bucket)?;
        bucket.add_header("x-amz-acl", request.acl.as_header());

        tracing::debug!("S3 PutObject: bucket={}, key={}, size={}", request.bucket, request.key, request.body.len());

        let response = bucket
            .put_object_with_content_type(&request.key, &request.body, &request.content_type)
            .await
            .map_err(map_s3_error)?;
        check_status(response.status_code(), &response.bytes()[..])
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteOutcome, StorageError> {
        let client = self.bucket(bucket)?;

        tracing::debug!("S3 DeleteObject: bucket={}, key={}", bucket, key);

        let response = client.delete_object(key).await.map_err(map_s3_error)?;
        check_status(response.status_code(), &response.bytes()[..])?;

        let delete_marker = response
            .headers()
            .get("x-amz-delete-marker")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(DeleteOutcome { delete_marker })
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage, StorageError> {
        let client = self.bucket(bucket)?;

        let (result, status) = client
            .list_page(prefix.to_string(), None, continuation, None, None)
            .await
            .map_err(map_s3_error)?;
        check_status(status, &[])?;

        tracing::debug!(
            "S3 ListObjectsV2: bucket={}, prefix={}, count={}, truncated={}",
            bucket,
            prefix,
            result.contents.len(),
            result.is_truncated
        );

        let objects = result
            .contents
            .into_iter()
            .map(|obj| StoredObject {
                last_modified: parse_last_modified(&obj.last_modified),
                key: obj.key,
                size: obj.size as u64,
            })
            .collect();

        let next_continuation = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };

        Ok(ObjectPage { objects, next_continuation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_map_s3_error() {
        let err = map_s3_error(S3Error::HttpFailWithBody(404, "NoSuchKey".to_string()));
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = map_s3_error(S3Error::HttpFailWithBody(403, "AccessDenied".to_string()));
        assert_eq!(err.kind, ErrorKind::Permission);
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(200, b"").is_ok());
        assert!(check_status(204, b"").is_ok());
        assert_eq!(check_status(403, b"AccessDenied").unwrap_err().kind, ErrorKind::Permission);
        assert_eq!(check_status(500, b"").unwrap_err().kind, ErrorKind::Transport);
    }

    #[test]
    fn test_parse_last_modified() {
        let parsed = parse_last_modified("2024-03-01T12:30:00.000Z");
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T12:30:00+00:00");
        assert_eq!(parse_last_modified("garbage"), DateTime::<Utc>::default());
    }

    /// 本地假S3：所有请求都返回给定状态码和S3错误XML
    async fn stub_s3(status: u16, code: &'static str) -> String {
        use axum::http::StatusCode;

        let status = StatusCode::from_u16(status).unwrap();
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code><Message>{}</Message></Error>",
            code, code
        );
        let app = axum::Router::new().fallback(move || {
            let body = body.clone();
            async move { (status, [("content-type", "application/xml")], body) }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn stub_transport(endpoint: String) -> S3Transport {
        S3Transport::new(&TransportCredentials {
            access_key: "AKIA".to_string(),
            secret_key: "secret".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some(endpoint),
            path_style: true,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_page_keeps_error_status() {
        let transport = stub_transport(stub_s3(403, "AccessDenied").await);
        let err = transport.list_page("assets", "editor/", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permission);
        let err = transport.delete_object("assets", "editor/a.png").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permission);

        let transport = stub_transport(stub_s3(404, "NoSuchBucket").await);
        let err = transport.list_page("missing", "", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.message.contains("NoSuchBucket"));
    }

    #[test]
    fn test_bucket_cache() {
        let transport = S3Transport::new(&TransportCredentials {
            access_key: "AKIA".to_string(),
            secret_key: "secret".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            path_style: true,
        })
        .unwrap();
        transport.bucket("assets").unwrap();
        transport.bucket("assets").unwrap();
        transport.bucket("other").unwrap();
        assert_eq!(transport.buckets.read().len(), 2);
    }
}
