use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::Method,
    Json,
};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::UploadActionConfig;
use crate::error::ErrorKind;
use crate::storage::{ObjectStorage, UploadRequest};
use crate::utils::unique_object_name;

use super::validation::{FileValidator, RuleValidator, UploadMode, UploadedFile};
use super::ActionError;

/// Message reported for any storage failure / 上传失败的提示
pub const UPLOAD_FAILED_MESSAGE: &str = "File can not be uploaded.";

const MISSING_FILE_MESSAGE: &str = "Please upload a file.";

/// Upload report sent back to the editor / 上传结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadReport {
    Uploaded {
        filelink: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
    },
}

impl UploadReport {
    fn failed(error: impl Into<String>) -> Self {
        UploadReport::Failed { error: error.into(), kind: None }
    }
}

/// File received from the multipart body, spooled to a temp file / 接收到的文件
pub struct ReceivedFile {
    pub file: UploadedFile,
    spool: NamedTempFile,
}

/// Upload action / 上传动作
pub struct UploadAction {
    storage: Arc<ObjectStorage>,
    mode: UploadMode,
    unique: bool,
    upload_param: String,
    base_url: Option<String>,
    expose_error_kind: bool,
    validator: Arc<dyn FileValidator>,
}

impl UploadAction {
    pub fn new(storage: Arc<ObjectStorage>, mode: UploadMode) -> Self {
        Self {
            storage,
            mode,
            unique: true,
            upload_param: "file".to_string(),
            base_url: None,
            expose_error_kind: false,
            validator: Arc::new(RuleValidator::default()),
        }
    }

    pub fn from_config(storage: Arc<ObjectStorage>, mode: UploadMode, config: &UploadActionConfig) -> Self {
        Self::new(storage, mode)
            .unique(config.unique)
            .upload_param(&config.upload_param)
            .base_url(config.base_url.clone())
            .expose_error_kind(config.expose_error_kind)
            .validator(Arc::new(RuleValidator::new(config.rules.clone())))
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn upload_param(mut self, name: &str) -> Self {
        self.upload_param = name.to_string();
        self
    }

    pub fn base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url.filter(|b| !b.is_empty());
        self
    }

    pub fn expose_error_kind(mut self, expose: bool) -> Self {
        self.expose_error_kind = expose;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn FileValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Pull the upload field out of the multipart body / 读取上传字段
    pub async fn receive(&self, mut multipart: Multipart) -> Result<Option<ReceivedFile>, ActionError> {
        while let Some(field) = multipart.next_field().await.map_err(|e| ActionError::BadRequest(e.body_text()))? {
            if field.name() != Some(self.upload_param.as_str()) {
                continue;
            }
            let name = field.file_name().unwrap_or("").to_string();
            let data = field.bytes().await.map_err(|e| ActionError::BadRequest(e.body_text()))?;
            if name.is_empty() && data.is_empty() {
                return Ok(None);
            }

            let spool = NamedTempFile::new()?;
            tokio::fs::write(spool.path(), &data).await?;
            return Ok(Some(ReceivedFile {
                file: UploadedFile::new(name, data),
                spool,
            }));
        }
        Ok(None)
    }

    /// Validate, rename, store and report / 校验、重命名、上传并返回结果
    pub async fn process(&self, received: Option<ReceivedFile>) -> UploadReport {
        let received = match received {
            Some(r) => r,
            None => return UploadReport::failed(MISSING_FILE_MESSAGE),
        };

        if let Err(message) = self.validator.validate(self.mode, &received.file) {
            tracing::debug!("Upload rejected: {} ({})", received.file.name, message);
            return UploadReport::failed(message);
        }

        let original = &received.file.name;
        let ext = received.file.extension();
        let target_name = if self.unique && !ext.is_empty() {
            unique_object_name(original, &ext)
        } else {
            original.clone()
        };

        let content_type = mime_guess::from_path(original).first_or_octet_stream().to_string();
        let request = UploadRequest::new(received.spool.path(), target_name.as_str()).content_type(content_type);

        // Spool is removed when `received` drops at the end of this call
        match self.storage.upload(&request, None).await {
            Ok(url) => {
                tracing::info!("Uploaded {} as {}", original, target_name);
                let filelink = match &self.base_url {
                    Some(base) => format!("{}{}", base, target_name),
                    None => url,
                };
                UploadReport::Uploaded {
                    filelink,
                    filename: match self.mode {
                        UploadMode::File => Some(target_name),
                        UploadMode::Image => None,
                    },
                }
            }
            Err(e) => {
                tracing::warn!("Upload of {} failed: {}", original, e);
                UploadReport::Failed {
                    error: UPLOAD_FAILED_MESSAGE.to_string(),
                    kind: self.expose_error_kind.then_some(e.kind),
                }
            }
        }
    }
}

/// POST /api/images/upload, /api/files/upload - 上传文件（仅允许POST）
pub async fn upload(
    State(action): State<Arc<UploadAction>>,
    request: Request,
) -> Result<Json<UploadReport>, ActionError> {
    if request.method() != Method::POST {
        tracing::warn!("Rejected {} request to upload action", request.method());
        return Err(ActionError::BadRequest("Only POST is allowed".to_string()));
    }

    let multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ActionError::BadRequest(e.body_text()))?;
    let received = action.receive(multipart).await?;
    Ok(Json(action.process(received).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation::{png_fixture, ValidationRules};
    use crate::drivers::memory::{MemoryTransport, MemoryTransportFactory};
    use crate::storage::{Acl, StorageConfig};
    use axum::{body::Body, http::StatusCode, routing::any, Router};
    use std::io::Write;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-REDACTOR-BOUNDARY";

    fn storage() -> (Arc<ObjectStorage>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let factory = Arc::new(MemoryTransportFactory::with_transport(transport.clone()));
        let config = StorageConfig {
            provider: "memory".to_string(),
            bucket: "assets".to_string(),
            region: "us-east-1".to_string(),
            prefix: "editor/".to_string(),
            ..Default::default()
        };
        (Arc::new(ObjectStorage::with_factory(config, factory).unwrap()), transport)
    }

    fn received(name: &str, content: &[u8]) -> ReceivedFile {
        let mut spool = NamedTempFile::new().unwrap();
        spool.write_all(content).unwrap();
        ReceivedFile {
            file: UploadedFile::new(name, content.to_vec()),
            spool,
        }
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n", field, filename).as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn app(action: UploadAction) -> Router {
        Router::new().route("/upload", any(upload)).with_state(Arc::new(action))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unique_image_upload() {
        let (storage, transport) = storage();
        let action = UploadAction::new(storage, UploadMode::Image);

        let report = action.process(Some(received("Cat.PNG", &png_fixture(64, 48)))).await;
        let filelink = match report {
            UploadReport::Uploaded { filelink, filename } => {
                assert!(filename.is_none());
                filelink
            }
            other => panic!("unexpected report: {:?}", other),
        };

        let key = filelink
            .strip_prefix("https://assets.s3.us-east-1.amazonaws.com/")
            .unwrap();
        assert!(key.starts_with("editor/"));
        assert!(key.ends_with(".png"));
        assert_eq!(key.split('/').count(), 5);

        let stored = transport.object("assets", key).unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.acl, Acl::PublicRead);
    }

    #[tokio::test]
    async fn test_file_mode_keeps_name_and_reports_filename() {
        let (storage, transport) = storage();
        let action = UploadAction::new(storage, UploadMode::File).unique(false);

        let report = action.process(Some(received("report.pdf", b"%PDF"))).await;
        assert_eq!(
            report,
            UploadReport::Uploaded {
                filelink: "https://assets.s3.us-east-1.amazonaws.com/editor/report.pdf".to_string(),
                filename: Some("report.pdf".to_string()),
            }
        );
        assert!(transport.object("assets", "editor/report.pdf").is_some());
    }

    #[tokio::test]
    async fn test_name_without_extension_is_not_renamed() {
        let (storage, transport) = storage();
        let action = UploadAction::new(storage, UploadMode::File);

        action.process(Some(received("Makefile", b"all:"))).await;
        assert!(transport.object("assets", "editor/Makefile").is_some());
    }

    #[tokio::test]
    async fn test_base_url_rewrites_link() {
        let (storage, _) = storage();
        let action = UploadAction::new(storage, UploadMode::File)
            .unique(false)
            .base_url(Some("https://cdn.example.com/editor/".to_string()));

        match action.process(Some(received("a.txt", b"a"))).await {
            UploadReport::Uploaded { filelink, .. } => assert_eq!(filelink, "https://cdn.example.com/editor/a.txt"),
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_skips_storage() {
        let (storage, transport) = storage();
        let action = UploadAction::new(storage, UploadMode::Image);

        let report = action.process(Some(received("notes.txt", b"hi"))).await;
        assert_eq!(report, UploadReport::failed("The file \"notes.txt\" is not an image."));

        let report = action.process(None).await;
        assert_eq!(report, UploadReport::failed("Please upload a file."));
        assert_eq!(transport.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_image_checks_use_file_content() {
        let (storage, transport) = storage();
        let action = UploadAction::new(storage, UploadMode::Image).validator(Arc::new(RuleValidator::new(
            ValidationRules { max_width: Some(100), ..Default::default() },
        )));

        let report = action.process(Some(received("evil.png", b"<?php echo 1;"))).await;
        assert_eq!(report, UploadReport::failed("The file \"evil.png\" is not an image."));

        let report = action.process(Some(received("big.png", &png_fixture(101, 10)))).await;
        assert_eq!(
            report,
            UploadReport::failed("The image \"big.png\" is too large. The width cannot be larger than 100 pixels.")
        );
        assert_eq!(transport.calls().total(), 0);

        let report = action.process(Some(received("small.png", &png_fixture(100, 10)))).await;
        assert!(matches!(report, UploadReport::Uploaded { .. }));
    }

    #[tokio::test]
    async fn test_storage_failure_reports_generic_message() {
        let (storage, transport) = storage();
        transport.fail_with(ErrorKind::Permission);

        let action = UploadAction::new(storage.clone(), UploadMode::File);
        let json = serde_json::to_value(action.process(Some(received("a.txt", b"a"))).await).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "File can not be uploaded." }));

        let action = UploadAction::new(storage, UploadMode::File).expose_error_kind(true);
        let json = serde_json::to_value(action.process(Some(received("a.txt", b"a"))).await).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "File can not be uploaded.", "kind": "permission" }));
        assert!(transport.is_empty());
    }

    #[tokio::test]
    async fn test_non_post_is_bad_request() {
        let (storage, transport) = storage();
        let app = app(UploadAction::new(storage, UploadMode::Image));

        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let request = axum::http::Request::builder()
                .method(method)
                .uri("/upload")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, serde_json::json!({ "error": "Only POST is allowed" }));
        }
        assert_eq!(transport.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_multipart_post_uploads() {
        let (storage, transport) = storage();
        let app = app(UploadAction::new(storage, UploadMode::File).unique(false).upload_param("upload"));

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body("upload", "hello.txt", b"hello world")))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "filelink": "https://assets.s3.us-east-1.amazonaws.com/editor/hello.txt",
                "filename": "hello.txt"
            })
        );

        let stored = transport.object("assets", "editor/hello.txt").unwrap();
        assert_eq!(&stored.body[..], b"hello world");
        assert_eq!(stored.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_multipart_without_upload_field() {
        let (storage, transport) = storage();
        let app = app(UploadAction::new(storage, UploadMode::File));

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body("other", "x.txt", b"x")))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "error": "Please upload a file." }));
        assert_eq!(transport.calls().total(), 0);
    }
}
