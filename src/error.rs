//! Error types / 错误类型
//!
//! Configuration errors are fatal at startup. Storage errors are values:
//! the facade never lets a transport failure escape as a panic.

use serde::Serialize;
use thiserror::Error;

/// Configuration error (fatal at init) / 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required storage setting: {0}")]
    MissingField(&'static str),
    #[error("unknown transport provider: {0}")]
    UnknownProvider(String),
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Storage failure category / 存储错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    NotFound,
    Permission,
    InvalidInput,
}

impl ErrorKind {
    /// Classify an HTTP status returned by the provider / 根据HTTP状态码分类
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::Permission,
            400 => ErrorKind::InvalidInput,
            _ => ErrorKind::Transport,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Permission => "permission",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

/// Storage error returned by the facade and transports / 存储错误
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", kind.as_str())]
pub struct StorageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(ErrorKind::from_status(status), format!("HTTP {}: {}", status, body.into()))
    }
}

/// Boolean-compatible view for callers pinned to the collapsed contract
/// (URL or `false`, marker or `false`) / 兼容旧调用方的布尔视图
pub trait LegacyResult {
    type Output;

    fn legacy(self) -> Self::Output;
}

impl LegacyResult for Result<String, StorageError> {
    type Output = Option<String>;

    fn legacy(self) -> Option<String> {
        self.ok()
    }
}

impl LegacyResult for Result<bool, StorageError> {
    type Output = bool;

    fn legacy(self) -> bool {
        self.unwrap_or(false)
    }
}
