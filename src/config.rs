//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件
//! Credentials may come from the environment instead / 凭证可由环境变量覆盖

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::validation::ValidationRules;
use crate::error::ConfigError;
use crate::storage::StorageConfig;

/// Global configuration instance / 全局配置实例
static CONFIG: OnceCell<Arc<RwLock<AppConfig>>> = OnceCell::new();

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration / 对象存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload actions configuration / 上传动作配置
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port / 服务器端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body limit for uploads, `null` disables it / 上传请求体大小限制
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: Option<usize>,
}

/// Both upload actions / 两个上传动作
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub images: UploadActionConfig,
    #[serde(default)]
    pub files: UploadActionConfig,
}

/// One upload action / 单个上传动作配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadActionConfig {
    /// Rename to a sharded unique path / 重命名为唯一路径
    #[serde(default = "default_true")]
    pub unique: bool,
    /// Multipart field carrying the file / 文件字段名
    #[serde(default = "default_upload_param")]
    pub upload_param: String,
    /// Prefix for the returned link instead of the storage URL / 返回链接的前缀
    #[serde(default)]
    pub base_url: Option<String>,
    /// Add the failure category to error reports / 在错误结果中附带错误类别
    #[serde(default)]
    pub expose_error_kind: bool,
    #[serde(default)]
    pub rules: ValidationRules,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8180
}

fn default_max_upload_bytes() -> Option<usize> {
    Some(32 * 1024 * 1024)
}

fn default_true() -> bool {
    true
}

fn default_upload_param() -> String {
    "file".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for UploadActionConfig {
    fn default() -> Self {
        Self {
            unique: true,
            upload_param: default_upload_param(),
            base_url: None,
            expose_error_kind: false,
            rules: ValidationRules::default(),
        }
    }
}

impl AppConfig {
    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Override storage settings from the environment / 使用环境变量覆盖存储配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let storage = &mut self.storage;
        let fields: [(&str, &mut String); 6] = [
            ("STORAGE_PROVIDER", &mut storage.provider),
            ("AWS_ACCESS_KEY_ID", &mut storage.access_key),
            ("AWS_SECRET_ACCESS_KEY", &mut storage.secret_key),
            ("S3_REGION", &mut storage.region),
            ("S3_BUCKET", &mut storage.bucket),
            ("S3_PREFIX", &mut storage.prefix),
        ];
        for (name, field) in fields {
            if let Some(value) = lookup(name) {
                *field = value;
            }
        }
        if let Some(endpoint) = lookup("S3_ENDPOINT") {
            storage.endpoint = Some(endpoint);
        }
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from a specific path / 从指定路径加载配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, content)?;
    Ok(())
}

/// Initialize global configuration / 初始化全局配置
pub fn init_config() -> Result<Arc<RwLock<AppConfig>>, ConfigError> {
    init_config_from(&get_config_path())
}

/// Initialize global configuration from a specific path / 从指定路径初始化全局配置
pub fn init_config_from(config_path: &Path) -> Result<Arc<RwLock<AppConfig>>, ConfigError> {
    let config_arc = Arc::new(RwLock::new(load_config_from(config_path)?));
    // A second init keeps the first instance
    Ok(CONFIG.get_or_init(|| config_arc).clone())
}

/// Get global configuration instance / 获取全局配置实例
pub fn get_config() -> Option<Arc<RwLock<AppConfig>>> {
    CONFIG.get().cloned()
}

/// Get a read-only snapshot of current config / 获取当前配置的只读快照
pub fn config() -> AppConfig {
    CONFIG.get().map(|c| c.read().clone()).unwrap_or_default()
}
