//! S3传输配置

use s3::creds::Credentials;
use s3::Region;

use crate::error::StorageError;
use crate::storage::TransportCredentials;

/// Region for the credentials / 区域
/// AWS: https://s3.{region}.amazonaws.com
/// 阿里云OSS: https://oss-{region}.aliyuncs.com
/// MinIO: http://localhost:9000
pub fn region(credentials: &TransportCredentials) -> Region {
    match credentials.endpoint.as_deref() {
        Some(endpoint) if !endpoint.is_empty() => Region::Custom {
            region: credentials.region.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        },
        _ => Region::Custom {
            region: credentials.region.clone(),
            endpoint: format!("https://s3.{}.amazonaws.com", credentials.region),
        },
    }
}

/// Static credentials / 静态凭证
pub fn credentials(credentials: &TransportCredentials) -> Result<Credentials, StorageError> {
    Credentials::new(
        Some(credentials.access_key.as_str()),
        Some(credentials.secret_key.as_str()),
        None,
        None,
        None,
    )
    .map_err(|e| StorageError::invalid_input(format!("创建S3凭证失败: {}", e)))
}
