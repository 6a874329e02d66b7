//! Key and naming utility functions / 对象键与命名工具函数

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;

/// Per-process counter mixed into generated names / 进程内序号
static NAME_SEQUENCE: AtomicU64 = AtomicU64::new(0);

const SIZE_LABELS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Get file extension (lowercase) / 获取文件扩展名
pub fn get_ext(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Directory marker: zero-byte object whose key ends with `/` / 目录占位对象
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with('/')
}

/// Human readable size (B|KB|MB|GB) / 格式化文件大小
///
/// The unit is picked from the decimal digit count, not from log1024:
/// `factor = (digits - 1) / 3`. So 1000..=1023 bytes print as "1.0 KB" and
/// 1_000_000..=1_048_575 as "1.0 MB". Sizes past GB stay in GB.
pub fn format_file_size(size: u64) -> String {
    let digits = size.to_string().len();
    let factor = ((digits - 1) / 3).min(SIZE_LABELS.len() - 1);
    // Half-up to one decimal; `{:.1}` alone rounds ties to even
    let value = (size as f64 / 1024f64.powi(factor as i32) * 10.0).round() / 10.0;
    format!("{:.1} {}", value, SIZE_LABELS[factor])
}

/// Generate a sharded unique object name: `h[0]/h[1]/h[2]/h.ext` / 生成分片的唯一文件名
///
/// `h` is md5(name_random_timestamp_sequence). Not cryptographic, only
/// meant to spread keys and avoid collisions.
pub fn unique_object_name(original_name: &str, ext: &str) -> String {
    let nonce: u32 = rand::thread_rng().gen_range(100000..=999999);
    let timestamp = Utc::now().timestamp();
    let sequence = NAME_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let hash = format!(
        "{:x}",
        md5::compute(format!("{}_{}_{}_{}", original_name, nonce, timestamp, sequence))
    );
    format!("{}/{}/{}/{}.{}", &hash[0..1], &hash[1..2], &hash[2..3], hash, ext)
}
