//! Inbound file validation / 上传文件校验

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils::{format_file_size, get_ext};

/// Upload mode / 上传模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Image,
    File,
}

/// Received file as seen by validators / 待校验的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    /// Payload, inspected for image headers / 文件内容
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }

    pub fn extension(&self) -> String {
        get_ext(&self.name)
    }
}

/// Validation rules / 校验规则
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub max_size: Option<u64>,
    #[serde(default)]
    pub min_size: Option<u64>,
    /// Allowed extensions (lowercase, no dot); empty allows any / 允许的扩展名
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Image limits in pixels, image mode only / 图片尺寸限制（像素）
    #[serde(default)]
    pub min_width: Option<u32>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub min_height: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
}

/// Pluggable file validator / 文件校验器
pub trait FileValidator: Send + Sync {
    /// `Err` carries the message reported to the client
    fn validate(&self, mode: UploadMode, file: &UploadedFile) -> Result<(), String>;
}

/// Rule based validator / 基于规则的校验器
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    rules: ValidationRules,
}

impl RuleValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    fn validate_file(&self, file: &UploadedFile) -> Result<(), String> {
        let ext = file.extension();

        if !self.rules.extensions.is_empty()
            && !self.rules.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        {
            return Err(format!(
                "Only files with these extensions are allowed: {}.",
                self.rules.extensions.join(", ")
            ));
        }

        if let Some(max) = self.rules.max_size {
            if file.size > max {
                return Err(format!(
                    "The file \"{}\" is too big. Its size cannot exceed {}.",
                    file.name,
                    format_file_size(max)
                ));
            }
        }

        if let Some(min) = self.rules.min_size {
            if file.size < min {
                return Err(format!(
                    "The file \"{}\" is too small. Its size cannot be smaller than {}.",
                    file.name,
                    format_file_size(min)
                ));
            }
        }

        Ok(())
    }

    /// Image check reads the header, the extension alone proves nothing / 通过文件头判断图片
    fn validate_image(&self, file: &UploadedFile) -> Result<(), String> {
        let dimensions = imagesize::blob_size(&file.content)
            .map_err(|_| format!("The file \"{}\" is not an image.", file.name))?;
        let (width, height) = (dimensions.width as u64, dimensions.height as u64);

        // (limit, actual, side, is_minimum)
        let checks = [
            (self.rules.min_width, width, "width", true),
            (self.rules.max_width, width, "width", false),
            (self.rules.min_height, height, "height", true),
            (self.rules.max_height, height, "height", false),
        ];
        for (limit, actual, side, is_minimum) in checks {
            let Some(limit) = limit.map(u64::from) else { continue };
            let (violated, size_word, bound) = if is_minimum {
                (actual < limit, "small", "smaller")
            } else {
                (actual > limit, "large", "larger")
            };
            if violated {
                return Err(format!(
                    "The image \"{}\" is too {}. The {} cannot be {} than {} {}.",
                    file.name,
                    size_word,
                    side,
                    bound,
                    limit,
                    if limit == 1 { "pixel" } else { "pixels" }
                ));
            }
        }

        Ok(())
    }
}

impl FileValidator for RuleValidator {
    fn validate(&self, mode: UploadMode, file: &UploadedFile) -> Result<(), String> {
        self.validate_file(file)?;
        if mode == UploadMode::Image {
            self.validate_image(file)?;
        }
        Ok(())
    }
}

/// Minimal PNG header (signature + IHDR) with the given size
#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data
}
