//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `UploadedFile` 表示上传钩子传入/传出的描述（路径 + 声明的 MIME）
//! - `ImageSource` 表示 Logo 的外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `UploadFormat` 表示底图按扩展名识别出的编码格式

use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ImageError;

/// 上传描述。
///
/// 流水线从不修改其中的路径与 MIME，只会替换路径处的文件内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(rename = "filePath")]
    pub file: PathBuf,
    pub mime_type: String,
}

impl UploadedFile {
    pub fn new(file: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Logo 输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 网络地址来源。
    Url(String),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(PathBuf),
}

impl ImageSource {
    /// 将配置中的 Logo 字符串解析为来源。
    ///
    /// - `http://` / `https://` 前缀 → `Url`
    /// - `data:` 前缀 → `Base64`
    /// - 其余一律按本地路径处理
    ///
    /// 空字符串视为“未配置”。
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(Self::Url(value.to_string()))
        } else if lower.starts_with("data:") {
            Some(Self::Base64(value.to_string()))
        } else {
            Some(Self::FilePath(PathBuf::from(value)))
        }
    }
}

/// Logo 来源协作者。
///
/// `settings` 是本次上传已读取的设置快照，来源可以从中取值，不应再次读取设置存储。
/// 返回 `None` 表示站点尚未配置 Logo，本次上传将跳过水印。
pub trait LogoSource {
    fn logo(&self, settings: &Map<String, Value>) -> Option<ImageSource>;
}

/// 固定来源（或固定“未配置”）。
impl LogoSource for Option<ImageSource> {
    fn logo(&self, _settings: &Map<String, Value>) -> Option<ImageSource> {
        self.clone()
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 底图格式，按文件扩展名（大小写不敏感）识别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Jpeg,
    Png,
}

impl UploadFormat {
    /// `jpg` 与 `jpeg` 视为同义。
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(ImageError::InvalidFormat(format!(
                "不支持的图片扩展名：{:?}（可选：jpg / jpeg / png）",
                other
            ))),
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}
