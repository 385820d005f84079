//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（URL / Base64 / 本地文件）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败：任何一步失败都只会让本次上传跳过水印，不会触碰原文件。
//!
//! ## 实现思路
//!
//! - URL：协议校验 + 阻塞式下载（连接/总超时）+ 内容类型 + 体积上限。
//! - Base64：格式解析 + 解码前体积估算。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 所有来源最终都经过文件签名校验（`infer`），空字节直接判定为解码失败。

use base64::{Engine as _, engine::general_purpose};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use super::source::RawImageData;
use super::{ImageConfig, ImageError, ImageSource, WatermarkHandler};

const MAX_REDIRECTS: usize = 5;

impl WatermarkHandler {
    /// 按来源加载 Logo 原始字节。
    pub(super) fn load_source(
        &self,
        source: &ImageSource,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        match source {
            ImageSource::Url(url) => Self::load_from_url(url, config),
            ImageSource::Base64(data) => Self::load_from_base64(data, config),
            ImageSource::FilePath(path) => Self::load_from_file(path, config),
        }
    }

    /// 从 URL 下载图片原始字节（同步阻塞，单次上传内只会发生一次）。
    pub(super) fn load_from_url(url: &str, config: &ImageConfig) -> Result<RawImageData, ImageError> {
        log::info!("🌐 开始下载 Logo - URL: {}", Self::redact_url_for_log(url));

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ImageError::InvalidFormat(format!("URL 格式错误：{}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageError::InvalidFormat(format!(
                "不支持的 URL 协议：{}（仅支持 http / https）",
                parsed.scheme()
            )));
        }

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.download_timeout))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ImageError::Network(format!("创建 HTTP 客户端失败：{}", e)))?;

        let response = client
            .get(parsed)
            .send()
            .map_err(|e| ImageError::Network(Self::describe_reqwest_error(&e, url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Network(format!("HTTP 状态异常：{}", status)));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !Self::is_image_content_type(content_type) {
                return Err(ImageError::InvalidFormat(format!(
                    "响应内容类型不是图片：{}",
                    content_type
                )));
            }
        }

        if let Some(length) = response.content_length() {
            if length > config.max_file_size {
                return Err(Self::file_too_large("下载内容", length, config.max_file_size));
            }
        }

        let mut bytes = Vec::new();
        response
            .take(config.max_file_size + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| ImageError::Network(format!("读取响应体失败：{}", e)))?;

        if bytes.len() as u64 > config.max_file_size {
            return Err(Self::file_too_large("下载内容", bytes.len() as u64, config.max_file_size));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "url",
        })
    }

    /// 从 Base64 字符串加载图片原始字节。
    pub(super) fn load_from_base64(data: &str, config: &ImageConfig) -> Result<RawImageData, ImageError> {
        log::info!("📝 开始解析 base64 Logo");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;
        if bytes.len() as u64 > config.max_file_size {
            return Err(Self::file_too_large("Base64 解码后", bytes.len() as u64, config.max_file_size));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "base64",
        })
    }

    /// 从本地路径加载图片原始字节。
    pub(super) fn load_from_file(path: &Path, config: &ImageConfig) -> Result<RawImageData, ImageError> {
        log::debug!("📁 读取本地图片 - 路径: {}", path.display());

        if !path.exists() {
            return Err(ImageError::FileSystem(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| ImageError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > config.max_file_size {
            return Err(Self::file_too_large("文件", metadata.len(), config.max_file_size));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| ImageError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    fn file_too_large(what: &str, size: u64, limit: u64) -> ImageError {
        ImageError::ResourceLimit(format!(
            "{}过大：{:.2} MB（限制：{:.2} MB）",
            what,
            size as f64 / 1024.0 / 1024.0,
            limit as f64 / 1024.0 / 1024.0
        ))
    }

    fn is_image_content_type(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }

    /// 日志中去掉 query 与 fragment，避免泄露签名参数。
    fn redact_url_for_log(url: &str) -> String {
        match reqwest::Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => "<invalid-url>".to_string(),
        }
    }

    fn describe_reqwest_error(error: &reqwest::Error, url: &str) -> String {
        let message = error.to_string().replace(url, &Self::redact_url_for_log(url));
        if error.is_timeout() {
            format!("下载超时：{}", message)
        } else if error.is_connect() {
            format!("连接失败：{}", message)
        } else {
            format!("请求失败：{}", message)
        }
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ImageError> {
        let len = base64_data.trim().len() as u64;
        len.checked_add(3)
            .map(|padded| padded / 4 * 3)
            .ok_or_else(|| ImageError::ResourceLimit("Base64 长度溢出".to_string()))
    }

    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, ImageError> {
        let normalized = data.trim();

        let base64_data = if normalized.starts_with("data:") {
            let base64_start = normalized
                .find(";base64,")
                .ok_or_else(|| ImageError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[base64_start + 8..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(base64_data)?;
        if estimated_len > max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(base64_data.trim())
            .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
    }

    /// 文件签名校验：空内容视为解码失败，非图片签名视为格式错误。
    pub(super) fn validate_image_signature(bytes: &[u8]) -> Result<(), ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Decode("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| ImageError::InvalidFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ImageError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}
