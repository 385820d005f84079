//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `WatermarkHandler` 只负责流程编排，外部协作者（设置存储、Logo 来源、编码器）全部注入。
//! 处理链路固定为：
//! 1. 配置闸门：读取设置快照，未启用或 MIME 不支持时直接放行
//! 2. 加载并解码 Logo 与底图
//! 3. 水印等比缩放
//! 4. 计算落点
//! 5. Alpha 合成
//! 6. 编码并原子写回
//!
//! ## 实现思路
//!
//! - 单次上传内只读取一次设置，闸门与 Logo 查找共用同一份快照，避免处理中途配置漂移。
//! - 每个阶段的图像缓冲都以所有权向下传递，离开作用域即释放（含提前返回与错误分支）。
//! - 记录 `decode/scale/composite/encode/total` 阶段耗时，便于性能诊断。
//! - `process` 是上传钩子的入口：吞掉所有错误，永远原样返回上传描述。

use std::path::Path;
use std::time::Instant;

use crate::settings::SettingsStore;

use super::compositor::composite;
use super::encoder::{StandardEncoder, UploadEncoder, write_atomically};
use super::placement::{Placement, resolve_placement};
use super::source::UploadFormat;
use super::{ImageConfig, ImageError, ImageSource, LogoSource, UploadedFile, WatermarkConfig};

/// 单次处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkOutcome {
    /// 配置闸门放行，文件未被触碰。
    Skipped,
    /// 已写回加水印后的文件。
    Watermarked {
        width: u32,
        height: u32,
        placement: Placement,
    },
}

/// 水印处理器。
pub struct WatermarkHandler {
    config: ImageConfig,
    settings: Box<dyn SettingsStore>,
    logo: Box<dyn LogoSource>,
    encoder: Box<dyn UploadEncoder>,
}

impl WatermarkHandler {
    /// 根据引擎配置与外部协作者创建处理器，默认使用 `StandardEncoder`。
    ///
    /// # 示例
    /// ```rust
    /// use logo_watermark::settings::StaticSettings;
    /// use logo_watermark::watermark::{ImageConfig, ImageSource, UploadedFile, WatermarkHandler};
    ///
    /// let handler = WatermarkHandler::new(
    ///     ImageConfig::default(),
    ///     Box::new(StaticSettings::default()),
    ///     Box::new(ImageSource::parse("/srv/site/logo.png")),
    /// );
    /// let upload = UploadedFile::new("/tmp/photo.jpg", "image/jpeg");
    /// assert_eq!(handler.process(upload.clone()), upload);
    /// ```
    pub fn new(
        config: ImageConfig,
        settings: Box<dyn SettingsStore>,
        logo: Box<dyn LogoSource>,
    ) -> Self {
        Self {
            config,
            settings,
            logo,
            encoder: Box::new(StandardEncoder),
        }
    }

    /// 替换编码器。
    pub fn with_encoder(mut self, encoder: Box<dyn UploadEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// 上传钩子入口。
    ///
    /// 水印是尽力而为的：任何失败都只记录日志，原文件保持不变，描述原样返回。
    pub fn process(&self, upload: UploadedFile) -> UploadedFile {
        match self.apply(&upload) {
            Ok(outcome) => log::debug!("水印处理结果：{:?}", outcome),
            Err(err) if err.is_decode_class() => {
                log::warn!("⚠️ 跳过水印（输入不可用）- 文件: {} 原因: {}", upload.file.display(), err);
            }
            Err(err) => {
                log::warn!("⚠️ 水印处理失败，保留原文件 - 文件: {} 原因: {}", upload.file.display(), err);
            }
        }

        upload
    }

    /// 执行完整流程并返回结果，供需要区分结果的调用方与测试使用。
    pub fn apply(&self, upload: &UploadedFile) -> Result<WatermarkOutcome, ImageError> {
        let settings = self.settings.load();
        let Some(watermark_config) = WatermarkConfig::gate(settings.as_ref(), &upload.mime_type) else {
            return Ok(WatermarkOutcome::Skipped);
        };
        let logo_source = settings.as_ref().and_then(|settings| self.logo.logo(settings));

        self.watermark_file(&upload.file, &watermark_config, logo_source.as_ref())
    }

    /// 对指定文件加水印（已通过配置闸门）。
    ///
    /// `logo_source` 为 `None` 表示站点未配置 Logo。
    pub fn watermark_file(
        &self,
        path: &Path,
        watermark_config: &WatermarkConfig,
        logo_source: Option<&ImageSource>,
    ) -> Result<WatermarkOutcome, ImageError> {
        let config = &self.config;
        let total_start = Instant::now();

        let format = UploadFormat::from_path(path)?;
        let logo_source = logo_source.ok_or(ImageError::MissingLogo)?;

        let decode_start = Instant::now();
        let raw_logo = self.load_source(logo_source, config)?;
        let watermark = self.decode_watermark(raw_logo, config)?;
        let raw_upload = Self::load_from_file(path, config)?;
        let (base, base_color) = self.decode_upload(raw_upload, format, config)?;
        let decode_elapsed = decode_start.elapsed();

        let scale_start = Instant::now();
        let watermark = self.scale_watermark(watermark, base.width(), watermark_config.target_width, config)?;
        let scale_elapsed = scale_start.elapsed();

        let composite_start = Instant::now();
        let placement = resolve_placement(
            base.dimensions(),
            watermark.dimensions(),
            watermark_config.anchor,
            watermark_config.margin_px,
        );
        let composited = composite(base, &watermark, placement, watermark_config.opacity_percent);
        drop(watermark);
        let composite_elapsed = composite_start.elapsed();

        let encode_start = Instant::now();
        write_atomically(path, |out| self.encoder.encode(&composited, format, base_color, out))?;
        let encode_elapsed = encode_start.elapsed();

        let (width, height) = composited.dimensions();
        log::info!(
            "✅ 水印完成 - 文件: {} 尺寸: {}x{} 落点: ({}, {}) decode={}ms scale={}ms composite={}ms encode={}ms total={}ms",
            path.display(),
            width,
            height,
            placement.x,
            placement.y,
            decode_elapsed.as_millis(),
            scale_elapsed.as_millis(),
            composite_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(WatermarkOutcome::Watermarked {
            width,
            height,
            placement,
        })
    }
}
