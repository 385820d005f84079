//! # 解码与缩放流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸（底图按扩展名指定格式，Logo 按内容猜测格式）
//! 2. 按像素 / 内存上限快速拒绝
//! 3. 完整解码为 RGBA8
//! 4. 水印按目标宽度等比缩放：`fast_image_resize` 面积平均（预乘 alpha），失败时回退 `imageops`（Box 缩小走 `thumbnail`）

use fast_image_resize as fr;
use image::{ColorType, GenericImageView, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;

use super::config::{MAX_TARGET_WIDTH, MIN_TARGET_WIDTH};
use super::source::{RawImageData, UploadFormat};
use super::{ImageConfig, ImageError, WatermarkHandler};

impl WatermarkHandler {
    /// 将上传文件字节按扩展名对应格式解码为 RGBA。
    ///
    /// 同时返回原始色彩类型，编码时据此还原通道与位深。
    pub(super) fn decode_upload(
        &self,
        raw: RawImageData,
        format: UploadFormat,
        config: &ImageConfig,
    ) -> Result<(RgbaImage, ColorType), ImageError> {
        self.decode_rgba(raw, Some(format.image_format()), config)
    }

    /// 将 Logo 字节解码为 RGBA，格式由内容猜测。
    pub(super) fn decode_watermark(
        &self,
        raw: RawImageData,
        config: &ImageConfig,
    ) -> Result<RgbaImage, ImageError> {
        self.decode_rgba(raw, None, config).map(|(image, _)| image)
    }

    fn decode_rgba(
        &self,
        raw: RawImageData,
        format: Option<ImageFormat>,
        config: &ImageConfig,
    ) -> Result<(RgbaImage, ColorType), ImageError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes, format)?;
        self.validate_pixel_limits(config, header_width, header_height)?;
        self.validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = match format {
            Some(format) => image::load_from_memory_with_format(&raw.bytes, format),
            None => image::load_from_memory(&raw.bytes),
        }
        .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::Decode(format!("图片尺寸非法：{}x{}", width, height)));
        }
        self.validate_pixel_limits(config, width, height)?;

        log::debug!(
            "🖼️ 图片解码成功 - 来源: {} 尺寸: {}x{} 原始色彩: {:?}",
            raw.source_hint,
            width,
            height,
            decoded.color()
        );

        let color = decoded.color();
        Ok((decoded.into_rgba8(), color))
    }

    /// 仅通过内存中的图片头信息读取宽高。
    ///
    /// 用于在完整解码前做像素限制检查。
    fn inspect_dimensions_from_memory(
        bytes: &[u8],
        format: Option<ImageFormat>,
    ) -> Result<(u32, u32), ImageError> {
        let cursor = Cursor::new(bytes);
        let reader = match format {
            Some(format) => ImageReader::with_format(cursor, format),
            None => ImageReader::new(cursor)
                .with_guessed_format()
                .map_err(|e| ImageError::InvalidFormat(format!("无法识别图片格式：{}", e)))?,
        };

        reader
            .into_dimensions()
            .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(
        &self,
        config: &ImageConfig,
        width: u32,
        height: u32,
    ) -> Result<(), ImageError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(ImageError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        &self,
        config: &ImageConfig,
        width: u32,
        height: u32,
    ) -> Result<(), ImageError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(ImageError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 将水印等比缩放到目标宽度。
    ///
    /// 传入的水印缓冲在此处被消费，缩放完成后原始缓冲即被释放。
    pub(super) fn scale_watermark(
        &self,
        watermark: RgbaImage,
        base_width: u32,
        target_width: u32,
        config: &ImageConfig,
    ) -> Result<RgbaImage, ImageError> {
        let (width, height) = watermark.dimensions();
        let (target_width, target_height) = scaled_watermark_size((width, height), base_width, target_width)?;

        if (target_width, target_height) == (width, height) {
            return Ok(watermark);
        }

        self.validate_pixel_limits(config, target_width, target_height)?;
        self.validate_decoded_memory_limits(config, target_width, target_height)?;

        log::debug!(
            "🧩 水印缩放：{}x{} -> {}x{}（filter={:?}）",
            width,
            height,
            target_width,
            target_height,
            config.resize_filter
        );

        match Self::resize_with_fast_image_resize(&watermark, target_width, target_height, config.resize_filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 缩放失败，回退 imageops：{}", err);
                Ok(Self::resize_with_imageops(
                    &watermark,
                    target_width,
                    target_height,
                    config.resize_filter,
                ))
            }
        }
    }

    fn resize_with_fast_image_resize(
        src: &RgbaImage,
        target_width: u32,
        target_height: u32,
        filter: fr::FilterType,
    ) -> Result<RgbaImage, ImageError> {
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.as_raw().clone(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| ImageError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| ImageError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

        RgbaImage::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| ImageError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    /// 回退路径。
    ///
    /// `Box` 缩小时用 `imageops::thumbnail`（整数面积平均）；`imageops` 没有 Box 卷积，
    /// 放大或其它滤镜只能按最接近的滤镜近似。
    fn resize_with_imageops(
        src: &RgbaImage,
        target_width: u32,
        target_height: u32,
        filter: fr::FilterType,
    ) -> RgbaImage {
        let downscale = target_width <= src.width() && target_height <= src.height();
        if matches!(filter, fr::FilterType::Box) && downscale {
            return image::imageops::thumbnail(src, target_width, target_height);
        }

        image::imageops::resize(src, target_width, target_height, Self::to_image_filter(filter))
    }

    fn to_image_filter(filter: fr::FilterType) -> image::imageops::FilterType {
        match filter {
            fr::FilterType::Box => image::imageops::FilterType::Triangle,
            fr::FilterType::Bilinear => image::imageops::FilterType::Triangle,
            fr::FilterType::CatmullRom => image::imageops::FilterType::CatmullRom,
            fr::FilterType::Mitchell => image::imageops::FilterType::Gaussian,
            fr::FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
            _ => image::imageops::FilterType::Triangle,
        }
    }
}

/// 计算缩放后的水印尺寸。
///
/// 目标宽度最终钳制到 `[10, min(1000, 底图宽度)]`；当底图比 10px 还窄时，下限优先。
/// 高度按 `round(tw / sw * sh)` 等比计算，至少为 1。
pub fn scaled_watermark_size(
    source: (u32, u32),
    base_width: u32,
    target_width: u32,
) -> Result<(u32, u32), ImageError> {
    let (source_width, source_height) = source;
    if source_width == 0 || source_height == 0 {
        return Err(ImageError::Decode(format!(
            "水印尺寸非法：{}x{}",
            source_width, source_height
        )));
    }

    let upper = MAX_TARGET_WIDTH.min(base_width);
    let width = target_width.min(upper).max(MIN_TARGET_WIDTH);
    // 整数运算：round(w * sh / sw)，极端宽高比下也不会经过饱和转换
    let height = (width as u64 * source_height as u64 * 2 + source_width as u64) / (source_width as u64 * 2);
    let height = u32::try_from(height.max(1)).map_err(|_| {
        ImageError::ResourceLimit(format!(
            "水印缩放后高度溢出：{}x{} -> 宽 {}",
            source_width, source_height, width
        ))
    })?;

    Ok((width, height))
}
