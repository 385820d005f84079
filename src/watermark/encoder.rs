//! # 编码与原子写回模块
//!
//! ## 设计思路
//!
//! 编码与落盘拆成两层：
//! - `UploadEncoder`：只负责把 RGBA 缓冲序列化为目标格式，可注入（测试中模拟编码失败）。
//! - `write_atomically`：负责“临时文件 → flush/sync → 原子 rename”。
//!
//! ## 实现思路
//!
//! - 合成在 RGBA8 上进行，编码前按底图解码时的色彩类型还原通道与位深（灰度 / RGB / 16 位）。
//! - JPEG：丢弃 alpha，灰度图保持灰度，使用编码器默认质量（75）。
//! - PNG：无损编码，带 alpha 的底图保留完整透明通道。
//! - 临时文件创建在目标文件同目录，保证 rename 不跨文件系统；
//!   写入失败时 `NamedTempFile` 在 drop 时自动删除，原文件保持不变。
//! - 替换前把原文件权限复制到临时文件，避免上传文件变成 0600。

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, RgbaImage};

use super::ImageError;
use super::source::UploadFormat;

/// 合成结果的编码器。
pub trait UploadEncoder {
    fn encode(
        &self,
        image: &RgbaImage,
        format: UploadFormat,
        color: ColorType,
        out: &mut dyn Write,
    ) -> Result<(), ImageError>;
}

/// 基于 `image` crate 的默认编码器。
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEncoder;

impl UploadEncoder for StandardEncoder {
    fn encode(
        &self,
        image: &RgbaImage,
        format: UploadFormat,
        color: ColorType,
        out: &mut dyn Write,
    ) -> Result<(), ImageError> {
        let restored = restore_color_type(image, format, color);

        match format {
            UploadFormat::Jpeg => restored
                .write_with_encoder(JpegEncoder::new(out))
                .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e))),
            UploadFormat::Png => restored
                .write_with_encoder(PngEncoder::new(out))
                .map_err(|e| ImageError::Encode(format!("PNG 编码失败：{}", e))),
        }
    }
}

/// 把 RGBA8 合成结果转换回底图原本的色彩类型。
///
/// JPEG 不支持 alpha 与 16 位，直接丢弃透明通道并保持 8 位；未知类型按 RGBA8 / RGB8 输出。
fn restore_color_type(image: &RgbaImage, format: UploadFormat, color: ColorType) -> DynamicImage {
    let rgba = DynamicImage::ImageRgba8(image.clone());

    match (format, color) {
        (UploadFormat::Jpeg, ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16) => {
            DynamicImage::ImageLuma8(rgba.to_luma8())
        }
        (UploadFormat::Jpeg, _) => DynamicImage::ImageRgb8(rgba.to_rgb8()),
        (UploadFormat::Png, ColorType::L8) => DynamicImage::ImageLuma8(rgba.to_luma8()),
        (UploadFormat::Png, ColorType::La8) => DynamicImage::ImageLumaA8(rgba.to_luma_alpha8()),
        (UploadFormat::Png, ColorType::Rgb8) => DynamicImage::ImageRgb8(rgba.to_rgb8()),
        (UploadFormat::Png, ColorType::L16) => DynamicImage::ImageLuma16(rgba.to_luma16()),
        (UploadFormat::Png, ColorType::La16) => DynamicImage::ImageLumaA16(rgba.to_luma_alpha16()),
        (UploadFormat::Png, ColorType::Rgb16) => DynamicImage::ImageRgb16(rgba.to_rgb16()),
        (UploadFormat::Png, ColorType::Rgba16) => DynamicImage::ImageRgba16(rgba.to_rgba16()),
        (UploadFormat::Png, _) => rgba,
    }
}

/// 原子写回：只有 `write` 成功后才会替换 `path` 处的文件。
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), ImageError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), ImageError>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path).map(|m| m.permissions()).ok();

    let mut temp_file = tempfile::Builder::new()
        .prefix(".watermark-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| ImageError::Encode(format!("创建临时文件失败：{}", e)))?;

    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        let out: &mut dyn Write = &mut writer;
        write(out)?;
        writer
            .flush()
            .map_err(|e| ImageError::Encode(format!("写入临时文件失败：{}", e)))?;
    }

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ImageError::Encode(format!("同步临时文件失败：{}", e)))?;

    if let Some(permissions) = permissions {
        temp_file
            .as_file()
            .set_permissions(permissions)
            .map_err(|e| ImageError::Encode(format!("复制文件权限失败：{}", e)))?;
    }

    temp_file
        .persist(path)
        .map_err(|e| ImageError::Encode(format!("替换原文件失败：{}", e.error)))?;

    Ok(())
}
