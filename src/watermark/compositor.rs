//! # Alpha 合成模块
//!
//! ## 设计思路
//!
//! 底图以所有权传入、合成后原样返回，水印只读借用；不依赖任何绘图上下文，便于单测。
//!
//! ## 实现思路
//!
//! - Alpha 使用标准 0~255 约定（0 全透明，255 不透明）。
//!   部分图形库使用 0~127 反向刻度（0 不透明），`alpha_from_inverted_127` 提供到标准刻度的映射。
//! - 有效 alpha：`a_eff = round(a * opacity / 100)`，等价于反向刻度下的
//!   `a + (127 - a) * (1 - opacity / 100)`：opacity = 100 不变，opacity = 0 全透明。
//! - 使用标准 “source-over” 混合；落在底图 `[0, W) x [0, H)` 之外的像素直接裁剪。
//! - `a_eff == 0` 的像素不写入，保证底图该像素逐位不变。

use image::{Rgba, RgbaImage};

use super::placement::Placement;

/// 将水印按落点与全局不透明度合成到底图上。
///
/// 底图尺寸与像素格式不变，只有水印矩形与底图的交集区域会被改写。
pub fn composite(
    mut base: RgbaImage,
    watermark: &RgbaImage,
    placement: Placement,
    opacity_percent: u8,
) -> RgbaImage {
    let opacity = opacity_percent.min(100);
    let (base_width, base_height) = (base.width() as i64, base.height() as i64);
    let (mark_width, mark_height) = (watermark.width() as i64, watermark.height() as i64);

    // 水印坐标系下与底图相交的区间
    let sx_start = (-placement.x).clamp(0, mark_width);
    let sx_end = (base_width - placement.x).clamp(0, mark_width);
    let sy_start = (-placement.y).clamp(0, mark_height);
    let sy_end = (base_height - placement.y).clamp(0, mark_height);

    for sy in sy_start..sy_end {
        for sx in sx_start..sx_end {
            let src = *watermark.get_pixel(sx as u32, sy as u32);
            let alpha = if opacity == 100 {
                src[3]
            } else {
                effective_alpha(src[3], opacity)
            };
            if alpha == 0 {
                continue;
            }

            let dx = (placement.x + sx) as u32;
            let dy = (placement.y + sy) as u32;
            let dst = base.get_pixel_mut(dx, dy);
            *dst = blend_over(*dst, Rgba([src[0], src[1], src[2], alpha]));
        }
    }

    base
}

/// 按全局不透明度缩放单个像素的 alpha。
pub(crate) fn effective_alpha(alpha: u8, opacity_percent: u8) -> u8 {
    let opacity = opacity_percent.min(100) as u32;
    ((alpha as u32 * opacity + 50) / 100) as u8
}

/// 将 0~127 反向刻度（0 不透明、127 全透明）映射到 0~255 标准刻度。
pub fn alpha_from_inverted_127(alpha: u8) -> u8 {
    let alpha = alpha.min(127) as u32;
    (((127 - alpha) * 255 + 63) / 127) as u8
}

/// source-over 混合。
///
/// `out_a = a_s + a_d (1 - a_s)`，`out_c = (c_s a_s + c_d a_d (1 - a_s)) / out_a`
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 255 {
        return src;
    }

    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = if dst[3] == 255 { 1.0 } else { sa + da * (1.0 - sa) };
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |s: u8, d: u8| -> u8 {
        let value = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE_COLOR: Rgba<u8> = Rgba([20, 40, 60, 255]);
    const MARK_COLOR: Rgba<u8> = Rgba([240, 200, 10, 255]);

    fn blend_single(base: Rgba<u8>, mark: Rgba<u8>, opacity: u8) -> Rgba<u8> {
        let base = RgbaImage::from_pixel(1, 1, base);
        let mark = RgbaImage::from_pixel(1, 1, mark);
        *composite(base, &mark, Placement { x: 0, y: 0 }, opacity).get_pixel(0, 0)
    }

    #[test]
    fn full_opacity_copies_opaque_watermark() {
        assert_eq!(blend_single(BASE_COLOR, MARK_COLOR, 100), MARK_COLOR);
    }

    #[test]
    fn zero_opacity_leaves_base_untouched() {
        assert_eq!(blend_single(BASE_COLOR, MARK_COLOR, 0), BASE_COLOR);

        let translucent = Rgba([1, 2, 3, 7]);
        assert_eq!(blend_single(translucent, MARK_COLOR, 0), translucent);
    }

    #[test]
    fn half_opacity_mixes_colours() {
        let blended = blend_single(Rgba([0, 0, 0, 255]), Rgba([200, 100, 50, 255]), 50);
        // a_eff = round(255 * 0.5) = 128
        assert_eq!(blended, Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn transparent_base_takes_watermark_alpha() {
        let blended = blend_single(Rgba([0, 0, 0, 0]), Rgba([10, 20, 30, 200]), 50);
        assert_eq!(blended, Rgba([10, 20, 30, 100]));
    }

    #[test]
    fn fully_transparent_watermark_pixels_are_skipped() {
        assert_eq!(blend_single(BASE_COLOR, Rgba([255, 255, 255, 0]), 100), BASE_COLOR);
    }

    #[test]
    fn only_pixels_under_watermark_change() {
        let base = RgbaImage::from_pixel(10, 8, BASE_COLOR);
        let mark = RgbaImage::from_pixel(3, 2, MARK_COLOR);

        let out = composite(base, &mark, Placement { x: 4, y: 5 }, 100);

        assert_eq!(out.dimensions(), (10, 8));
        for (x, y, pixel) in out.enumerate_pixels() {
            let inside = (4..7).contains(&x) && (5..7).contains(&y);
            let expected = if inside { MARK_COLOR } else { BASE_COLOR };
            assert_eq!(*pixel, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn out_of_bounds_placement_is_clipped() {
        let base = RgbaImage::from_pixel(10, 10, BASE_COLOR);
        let mark = RgbaImage::from_pixel(6, 6, MARK_COLOR);

        let out = composite(base, &mark, Placement { x: -3, y: 7 }, 100);

        assert_eq!(out.dimensions(), (10, 10));
        for (x, y, pixel) in out.enumerate_pixels() {
            let inside = x < 3 && y >= 7;
            let expected = if inside { MARK_COLOR } else { BASE_COLOR };
            assert_eq!(*pixel, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn fully_off_canvas_placement_is_a_no_op() {
        let base = RgbaImage::from_pixel(10, 10, BASE_COLOR);
        let mark = RgbaImage::from_pixel(4, 4, MARK_COLOR);

        for placement in [
            Placement { x: -4, y: 0 },
            Placement { x: 10, y: 0 },
            Placement { x: 0, y: -100 },
            Placement { x: 0, y: 10 },
        ] {
            let out = composite(base.clone(), &mark, placement, 100);
            assert_eq!(out, base);
        }
    }

    #[test]
    fn effective_alpha_scales_linearly() {
        assert_eq!(effective_alpha(255, 100), 255);
        assert_eq!(effective_alpha(255, 0), 0);
        assert_eq!(effective_alpha(200, 50), 100);
        assert_eq!(effective_alpha(255, 150), 255);
    }

    #[test]
    fn inverted_alpha_mapping() {
        assert_eq!(alpha_from_inverted_127(0), 255);
        assert_eq!(alpha_from_inverted_127(127), 0);
        assert_eq!(alpha_from_inverted_127(200), 0);
        assert_eq!(alpha_from_inverted_127(64), 126);
    }

    proptest! {
        #[test]
        fn opacity_moves_opaque_base_monotonically_towards_watermark(
            base in any::<[u8; 3]>(),
            mark in any::<[u8; 3]>(),
            low in 0u8..=100,
            high in 0u8..=100,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            let base = Rgba([base[0], base[1], base[2], 255]);
            let mark = Rgba([mark[0], mark[1], mark[2], 255]);

            let a = blend_single(base, mark, low);
            let b = blend_single(base, mark, high);

            for c in 0..3 {
                let dist_low = (a[c] as i32 - mark[c] as i32).abs();
                let dist_high = (b[c] as i32 - mark[c] as i32).abs();
                prop_assert!(dist_high <= dist_low);
            }
            prop_assert_eq!(a[3], 255);
            prop_assert_eq!(b[3], 255);
        }

        #[test]
        fn opacity_raises_resulting_alpha_monotonically(
            base_alpha in 0u8..255,
            low in 0u8..=100,
            high in 0u8..=100,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            let base = Rgba([50, 60, 70, base_alpha]);
            let mark = Rgba([200, 10, 90, 255]);

            let a = blend_single(base, mark, low);
            let b = blend_single(base, mark, high);

            prop_assert!(a[3] <= b[3]);
            prop_assert!(a[3] >= base_alpha);
        }
    }
}
