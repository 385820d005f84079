//! 水印落点计算模块
//!
//! 根据锚点、边距与两张图片的尺寸，计算水印左上角在底图坐标系中的位置。
//!
//! # 设计思路
//!
//! - 纯函数：输入为底图尺寸、水印尺寸、锚点与边距，输出唯一坐标，便于测试。
//! - 允许负坐标：水印比底图大或边距过大时不做收敛，越界部分由合成阶段按像素裁剪。
//! - 居中锚点的半像素统一按“四舍五入（0.5 向上）”处理：`floor(d / 2 + 0.5)`。

use super::Anchor;

/// 水印左上角在底图中的落点（可以为负）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
}

/// 计算水印落点。
///
/// | 锚点 | x | y |
/// |---|---|---|
/// | `BottomRight` | `W - w - m` | `H - h - m` |
/// | `BottomLeft` | `m` | `H - h - m` |
/// | `TopRight` | `W - w - m` | `m` |
/// | `TopLeft` | `m` | `m` |
/// | `Center` | `round((W - w) / 2)` | `round((H - h) / 2)` |
///
/// 居中时不使用边距。
pub fn resolve_placement(
    base_size: (u32, u32),
    watermark_size: (u32, u32),
    anchor: Anchor,
    margin: u32,
) -> Placement {
    let (bw, bh) = (base_size.0 as i64, base_size.1 as i64);
    let (ww, wh) = (watermark_size.0 as i64, watermark_size.1 as i64);
    let m = margin as i64;

    let far_x = bw - ww - m;
    let far_y = bh - wh - m;

    let (x, y) = match anchor {
        Anchor::BottomRight => (far_x, far_y),
        Anchor::BottomLeft => (m, far_y),
        Anchor::TopRight => (far_x, m),
        Anchor::TopLeft => (m, m),
        Anchor::Center => (half_round_up(bw - ww), half_round_up(bh - wh)),
    };

    Placement { x, y }
}

/// `d / 2` 四舍五入，0.5 一律向正方向进位（-0.5 → 0，0.5 → 1）。
fn half_round_up(d: i64) -> i64 {
    (d + 1).div_euclid(2)
}
