//! # 配置模块（配置闸门）
//!
//! ## 设计思路
//!
//! 配置分为两层：
//! - `ImageConfig`：引擎级资源上限与缩放策略，进程内固定，`Default` 即生产可用值。
//! - `WatermarkConfig`：单次上传读取一次的水印参数快照（尺寸 / 锚点 / 不透明度 / 边距）。
//!
//! ## 实现思路
//!
//! - 设置存储返回的是不透明的 JSON 映射，字段类型不可信（数字、字符串、布尔都可能出现）。
//! - 数值统一走“安全整数转换”：数字截断、字符串取前导整数、布尔映射为 0/1。
//! - 无法转换或缺失 → 回退默认值；可转换但越界 → 钳制到合法区间。永不报错。
//! - 未识别的锚点字符串回退到右下角，兼容设置结构的前向漂移。

use fast_image_resize as fr;
use serde_json::{Map, Value};

/// 允许加水印的 MIME 类型（严格匹配）。
pub const SUPPORTED_MIME_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

pub const MIN_TARGET_WIDTH: u32 = 10;
pub const MAX_TARGET_WIDTH: u32 = 1000;
pub const DEFAULT_TARGET_WIDTH: u32 = 100;
pub const MAX_OPACITY_PERCENT: u8 = 100;
pub const DEFAULT_OPACITY_PERCENT: u8 = 100;
pub const MAX_MARGIN_PX: u32 = 1000;
pub const DEFAULT_MARGIN_PX: u32 = 10;

/// 引擎级处理配置。
///
/// 字段覆盖了 Logo 下载、解码与缩放三个阶段。
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// 下载/读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// Logo 下载总超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 水印缩放滤镜，`Box` 即面积平均重采样。
    pub resize_filter: fr::FilterType,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: fr::FilterType::Box,
        }
    }
}

/// 水印锚点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    Center,
}

impl Anchor {
    /// 从设置字符串解析锚点。
    ///
    /// 与严格解析不同，未知取值不会报错，而是回退到 `BottomRight`。
    ///
    /// # 示例
    /// ```rust
    /// use logo_watermark::watermark::Anchor;
    ///
    /// assert_eq!(Anchor::from_setting("top-left"), Anchor::TopLeft);
    /// assert_eq!(Anchor::from_setting("upper-middle"), Anchor::BottomRight);
    /// ```
    pub fn from_setting(position: &str) -> Self {
        match position.trim().to_lowercase().as_str() {
            "bottom-right" => Self::BottomRight,
            "bottom-left" => Self::BottomLeft,
            "top-right" => Self::TopRight,
            "top-left" => Self::TopLeft,
            "center" => Self::Center,
            other => {
                log::debug!("未知水印位置 {:?}，回退为 bottom-right", other);
                Self::BottomRight
            }
        }
    }

    /// 输出为设置存储使用的稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::TopRight => "top-right",
            Self::TopLeft => "top-left",
            Self::Center => "center",
        }
    }
}

/// 单次上传使用的水印参数快照。
///
/// 只有在“已启用”时才会构造，因此不携带 `enabled` 字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkConfig {
    /// 期望水印宽度（已钳制到 10~1000，最终还会受底图宽度约束）。
    pub target_width: u32,
    pub anchor: Anchor,
    /// 全局不透明度（0~100）。
    pub opacity_percent: u8,
    /// 距边缘的像素边距（0~1000）。
    pub margin_px: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            anchor: Anchor::default(),
            opacity_percent: DEFAULT_OPACITY_PERCENT,
            margin_px: DEFAULT_MARGIN_PX,
        }
    }
}

impl WatermarkConfig {
    /// 配置闸门：决定本次上传是否需要加水印。
    ///
    /// 返回 `None` 表示直接放行（未启用、设置缺失或 MIME 不受支持）。
    pub fn gate(settings: Option<&Map<String, Value>>, mime_type: &str) -> Option<Self> {
        let Some(settings) = settings else {
            log::debug!("⏭️ 未读取到水印设置，放行");
            return None;
        };

        if !settings.get("enabled").is_some_and(is_truthy) {
            log::debug!("⏭️ 水印未启用，放行");
            return None;
        }

        if !SUPPORTED_MIME_TYPES.contains(&mime_type) {
            log::debug!("⏭️ 不支持的 MIME 类型 {:?}，放行", mime_type);
            return None;
        }

        Some(Self::from_settings(settings))
    }

    /// 从设置映射构建快照，所有数值都经过“转换 → 钳制 / 回退”。
    pub fn from_settings(settings: &Map<String, Value>) -> Self {
        let target_width = clamped_setting(
            settings,
            "size",
            MIN_TARGET_WIDTH as i64,
            MAX_TARGET_WIDTH as i64,
            DEFAULT_TARGET_WIDTH as i64,
        ) as u32;
        let opacity_percent = clamped_setting(
            settings,
            "opacity",
            0,
            MAX_OPACITY_PERCENT as i64,
            DEFAULT_OPACITY_PERCENT as i64,
        ) as u8;
        let margin_px = clamped_setting(
            settings,
            "margin",
            0,
            MAX_MARGIN_PX as i64,
            DEFAULT_MARGIN_PX as i64,
        ) as u32;
        let anchor = settings
            .get("position")
            .and_then(Value::as_str)
            .map(Anchor::from_setting)
            .unwrap_or_default();

        Self {
            target_width,
            anchor,
            opacity_percent,
            margin_px,
        }
    }
}

fn clamped_setting(settings: &Map<String, Value>, key: &str, min: i64, max: i64, default: i64) -> i64 {
    let Some(raw) = settings.get(key) else {
        return default;
    };

    match coerce_int(raw) {
        Some(value) => {
            let clamped = value.clamp(min, max);
            if clamped != value {
                log::debug!("设置 {} = {} 越界，钳制为 {}", key, value, clamped);
            }
            clamped
        }
        None => {
            log::debug!("设置 {} = {} 无法解析为整数，回退默认值 {}", key, raw, default);
            default
        }
    }
}

/// 安全整数转换。
///
/// - 数字：截断小数部分，超出 `i64` 的值饱和
/// - 字符串：取前导整数（`"120px"` → 120），没有数字则视为无法转换
/// - 布尔：`true` → 1，`false` → 0
pub(crate) fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => parse_leading_int(s),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// 设置值的“真值”判断，与表单提交语义一致（`"0"`、空串视为假）。
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("test settings must be an object")
    }

    #[test]
    fn gate_passes_through_when_settings_missing() {
        assert_eq!(WatermarkConfig::gate(None, "image/png"), None);
    }

    #[test]
    fn gate_passes_through_when_disabled_or_falsy() {
        for enabled in [json!(0), json!("0"), json!(""), json!(false), json!(null)] {
            let map = settings(json!({ "enabled": enabled }));
            assert_eq!(WatermarkConfig::gate(Some(&map), "image/png"), None);
        }

        let map = settings(json!({ "size": 200 }));
        assert_eq!(WatermarkConfig::gate(Some(&map), "image/png"), None);
    }

    #[test]
    fn gate_rejects_unsupported_mime_types() {
        let map = settings(json!({ "enabled": 1 }));

        assert!(WatermarkConfig::gate(Some(&map), "image/jpeg").is_some());
        assert!(WatermarkConfig::gate(Some(&map), "image/png").is_some());
        assert_eq!(WatermarkConfig::gate(Some(&map), "image/gif"), None);
        assert_eq!(WatermarkConfig::gate(Some(&map), "image/jpg"), None);
        assert_eq!(WatermarkConfig::gate(Some(&map), "IMAGE/PNG"), None);
    }

    #[test]
    fn enabled_only_yields_defaults() {
        let map = settings(json!({ "enabled": "1" }));
        let config = WatermarkConfig::gate(Some(&map), "image/jpeg").expect("should be enabled");

        assert_eq!(config, WatermarkConfig::default());
        assert_eq!(config.target_width, 100);
        assert_eq!(config.anchor, Anchor::BottomRight);
        assert_eq!(config.opacity_percent, 100);
        assert_eq!(config.margin_px, 10);
    }

    #[test]
    fn numeric_settings_are_clamped() {
        let map = settings(json!({
            "enabled": 1,
            "size": 5000,
            "opacity": -20,
            "margin": "99999",
        }));
        let config = WatermarkConfig::from_settings(&map);

        assert_eq!(config.target_width, 1000);
        assert_eq!(config.opacity_percent, 0);
        assert_eq!(config.margin_px, 1000);

        let map = settings(json!({ "size": 3, "opacity": 150 }));
        let config = WatermarkConfig::from_settings(&map);
        assert_eq!(config.target_width, 10);
        assert_eq!(config.opacity_percent, 100);
    }

    #[test]
    fn unparseable_settings_fall_back_to_defaults() {
        let map = settings(json!({
            "size": "large",
            "opacity": [50],
            "margin": { "px": 4 },
        }));
        let config = WatermarkConfig::from_settings(&map);

        assert_eq!(config.target_width, DEFAULT_TARGET_WIDTH);
        assert_eq!(config.opacity_percent, DEFAULT_OPACITY_PERCENT);
        assert_eq!(config.margin_px, DEFAULT_MARGIN_PX);
    }

    #[test]
    fn coerce_int_follows_loose_integer_rules() {
        assert_eq!(coerce_int(&json!(42)), Some(42));
        assert_eq!(coerce_int(&json!(42.9)), Some(42));
        assert_eq!(coerce_int(&json!(" 120px")), Some(120));
        assert_eq!(coerce_int(&json!("-7")), Some(-7));
        assert_eq!(coerce_int(&json!("+8")), Some(8));
        assert_eq!(coerce_int(&json!("px")), None);
        assert_eq!(coerce_int(&json!("")), None);
        assert_eq!(coerce_int(&json!(true)), Some(1));
        assert_eq!(coerce_int(&json!(null)), None);
        assert_eq!(coerce_int(&json!("99999999999999999999999")), Some(i64::MAX));
        assert_eq!(coerce_int(&json!(u64::MAX)), Some(i64::MAX));
    }

    #[test]
    fn anchor_parsing_is_permissive() {
        assert_eq!(Anchor::from_setting("bottom-left"), Anchor::BottomLeft);
        assert_eq!(Anchor::from_setting("Top-Right"), Anchor::TopRight);
        assert_eq!(Anchor::from_setting("center"), Anchor::Center);
        assert_eq!(Anchor::from_setting("middle"), Anchor::BottomRight);
        assert_eq!(Anchor::from_setting(""), Anchor::BottomRight);

        for anchor in [
            Anchor::BottomRight,
            Anchor::BottomLeft,
            Anchor::TopRight,
            Anchor::TopLeft,
            Anchor::Center,
        ] {
            assert_eq!(Anchor::from_setting(anchor.as_str()), anchor);
        }
    }

    #[test]
    fn non_string_position_falls_back_to_bottom_right() {
        let map = settings(json!({ "position": 3 }));
        assert_eq!(WatermarkConfig::from_settings(&map).anchor, Anchor::BottomRight);
    }
}
