//! # 水印模块（watermark）
//!
//! ## 设计思路
//!
//! 该模块将“配置闸门 → 加载解码 → 等比缩放 → 落点计算 → Alpha 合成 → 原子写回”
//! 按职责拆分为多个子模块，每个阶段都是“所有权进、所有权出”的纯函数或方法，便于单测。
//!
//! - `config`：引擎配置、水印参数快照、配置闸门
//! - `loader`：负责 URL/Base64/文件加载与安全校验
//! - `pipeline`：负责解码、像素限制、水印缩放
//! - `placement`：锚点 + 边距 → 落点
//! - `compositor`：按不透明度做 source-over 合成
//! - `encoder`：JPEG/PNG 编码与原子写回
//! - `handler`：编排整条处理流水线
//! - `error/source`：错误、中间数据模型与外部协作者接口
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 上传钩子（UploadedFile）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ config.rs（设置快照 → WatermarkConfig / 放行）
//!    ├─ loader.rs（Logo 与底图字节加载 + 签名校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + 水印缩放）
//!    ├─ placement.rs（落点）
//!    ├─ compositor.rs（合成）
//!    └─ encoder.rs（编码 + 临时文件原子替换）
//!    ↓
//! 原样返回 UploadedFile（失败只记录日志）
//! ```

mod compositor;
mod config;
mod encoder;
mod error;
mod handler;
mod loader;
mod pipeline;
mod placement;
mod source;

pub use compositor::{alpha_from_inverted_127, composite};
pub use config::{Anchor, ImageConfig, SUPPORTED_MIME_TYPES, WatermarkConfig};
pub use encoder::{StandardEncoder, UploadEncoder};
pub use error::ImageError;
pub use handler::{WatermarkHandler, WatermarkOutcome};
pub use pipeline::scaled_watermark_size;
pub use placement::{Placement, resolve_placement};
pub use source::{ImageSource, LogoSource, UploadFormat, UploadedFile};
