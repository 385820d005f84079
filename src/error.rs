//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 流水线内部使用 `ImageError`；设置文件读写与命令行入口这类“外围”操作统一使用 `AppError`，
//! 替代分散的 `.map_err(|e| e.to_string())`、`expect()` 等不一致模式。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError`、`std::io::Error`、`serde_json::Error` 提供 `From` 转换，无需手动 map。

use crate::watermark::ImageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 水印流水线错误（加载 / 解码 / 编码）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件不可用
    #[error("设置不可用: {0}")]
    Settings(String),

    /// JSON 序列化失败
    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}
