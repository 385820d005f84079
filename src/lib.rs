//! # 站点 Logo 水印 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              宿主上传流程（每次上传完成后回调）          │
//! │                                                          │
//! │   UploadedFile { filePath, mimeType } ──► 钩子 ──► 原样返回 │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ WatermarkHandler::process（永不失败）
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (外围统一错误类型)              │
//! │  │                                                       │
//! │  ├─ settings ─── SettingsStore / JsonSettingsFile        │
//! │  │                                                       │
//! │  └─ watermark ── 配置闸门 + 加载 + 缩放 + 合成 + 写回     │
//! │      ├─ placement     锚点·边距 → 落点                   │
//! │      ├─ compositor    按不透明度 Alpha 合成               │
//! │      └─ encoder       JPEG/PNG 编码 · 原子替换            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，设置读取与命令行入口的返回类型 |
//! | [`settings`] | 设置快照的读取（JSON 文件 / 内存），以及设置中的 Logo 来源 |
//! | [`watermark`] | 对上传的 JPEG/PNG 叠加站点 Logo 并原地写回 |

pub mod error;
pub mod settings;
pub mod watermark;
