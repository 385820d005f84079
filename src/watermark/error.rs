//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载水印链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 配置非法（越界、缺失、无法解析）不属于错误：配置闸门总是“钳制或回退默认值”。

/// 水印处理统一错误类型。
///
/// 上传入口 `WatermarkHandler::process` 会吞掉全部错误并原样返回上传描述，
/// 因此这里的分支主要服务于日志诊断与测试断言。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("未配置站点 Logo")]
    MissingLogo,

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

impl ImageError {
    /// 是否属于“解码类”失败（输入数据缺失、损坏或格式不受支持）。
    pub fn is_decode_class(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InvalidFormat(_) | Self::MissingLogo
        )
    }
}

