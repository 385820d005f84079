//! # 站点 Logo 水印 — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与协作者装配，充当宿主上传钩子的适配层。
//! 处理结果（上传描述）以 JSON 输出到标准输出，水印失败只体现在日志中。

use std::path::PathBuf;

use clap::Parser;
use logo_watermark::error::AppError;
use logo_watermark::settings::{JsonSettingsFile, SettingsLogo};
use logo_watermark::watermark::{ImageConfig, ImageSource, LogoSource, UploadedFile, WatermarkHandler};

#[derive(Debug, Parser)]
#[command(name = "logo-watermark", version, about = "Stamps the site logo onto an uploaded JPEG/PNG file")]
struct Cli {
    /// 已落盘的上传文件路径
    file: PathBuf,

    /// 上传时声明的 MIME 类型
    mime_type: String,

    /// 水印设置文件（JSON 对象）
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// 站点 Logo（URL / data URL / 本地路径），缺省时读取设置中的 `logo` 键
    #[arg(long)]
    logo: Option<String>,
}

fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = JsonSettingsFile::new(&cli.settings);

    let logo: Box<dyn LogoSource> = match cli.logo.as_deref().and_then(ImageSource::parse) {
        Some(source) => Box::new(Some(source)),
        None => Box::new(SettingsLogo),
    };

    let handler = WatermarkHandler::new(ImageConfig::default(), Box::new(settings), logo);
    let upload = handler.process(UploadedFile::new(cli.file, cli.mime_type));

    println!("{}", serde_json::to_string(&upload)?);
    Ok(())
}
