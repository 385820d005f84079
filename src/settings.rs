//! 水印设置存储模块
//!
//! # 设计思路
//!
//! 设置存储是外部协作者，流水线只需要“读一次快照”，不需要写入路径。
//! 返回值是不透明的 JSON 映射，字段校验与钳制全部交给配置闸门。
//!
//! # 实现思路
//!
//! - `JsonSettingsFile`：从 JSON 文件读取设置；文件不存在视为“未配置”。
//! - `StaticSettings`：内存中的固定设置，用于嵌入方与测试。
//! - 读取失败只记录日志并视为“未配置”，上传永远不会因此被阻断。
//! - 站点 Logo 也可以写在同一份设置里（`logo` 键），由 `SettingsLogo` 从同一份快照中读取。

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::watermark::{ImageSource, LogoSource};

/// 设置存储协作者。
pub trait SettingsStore {
    /// 读取设置快照；`None` 表示没有任何设置。
    fn load(&self) -> Option<Map<String, Value>>;
}

/// 基于 JSON 文件的设置存储。
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取并解析设置文件。
    ///
    /// # 返回
    /// - `Ok(None)`：文件不存在
    /// - `Ok(Some(value))`：解析成功（不保证是对象）
    /// - `Err(AppError::Settings)`：读取或解析失败
    pub fn read(&self) -> Result<Option<Value>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| AppError::Settings(format!("读取设置文件失败: {}", e)))?;
        let parsed = serde_json::from_str::<Value>(&content)
            .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;

        Ok(Some(parsed))
    }
}

impl SettingsStore for JsonSettingsFile {
    fn load(&self) -> Option<Map<String, Value>> {
        match self.read() {
            Ok(Some(Value::Object(map))) => Some(map),
            Ok(Some(other)) => {
                log::warn!("设置文件 {} 不是 JSON 对象，忽略: {}", self.path.display(), other);
                None
            }
            Ok(None) => {
                log::debug!("设置文件 {} 不存在", self.path.display());
                None
            }
            Err(err) => {
                log::warn!("读取设置文件 {} 失败: {}", self.path.display(), err);
                None
            }
        }
    }
}

/// 从设置快照的 `logo` 键读取站点 Logo。
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsLogo;

impl LogoSource for SettingsLogo {
    fn logo(&self, settings: &Map<String, Value>) -> Option<ImageSource> {
        settings
            .get("logo")
            .and_then(Value::as_str)
            .and_then(ImageSource::parse)
    }
}

/// 内存中的固定设置。
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(Option<Map<String, Value>>);

impl StaticSettings {
    pub fn new(settings: Map<String, Value>) -> Self {
        Self(Some(settings))
    }

    /// 非对象的 JSON 值视为“没有设置”。
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(Some(map)),
            _ => Self(None),
        }
    }
}

impl SettingsStore for StaticSettings {
    fn load(&self) -> Option<Map<String, Value>> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_means_no_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonSettingsFile::new(dir.path().join("settings.json"));

        assert!(matches!(store.read(), Ok(None)));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn object_file_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "enabled": 1, "size": "150", "logo": "https://example.com/logo.png" }"#)
            .expect("write settings");

        let store = JsonSettingsFile::new(&path);
        let map = store.load().expect("settings should load");

        assert_eq!(map.get("enabled"), Some(&json!(1)));
        assert_eq!(map.get("size"), Some(&json!("150")));
        assert_eq!(SettingsLogo.logo(&map), Some(ImageSource::Url("https://example.com/logo.png".into())));
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn invalid_json_is_reported_and_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ enabled: ").expect("write settings");

        let store = JsonSettingsFile::new(&path);
        assert!(matches!(store.read(), Err(AppError::Settings(_))));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn non_object_json_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").expect("write settings");

        assert_eq!(JsonSettingsFile::new(&path).load(), None);
    }

    #[test]
    fn settings_logo_ignores_missing_or_blank_values() {
        for settings in [json!({}), json!({ "logo": "  " }), json!({ "logo": 42 })] {
            let map = settings.as_object().cloned().expect("object");
            assert_eq!(SettingsLogo.logo(&map), None);
        }
    }

    #[test]
    fn static_settings_round_trip() {
        assert_eq!(StaticSettings::default().load(), None);
        assert_eq!(StaticSettings::from_value(json!("nope")).load(), None);

        let map = json!({ "enabled": true }).as_object().cloned().expect("object");
        assert_eq!(StaticSettings::new(map.clone()).load(), Some(map));
    }
}
