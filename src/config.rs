use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::converter::{AcceptFilter, ConvertOptions, OutputFormat};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub dark_mode: bool,
    pub format: OutputFormat,
    pub quality: f32,
    pub decode_timeout_secs: u64,
    pub select_new_files: bool,
    pub accept: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            format: OutputFormat::Jpeg,
            quality: 0.5,
            decode_timeout_secs: 30,
            select_new_files: true,
            accept: "image/*".to_string(),
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        self.save_or_warn(&Self::get_config_path());
    }

    pub fn save_or_warn(&self, path: &Path) {
        if let Err(e) = self.save_to(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to save settings");
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("image_converter");
        path.push("settings.json");
        path
    }

    fn sanitized(mut self) -> Self {
        if !self.quality.is_finite() {
            self.quality = Self::default().quality;
        }
        self.quality = self.quality.clamp(0.0, 1.0);
        self.decode_timeout_secs = self.decode_timeout_secs.max(1);
        if self.accept.trim().is_empty() {
            self.accept = Self::default().accept;
        }
        self
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            quality: self.quality,
            decode_timeout: Duration::from_secs(self.decode_timeout_secs),
        }
    }

    pub fn accept_filter(&self) -> AcceptFilter {
        AcceptFilter::parse(&self.accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "dark_mode": true, "quality": 3.0, "decode_timeout_secs": 0 }"#).unwrap();

        let settings = AppSettings::load_from(&path);
        assert!(settings.dark_mode);
        assert_eq!(settings.quality, 1.0);
        assert_eq!(settings.decode_timeout_secs, 1);
        assert_eq!(settings.accept, "image/*");
        assert!(settings.select_new_files);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings { format: OutputFormat::Webp, dark_mode: true, ..Default::default() };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
    }
}
