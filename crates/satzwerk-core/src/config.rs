// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Settings live in `$XDG_CONFIG_HOME/satzwerk/config.json`. A missing file
// yields the defaults; API keys may also come from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SatzwerkError};
use crate::types::ServiceKind;

pub const CONFIG_FILE: &str = "config.json";
const APP_DIR: &str = "satzwerk";
const CACHE_FILE: &str = "cache.v1.db";

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service used when the command line does not pick one.
    pub default_service: ServiceKind,
    /// Default source language code.
    pub source_lang: String,
    /// Default target language code.
    pub target_lang: String,
    /// Concurrent translation requests.
    pub thread_count: usize,
    /// Translation cache database (defaults to the XDG cache directory).
    pub cache_path: Option<PathBuf>,
    pub retry: RetrySettings,
    pub layout: LayoutSettings,
    pub fonts: FontSettings,
    pub services: ServiceSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_service: ServiceKind::Google,
            source_lang: "en".into(),
            target_lang: "zh-CN".into(),
            thread_count: 4,
            cache_path: None,
            retry: RetrySettings::default(),
            layout: LayoutSettings::default(),
            fonts: FontSettings::default(),
            services: ServiceSettings::default(),
        }
    }
}

/// Retry behaviour around each backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Timeout for a single backend attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            attempt_timeout_secs: 30,
        }
    }
}

/// Layout detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// DocLayout-YOLO model in `.rten` format.
    pub model_path: Option<PathBuf>,
    /// Model input edge length in pixels.
    pub input_size: u32,
    /// Detections below this confidence are dropped.
    pub confidence_threshold: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: 1024,
            confidence_threshold: 0.25,
        }
    }
}

/// Output font settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// TrueType font embedded for CJK targets. Without one, a non-embedded
    /// Adobe CJK font is referenced instead.
    pub cjk_font_path: Option<PathBuf>,
}

/// Per-service credentials and endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub google: GoogleSettings,
    pub openai: OpenAiSettings,
    pub deepl: DeepLSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub endpoint: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.google.com/m".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4".into(),
            base_url: "https://api.openai.com/v1".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepLSettings {
    pub api_key: String,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&data).map_err(|err| {
            SatzwerkError::config(path.display().to_string(), format!("invalid JSON: {err}"))
        })?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!(key, "environment override applied");
                *target = value;
            }
        };
        set(&mut self.services.openai.api_key, "OPENAI_API_KEY");
        set(&mut self.services.openai.model, "OPENAI_MODEL");
        set(&mut self.services.openai.base_url, "OPENAI_BASE_URL");
        set(&mut self.services.deepl.api_key, "DEEPL_API_KEY");

        if let Some(font) = lookup("SATZWERK_CJK_FONT").filter(|v| !v.is_empty()) {
            self.fonts.cjk_font_path = Some(PathBuf::from(font));
        }
    }

    /// Sanity checks that do not need the network or any document.
    pub fn validate(&self) -> Result<()> {
        if self.thread_count == 0 {
            return Err(SatzwerkError::config("thread_count", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(SatzwerkError::config(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.layout.input_size < 32 {
            return Err(SatzwerkError::config(
                "layout.input_size",
                "must be at least 32 pixels",
            ));
        }
        if let Some(font) = &self.fonts.cjk_font_path
            && !font.exists()
        {
            warn!(path = %font.display(), "configured CJK font does not exist");
        }
        Ok(())
    }

    /// Resolved translation cache location.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| cache_dir().join(CACHE_FILE))
    }
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join(APP_DIR)
}

fn cache_dir() -> PathBuf {
    xdg_dir("XDG_CACHE_HOME", ".cache").join(APP_DIR)
}

fn xdg_dir(var: &str, home_fallback: &str) -> PathBuf {
    if let Ok(dir) = std::env::var(var)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(home_fallback);
    }
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_english_to_chinese_google() {
        let config = AppConfig::default();
        assert_eq!(config.default_service, ServiceKind::Google);
        assert_eq!(config.source_lang, "en");
        assert_eq!(config.target_lang, "zh-CN");
        assert_eq!(config.thread_count, 4);
        assert_eq!(config.services.openai.model, "gpt-4");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.layout.input_size, 1024);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = AppConfig::default();
        config.default_service = ServiceKind::DeepL;
        config.services.deepl.api_key = "key:fx".into();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.default_service, ServiceKind::DeepL);
        assert_eq!(loaded.services.deepl.api_key, "key:fx");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "thread_count": 8, "retry": { "max_attempts": 5 } }"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.thread_count, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.attempt_timeout_secs, 30);
        assert_eq!(config.target_lang, "zh-CN");
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(SatzwerkError::Configuration { .. })
        ));
    }

    #[test]
    fn overrides_replace_non_empty_values_only() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".into()),
            "OPENAI_MODEL" => Some(String::new()),
            "SATZWERK_CJK_FONT" => Some("/fonts/han.ttf".into()),
            _ => None,
        });
        assert_eq!(config.services.openai.api_key, "sk-test");
        assert_eq!(config.services.openai.model, "gpt-4");
        assert_eq!(config.fonts.cjk_font_path, Some(PathBuf::from("/fonts/han.ttf")));
    }

    #[test]
    fn zero_threads_is_rejected() {
        let config = AppConfig {
            thread_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
