//! Configuration management for md2pdf studio
//!
//! Handles loading and saving the application configuration. The
//! configuration is a JSON document stored in the user's config directory;
//! missing files fall back to defaults.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier used for the config directory
pub const APP_ID: &str = "md2pdf-studio";

/// Configuration file name inside the config directory
pub const CONFIG_FILE: &str = "config.json";

/// Maximum file size to import (in bytes) - 10MB
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Interval between job status requests in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 750;

/// Overall render job deadline in milliseconds
pub const DEFAULT_JOB_TIMEOUT_MS: u64 = 30_000;

/// Quiet period before a grammar-triggered re-scan runs
pub const DEFAULT_RESCAN_DEBOUNCE_MS: u64 = 50;

/// Highlighting asset version shared by the preview links and grammar downloads
pub const PRISM_VERSION: &str = "1.29.0";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preview surface configuration
    pub preview: PreviewConfig,

    /// Syntax highlighting configuration
    pub highlight: HighlightConfig,

    /// PDF export configuration
    pub export: ExportConfig,

    /// File/URL import configuration
    pub import: ImportConfig,
}

impl Config {
    /// Load configuration from the default location or return defaults
    pub fn load() -> ConfigResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        let config: Config =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.export.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "export.poll_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if url::Url::parse(&self.export.api_base).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "export.api_base".to_string(),
                reason: format!("not a URL: {}", self.export.api_base),
            });
        }
        Ok(())
    }

    /// Get the configuration directory path
    pub fn config_dir() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(APP_ID))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Get the configuration file path
    pub fn config_path() -> ConfigResult<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE))
    }
}

/// Assets referenced by the preview host document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Optional `<base href>` for relative assets
    pub base_href: Option<String>,

    /// Stylesheets linked in the host document head
    pub stylesheets: Vec<String>,

    /// Scripts loaded at the end of the host document body
    pub scripts: Vec<String>,

    /// Inline bootstrap script run after the scripts load
    pub bootstrap_script: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let cdn = format!("https://cdnjs.cloudflare.com/ajax/libs/prism/{}", PRISM_VERSION);
        Self {
            base_href: None,
            stylesheets: vec![
                "https://fonts.googleapis.com/css2?family=Barlow:wght@400;600&family=Space+Grotesk:wght@400;600&family=Merriweather:wght@400;700&family=Inter:wght@400;600&family=Source+Serif+4:wght@400;700&family=IBM+Plex+Sans:wght@400;600&family=Fira+Code:wght@400;600&family=DM+Mono:wght@400;500&display=swap".to_string(),
                format!("{}/themes/prism-tomorrow.min.css", cdn),
            ],
            scripts: vec![
                format!("{}/prism.min.js", cdn),
                format!("{}/plugins/autoloader/prism-autoloader.min.js", cdn),
            ],
            bootstrap_script: format!(
                "Prism.plugins.autoloader.languages_path = \"{}/components/\";\nPrism.highlightAll();",
                cdn
            ),
        }
    }
}

/// Syntax highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Base URL for downloadable grammars (`<base><id>.sublime-syntax`)
    pub grammar_base_url: Option<String>,

    /// Grammar ids made resident at startup from the bundled set
    pub preload: Vec<String>,

    /// Coalescing window for grammar-triggered re-scans
    pub rescan_debounce_ms: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            grammar_base_url: None,
            preload: ["javascript", "rust", "python", "bash", "json", "css", "markup"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rescan_debounce_ms: DEFAULT_RESCAN_DEBOUNCE_MS,
        }
    }
}

/// PDF export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Base URL of the render API
    pub api_base: String,

    /// Static asset base sent along with source payloads
    pub static_base_url: Option<String>,

    /// Interval between job status requests
    pub poll_interval_ms: u64,

    /// Deadline for a queued job
    pub timeout_ms: u64,

    /// File name used for downloaded artifacts
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            static_base_url: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_JOB_TIMEOUT_MS,
            file_name: "document.pdf".to_string(),
        }
    }
}

impl ExportConfig {
    /// Static asset base, derived from the API base when not set explicitly
    pub fn static_base(&self) -> String {
        match &self.static_base_url {
            Some(url) => url.clone(),
            None => format!("{}/static/", self.api_base.trim_end_matches('/')),
        }
    }
}

/// File/URL import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Require remote URLs to carry an allowed extension
    pub strict_urls: bool,

    /// Maximum local file size in bytes
    pub max_file_size: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            strict_urls: true,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.poll_interval_ms, 750);
        assert_eq!(config.export.timeout_ms, 30_000);
        assert!(config.highlight.preload.iter().any(|id| id == "javascript"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.export.api_base, deserialized.export.api_base);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"export": {"api_base": "https://api.example.com"}}"#).unwrap();
        assert_eq!(config.export.api_base, "https://api.example.com");
        assert_eq!(config.export.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.export.static_base(), "https://api.example.com/static/");
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = Config::default();
        config.export.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
