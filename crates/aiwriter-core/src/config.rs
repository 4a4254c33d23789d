use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::error::SessionError;

/// Themes the shell knows how to apply.
pub const THEMES: &[&str] = &["layan-dark", "cream-navy"];

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful writing assistant. You have access to the user's files and can help with writing, editing, and improving text.";

/// Application settings.
///
/// Every field has a default, so a partial or empty `config.json` loads
/// cleanly. Values are checked once by [`Config::validate`] when loaded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the llama.cpp server (default `http://localhost:8080`)
    pub llama_cpp_url: String,
    pub system_prompt: String,
    /// Sampling temperature, 0.0 to 2.0 (default 0.7)
    pub temperature: f32,
    /// Reply length cap sent to the server (default 2000)
    pub max_tokens: u32,
    /// Approximate token budget for attached files (default 6000)
    pub context_max_tokens: u32,
    /// Font name and size like "Monospace 11" (default)
    pub editor_font: String,
    /// One of [`THEMES`] (default "layan-dark")
    pub theme: String,
    pub show_line_numbers: bool,
    pub wrap_text: bool,
    /// Folder opened at startup; empty means none (default "")
    pub default_folder: String,
    pub show_file_panel: bool,
    pub show_ai_panel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llama_cpp_url: "http://localhost:8080".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            context_max_tokens: 6000,
            editor_font: "Monospace 11".to_string(),
            theme: "layan-dark".to_string(),
            show_line_numbers: true,
            wrap_text: true,
            default_folder: String::new(),
            show_file_panel: true,
            show_ai_panel: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> std::result::Result<(), SessionError> {
        let url = self.llama_cpp_url.trim();
        if url.is_empty() {
            return Err(SessionError::Config("llama_cpp_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SessionError::Config(format!(
                "llama_cpp_url must start with http:// or https:// (got {url})"
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SessionError::Config(format!(
                "temperature must be between 0.0 and 2.0 (got {})",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(SessionError::Config("max_tokens must be greater than 0".into()));
        }
        if self.context_max_tokens == 0 {
            return Err(SessionError::Config(
                "context_max_tokens must be greater than 0".into(),
            ));
        }
        if !THEMES.contains(&self.theme.as_str()) {
            return Err(SessionError::Config(format!(
                "unknown theme {:?} (expected one of {})",
                self.theme,
                THEMES.join(", ")
            )));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn endpoint_base(&self) -> &str {
        self.llama_cpp_url.trim().trim_end_matches('/')
    }

    /// Folder to open at startup, if one is configured
    pub fn default_folder(&self) -> Option<&str> {
        let folder = self.default_folder.trim();
        (!folder.is_empty()).then_some(folder)
    }
}

/// Reads and writes [`Config`] as pretty JSON.
///
/// The file may be edited by other processes between reads, so callers
/// re-load instead of caching across a settings save.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at `<config dir>/ai-writer/config.json`
    pub fn open_default() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(Self::at(config_dir.join("ai-writer").join("config.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, config_content)?;
        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}
