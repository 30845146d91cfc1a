//! Application configuration
//!
//! Loaded from `config.toml` in the platform config directory; every
//! field falls back to a default so a missing file just works.

use serde::Deserialize;
use std::path::PathBuf;

use crate::constants::DEFAULT_VOICE;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prebuilt synthetic voice requested from the tutor service
    pub voice_name: String,
    /// Lesson used when none is given on the command line
    pub default_tense: String,
    pub default_verb: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            voice_name: DEFAULT_VOICE.to_string(),
            default_tense: "Presente de Indicativo".to_string(),
            default_verb: "hablar".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the platform config directory, defaulting when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "verb-shadowing")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_fields() {
        let config = AppConfig::from_toml("voice_name = \"Kore\"").unwrap();
        assert_eq!(config.voice_name, "Kore");
        assert_eq!(config.default_verb, "hablar");
    }

    #[test]
    fn empty_file_is_the_default_config() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.voice_name, DEFAULT_VOICE);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            AppConfig::from_toml("voice_name = ["),
            Err(Error::Config(_))
        ));
    }
}
