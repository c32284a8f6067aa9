//! Persistent settings for `gpsdetect`

use std::path::{Path, PathBuf};

use gps_detect::{DetectorConfig, ScannerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors reading or writing the settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `$XDG_CONFIG_HOME` nor a home directory is available
    #[error("could not determine settings path")]
    NoConfigDir,

    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Detection parameters
    #[serde(default)]
    pub detector: DetectorConfig,
    /// Serial port enumeration
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Endpoint to probe instead of enumerating
    #[serde(default)]
    pub port: Option<String>,
    /// Store the detected endpoint in `port` after a successful run
    #[serde(default)]
    pub remember_detected: bool,
}

impl Settings {
    /// Get the XDG config directory for gpsdetect
    /// Uses $XDG_CONFIG_HOME/gpsdetect, falls back to ~/.config/gpsdetect
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("gpsdetect"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("gpsdetect"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from `path`; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::settings_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
