//! Session configuration.
//!
//! A [`Config`] describes the drawing surface created by
//! [`Lab::initialize_with`](crate::Lab::initialize_with). It can be built in
//! code or loaded from `~/.labengine/config.toml`:
//!
//! ```toml
//! # Surface size in pixels
//! width = 320
//! height = 240
//!
//! # Integer zoom applied when the surface is shown on screen
//! scale = 2
//!
//! title = "Lab 3"
//!
//! # How long init/terminate wait for the window thread
//! handshake_timeout_ms = 5000
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LabError;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Upper bound for any surface side, keeps width * height * scale² sane.
pub const MAX_SIDE: u32 = 8192;

/// Surface and window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Blit zoom factor (1 = no scaling)
    pub scale: u32,
    /// Window caption
    pub title: String,
    /// Bound for the startup and shutdown handshakes
    pub handshake_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scale: 1,
            title: "Lab Graphics".to_string(),
            handshake_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Config with the given surface size and scale, other fields default
    pub fn with_size(width: u32, height: u32, scale: u32) -> Self {
        Self {
            width,
            height,
            scale,
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    match Self::from_toml_str(&content) {
                        Ok(config) => return config,
                        Err(e) => tracing::warn!("Ignoring {}: {}", path.display(), e),
                    }
                }
            }
        }
        Self::default()
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, LabError> {
        toml::from_str(content).map_err(|e| LabError::InvalidConfig(e.to_string()))
    }

    /// Check the ranges the window thread relies on
    pub fn validate(&self) -> Result<(), LabError> {
        if self.width == 0 || self.height == 0 {
            return Err(LabError::InvalidConfig(format!(
                "surface size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.scale == 0 {
            return Err(LabError::InvalidConfig("scale must be at least 1".to_string()));
        }
        let side = self.width.max(self.height).saturating_mul(self.scale);
        if side > MAX_SIDE {
            return Err(LabError::InvalidConfig(format!(
                "scaled surface side {} exceeds {}",
                side, MAX_SIDE
            )));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".labengine").join("config.toml"))
    }
}

/// Directory holding the config file and the demo's log
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".labengine"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!((config.width, config.height, config.scale), (640, 480, 1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str("width = 320\nscale = 2\n").unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, DEFAULT_HEIGHT);
        assert_eq!(config.scale, 2);
        assert_eq!(config.title, "Lab Graphics");
    }

    #[test]
    fn test_bad_toml() {
        let err = Config::from_toml_str("width = \"wide\"").unwrap_err();
        assert!(matches!(err, LabError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_ranges() {
        assert!(Config::with_size(0, 480, 1).validate().is_err());
        assert!(Config::with_size(640, 0, 1).validate().is_err());
        assert!(Config::with_size(640, 480, 0).validate().is_err());
        assert!(Config::with_size(4096, 16, 4).validate().is_err());
        assert!(Config::with_size(320, 240, 3).validate().is_ok());
    }
}
