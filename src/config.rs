use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "netforge.toml";
pub const CONFIG_PATH_VAR: &str = "NETFORGE_CONFIG";
pub const BACKEND_URL_VAR: &str = "NETFORGE_BACKEND_URL";
pub const BIND_VAR: &str = "NETFORGE_BIND";

/// Settings for the studio binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Address the studio's HTTP server listens on.
    pub bind_addr: String,
    /// Root of the dataset/model backend (REST endpoints live under `/api`).
    pub backend_url: String,
    /// Socket.IO endpoint for training; falls back to `backend_url`.
    pub channel_url: Option<String>,
    pub default_epochs: u32,
    pub diagram_width: f64,
    pub diagram_height: f64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        StudioConfig {
            bind_addr: "127.0.0.1:7878".to_owned(),
            backend_url: "http://127.0.0.1:5000".to_owned(),
            channel_url: None,
            default_epochs: 10,
            diagram_width: 800.0,
            diagram_height: 600.0,
        }
    }
}

impl StudioConfig {
    /// Loads `NETFORGE_CONFIG` (or `netforge.toml` in the working directory)
    /// and applies environment overrides. A missing file yields defaults.
    pub fn load() -> Result<StudioConfig, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        let mut config = StudioConfig::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<StudioConfig, ConfigError> {
        if !path.exists() {
            log::debug!("{} not found; using defaults", path.display());
            return Ok(StudioConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: StudioConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `NETFORGE_BACKEND_URL` and `NETFORGE_BIND` as returned by `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(BACKEND_URL_VAR) {
            self.backend_url = url;
        }
        if let Some(bind) = lookup(BIND_VAR) {
            self.bind_addr = bind;
        }
        self.validate()
    }

    pub fn channel_url(&self) -> &str {
        self.channel_url.as_deref().unwrap_or(&self.backend_url)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue { key: "bind_addr", value: self.bind_addr.clone() });
        }
        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "backend_url",
                value: self.backend_url.clone(),
            });
        }
        if self.default_epochs == 0 {
            return Err(ConfigError::InvalidValue { key: "default_epochs", value: "0".into() });
        }
        if !(self.diagram_width > 0.0 && self.diagram_height > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "diagram_width/diagram_height",
                value: format!("{}x{}", self.diagram_width, self.diagram_height),
            });
        }
        Ok(())
    }
}
