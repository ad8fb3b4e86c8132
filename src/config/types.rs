use crate::core::dashboard::api_gateway::EndpointPaths;
use crate::core::dashboard::polling_controller::ControllerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `server_url` when set
pub const SERVER_ENV_VAR: &str = "OMNIPING_SERVER";

/// Console configuration stored as `~/.omniping/console.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine web server root, e.g. `http://localhost:8080`
    pub server_url: String,
    /// API mount point under the server root
    pub base_path: String,
    pub refresh_interval_ms: u64,
    pub clear_settle_ms: u64,
    pub restart_retry_ms: u64,
    pub request_timeout_ms: u32,
    /// ANSI colours in terminal output
    pub color: bool,
    pub endpoints: EndpointPaths,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,
    #[error("Config read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Default location: `~/.omniping/console.toml`
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(home.join(".omniping").join("console.toml"))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the default configuration unless one already exists
    pub fn init() -> Result<PathBuf, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            Self::default().save_to(&path)?;
            println!("Created config at {}", path.display());
        } else {
            println!("Config already exists at {}", path.display());
        }
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn print(&self) -> Result<(), ConfigError> {
        println!("{}", toml::to_string_pretty(self)?);
        Ok(())
    }

    /// Validate server address and timings
    pub fn check(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.server_url)
            .map_err(|e| ConfigError::Invalid(format!("server_url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "server_url: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "base_path must start with '/'".to_string(),
            ));
        }

        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Ok(server) = std::env::var(SERVER_ENV_VAR) {
            if !server.trim().is_empty() {
                self.server_url = server.trim().to_string();
            }
        }
    }

    /// Server root joined with the API base path
    pub fn api_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.base_path.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            clear_settle_delay: Duration::from_millis(self.clear_settle_ms),
            restart_retry_delay: Duration::from_millis(self.restart_retry_ms),
        }
    }
}
