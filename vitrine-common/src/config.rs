//! Bootstrap configuration
//!
//! Configuration file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. `VITRINE_CONFIG` environment variable
//! 3. `<config_dir>/vitrine/vitrine.toml`
//! 4. Built-in defaults (fallback)
//!
//! A missing file is not fatal: a warning is logged and built-in defaults
//! are used. A file that exists but cannot be parsed is a configuration
//! error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VITRINE_CONFIG";

const CONFIG_FILE_NAME: &str = "vitrine.toml";

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Model set loaded when no id is given on the command line
    ///
    /// Unset by default: a missing id is then a configuration error.
    pub default_model_id: Option<String>,

    /// Pin the platform ("ios" or "other") instead of detecting it
    pub platform: Option<String>,

    /// User agent used for platform detection when `platform` is unset
    pub user_agent: Option<String>,

    pub gateway: GatewayConfig,
    pub conversion: ConversionConfig,
    pub playback: PlaybackConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Remote directory source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub primary_endpoint: String,
    pub fallback_endpoint: String,
    /// Per-attempt timeout
    pub timeout_ms: u64,
}

/// glTF to USDZ conversion service
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub api_url: String,
}

/// Timing and policy knobs for the switching core
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub auto_play_interval_ms: u64,
    pub interaction_decay_ms: u64,
    pub load_timeout_ms: u64,
    pub missing_kpi: MissingKpiPolicy,
}

/// HTTP control API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// What to do when a model arrives without KPI rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingKpiPolicy {
    /// Refuse the switch; the previous model stays displayed
    #[default]
    Abort,
    /// Display the model with an empty KPI panel
    HidePanel,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary_endpoint: "https://run8n.xyz/webhook-test/getGLTF".to_string(),
            fallback_endpoint: "https://run8n.xyz/webhook/getGLTF".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://your-usdz-api.com/convert".to_string(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            auto_play_interval_ms: 750,
            interaction_decay_ms: 5_000,
            load_timeout_ms: 30_000,
            missing_kpi: MissingKpiPolicy::Abort,
        }
    }
}

impl PlaybackConfig {
    pub fn auto_play_interval(&self) -> Duration {
        Duration::from_millis(self.auto_play_interval_ms)
    }

    pub fn interaction_decay(&self) -> Duration {
        Duration::from_millis(self.interaction_decay_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
    /// Reject intervals the timers cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auto_play_interval_ms == 0 {
            return Err(Error::Config(
                "playback.auto_play_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.load_timeout_ms == 0 {
            return Err(Error::Config(
                "playback.load_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5780 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.playback.validate()?;
        Ok(config)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve and load the config file, falling back to defaults
    ///
    /// Only a file that exists but fails to parse is an error.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the config as TOML (used to generate a starter file)
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Determine which config file to read
///
/// An explicit path (CLI or environment) is returned even if it does not
/// exist so the caller can warn about it. The per-user default location is
/// only returned when the file is present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Per-user config location for this platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vitrine").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.gateway.timeout(), Duration::from_secs(60));
        assert_eq!(config.playback.auto_play_interval(), Duration::from_millis(750));
        assert_eq!(config.playback.interaction_decay(), Duration::from_secs(5));
        assert_eq!(config.playback.missing_kpi, MissingKpiPolicy::Abort);
        assert!(config.default_model_id.is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = TomlConfig::parse(
            r#"
            default_model_id = "sample"

            [playback]
            auto_play_interval_ms = 2000
            missing_kpi = "hide-panel"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_model_id.as_deref(), Some("sample"));
        assert_eq!(config.playback.auto_play_interval_ms, 2000);
        assert_eq!(config.playback.interaction_decay_ms, 5000);
        assert_eq!(config.playback.missing_kpi, MissingKpiPolicy::HidePanel);
        assert_eq!(config.server.port, 5780);
    }

    #[test]
    fn test_zero_auto_play_interval_is_rejected() {
        let config = TomlConfig::parse(
            r#"
            [playback]
            auto_play_interval_ms = 0
            "#,
        )
        .unwrap();

        let err = config.playback.validate().unwrap_err();
        assert!(err.to_string().contains("auto_play_interval_ms"));
        assert!(PlaybackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = TomlConfig::parse(
            r#"
            [playback]
            missing_kpi = "explode"
            "#,
        );
        assert!(result.is_err());
    }
}
