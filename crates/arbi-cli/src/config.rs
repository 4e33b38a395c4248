//! Configuration loading and management.

use std::path::{Path, PathBuf};

use arbi_core::ParserConfig;
use arbi_upload::DEFAULT_ALLOWED_ORIGINS;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Gateway URL; uploads fail until one is set.
    pub endpoint: Option<String>,
    /// Sent as the `Origin` header.
    pub origin: String,
    /// Live-enemy threshold for `thresholdSaturationPercent`.
    pub saturation_threshold: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            origin: DEFAULT_ALLOWED_ORIGINS[0].to_string(),
            saturation_threshold: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub allowed_origins: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("arbi.db"),
            upload: UploadSettings::default(),
            gateway: GatewaySettings::default(),
            parser: ParserConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // ARBI_UPLOAD__ENDPOINT sets upload.endpoint
        figment = figment.merge(Env::prefixed("ARBI_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for arbi.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("arbi"))
}

/// Returns the platform-specific data directory for arbi.
///
/// On Linux: `~/.local/share/arbi`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("arbi"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_arbi() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "arbi");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("arbi.db"));
        assert_eq!(config.upload.endpoint, None);
        assert_eq!(config.gateway.allowed_origins.len(), 3);
    }

    #[test]
    fn test_config_file_overrides_nested_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbi.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/runs.db"

[upload]
endpoint = "https://runs.example.com/"

[parser.saturation]
step = 10
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/runs.db"));
        assert_eq!(
            config.upload.endpoint.as_deref(),
            Some("https://runs.example.com/")
        );
        assert_eq!(config.upload.saturation_threshold, 20);
        assert_eq!(config.parser.saturation.step, 10);
        assert_eq!(config.parser.saturation.max, 50);
        assert!((config.parser.min_reward_gap_secs - 30.0).abs() < f64::EPSILON);
    }
}
