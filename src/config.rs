//! Configuration management module.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::export::{CsvStyle, ExportFormat};

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Upper bound for the simulated processing pause.
pub const MAX_PROCESSING_DELAY_MS: u64 = 60_000;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend (REST + auth) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`. Empty means offline.
    #[serde(default)]
    pub url: String,
    /// Public anon key sent as `apikey`.
    #[serde(default)]
    pub anon_key: String,
}

/// Attendance simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Pause before results are revealed (default: 2000).
    #[serde(default = "default_processing_delay_ms")]
    pub processing_delay_ms: u64,
}

fn default_processing_delay_ms() -> u64 {
    2000
}

/// Export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Target directory; current directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Use RFC 4180 escaping instead of verbatim quoting.
    #[serde(default)]
    pub escape_fields: bool,
    #[serde(default)]
    pub format: ExportFormat,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Per-user config file path, falling back to the current directory.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "rollcall")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => ConfigLoadResult::Loaded(config),
                Err(e) => ConfigLoadResult::Invalid(e),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backend.url.is_empty() {
            if !self.backend.url.starts_with("http") {
                return Err(ConfigError::Validation(
                    "Backend URL must start with http:// or https://".to_string(),
                ));
            }
            if self.backend.anon_key.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "Backend anon key is required when a backend URL is set".to_string(),
                ));
            }
        }
        if self.simulation.processing_delay_ms > MAX_PROCESSING_DELAY_MS {
            return Err(ConfigError::Validation(format!(
                "Processing delay cannot exceed {MAX_PROCESSING_DELAY_MS} ms"
            )));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl SimulationConfig {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl ExportConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn csv_style(&self) -> CsvStyle {
        if self.escape_fields {
            CsvStyle::Escaped
        } else {
            CsvStyle::Verbatim
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            processing_delay_ms: default_processing_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.backend.is_configured());
        assert_eq!(config.simulation.processing_delay(), Duration::from_secs(2));
        assert_eq!(config.export.csv_style(), CsvStyle::Verbatim);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.simulation.processing_delay_ms, 2000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.export.format, ExportFormat::Csv);
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
            [backend]
            url = "https://demo.supabase.co"
            anon_key = "public-key"

            [simulation]
            processing_delay_ms = 0

            [export]
            output_dir = "exports"
            escape_fields = true
            format = "xlsx"

            [logging]
            level = "debug"
            directory = "logs"
        "#;
        let config = AppConfig::from_toml(content).unwrap();

        assert!(config.backend.is_configured());
        assert_eq!(config.simulation.processing_delay(), Duration::ZERO);
        assert_eq!(config.export.output_dir(), PathBuf::from("exports"));
        assert_eq!(config.export.csv_style(), CsvStyle::Escaped);
        assert_eq!(config.export.format, ExportFormat::Xlsx);
        assert_eq!(config.logging.directory, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_validation_invalid_backend_url() {
        let mut config = AppConfig::default();
        config.backend.url = "ftp://invalid".to_string();
        config.backend.anon_key = "key".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_missing_anon_key() {
        let mut config = AppConfig::default();
        config.backend.url = "https://demo.supabase.co".to_string();
        assert!(config.validate().is_err());

        config.backend.anon_key = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_delay_bounds() {
        let mut config = AppConfig::default();

        config.simulation.processing_delay_ms = MAX_PROCESSING_DELAY_MS + 1;
        assert!(config.validate().is_err());

        config.simulation.processing_delay_ms = MAX_PROCESSING_DELAY_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("rollcall-no-such-dir").join("config.toml");
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Missing));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir()
            .join(format!("rollcall-config-{}", std::process::id()))
            .join("config.toml");
        let mut config = AppConfig::default();
        config.simulation.processing_delay_ms = 500;
        config.save(&path).unwrap();

        match AppConfig::try_load(&path) {
            ConfigLoadResult::Loaded(loaded) => assert_eq!(loaded.simulation.processing_delay_ms, 500),
            other => panic!("unexpected load result: {other:?}"),
        }

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
