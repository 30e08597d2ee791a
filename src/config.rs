//! Server configuration.
//!
//! A JSON file, by default at [`DEFAULT_CONFIG_PATH`]. Missing fields take
//! their defaults and unknown fields are ignored, so old files keep
//! loading. The unit is written back whenever a viewer changes it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ble::transport::DeviceAddress;
use crate::data::Unit;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ibbqweb/ibbqweb.json";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Server configuration.
///
/// Fields are declared in alphabetical order so saved files have sorted keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Thermometer address; discovered by name when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<DeviceAddress>,
    /// Alarm presets offered to viewers.
    pub alarm_presets: Vec<AlarmPreset>,
    /// Whether viewers may power the host off.
    pub allow_poweroff: bool,
    /// HTTP listen port.
    pub http_port: u16,
    /// PEM certificate chain; HTTPS is served when set with `tls_key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert: Option<PathBuf>,
    /// PEM private key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_key: Option<PathBuf>,
    /// Display unit.
    pub unit: Unit,
    /// Directory of static viewer files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webroot: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: None,
            alarm_presets: Vec::new(),
            allow_poweroff: false,
            http_port: DEFAULT_HTTP_PORT,
            tls_cert: None,
            tls_key: None,
            unit: Unit::default(),
            webroot: None,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load configuration from a file, or the defaults if it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        content.push('\n');

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - TLS certificate and key are given together
    /// - HTTP port is not 0
    /// - Preset names are not empty and their ranges are not inverted
    ///
    /// # Example
    ///
    /// ```
    /// use ibbq_rust_ble::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.tls_cert.is_some() != self.tls_key.is_some() {
            errors.push(ValidationError {
                field: "tls_cert".to_string(),
                message: "must specify both or neither of 'tls_cert' and 'tls_key'".to_string(),
            });
        }

        if self.http_port == 0 {
            errors.push(ValidationError {
                field: "http_port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }

        for (i, preset) in self.alarm_presets.iter().enumerate() {
            errors.extend(preset.validate(&format!("alarm_presets[{}]", i)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Certificate chain and key paths, when HTTPS is configured.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

/// A named alarm range offered to viewers, in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmPreset {
    /// Label shown to viewers.
    pub name: String,
    /// Lower bound.
    #[serde(default)]
    pub min_temp: Option<f64>,
    /// Upper bound.
    pub max_temp: f64,
}

impl AlarmPreset {
    /// Validate one preset.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ValidationError {
                field: format!("{}.name", prefix),
                message: "preset name cannot be empty".to_string(),
            });
        }

        if !self.max_temp.is_finite() {
            errors.push(ValidationError {
                field: format!("{}.max_temp", prefix),
                message: "must be a finite temperature".to_string(),
            });
        }

        if let Some(min_temp) = self.min_temp {
            if min_temp >= self.max_temp {
                errors.push(ValidationError {
                    field: format!("{}.min_temp", prefix),
                    message: format!(
                        "min_temp {} must be below max_temp {}",
                        min_temp, self.max_temp
                    ),
                });
            }
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `http_port` or `alarm_presets[0].name`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn preset(name: &str, min_temp: Option<f64>, max_temp: f64) -> AlarmPreset {
        AlarmPreset {
            name: name.to_string(),
            min_temp,
            max_temp,
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.unit, Unit::Fahrenheit);
        assert!(config.address.is_none());
        assert!(!config.allow_poweroff);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.json")).unwrap();
        assert_eq!(config, Config::default());

        let err = Config::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_partial_and_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ibbqweb.json");
        std::fs::write(&path, r#"{"unit": "C", "probe_count": 4}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.unit, Unit::Celsius);
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn test_load_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ibbqweb.json");
        std::fs::write(&path, r#"{"unit": "K"}"#).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ibbqweb.json");

        let config = Config {
            address: Some("AA:BB:CC:DD:EE:FF".into()),
            alarm_presets: vec![preset("beef (medium rare)", None, 57.0)],
            http_port: 9090,
            unit: Unit::Celsius,
            ..Config::default()
        };
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_saved_keys_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ibbqweb.json");
        Config::default().save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<usize> = ["alarm_presets", "allow_poweroff", "http_port", "unit"]
            .iter()
            .map(|k| content.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(!content.contains("tls_cert"));
    }

    #[test]
    fn test_validate_tls_pair() {
        let config = Config {
            tls_cert: Some("/etc/ssl/cert.pem".into()),
            ..Config::default()
        };
        assert!(config.tls_paths().is_none());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tls_cert"));

        let config = Config {
            tls_cert: Some("/etc/ssl/cert.pem".into()),
            tls_key: Some("/etc/ssl/key.pem".into()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            config.tls_paths(),
            Some((Path::new("/etc/ssl/cert.pem"), Path::new("/etc/ssl/key.pem")))
        );
    }

    #[test]
    fn test_validate_port_and_presets() {
        let config = Config {
            http_port: 0,
            alarm_presets: vec![
                preset("", None, 70.0),
                preset("chicken", Some(80.0), 74.0),
                preset("pork", Some(60.0), 71.0),
            ],
            ..Config::default()
        };

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec!["http_port", "alarm_presets[0].name", "alarm_presets[1].min_temp"]
                );
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
