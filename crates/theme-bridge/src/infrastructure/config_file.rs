//! TOML configuration file for the bridge binary.
//!
//! Every field is optional; a missing file or a missing section falls back to
//! the built-in defaults.
//!
//! ```toml
//! [messenger]
//! apply_timeout_secs = 30
//!
//! [host]
//! bind_address = "127.0.0.1:8000"
//! origin = "http://localhost:8000"
//!
//! [guest]
//! url = "https://localhost:7170/"
//! host_url = "ws://127.0.0.1:8000"
//!
//! [[origins]]
//! guest = "https://localhost:7170"
//! host = "http://localhost:8000"
//! ```
//!
//! When `[[origins]]` is present it *replaces* the built-in trust table
//! rather than extending it, so a deployment trusts exactly what it lists.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use theme_core::{Origin, OriginError, OriginRegistry};

use crate::domain::config::{BridgeConfig, GuestConfig, HostConfig, MessengerConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// An origin field is not a valid tuple origin.
    #[error("invalid origin in `{field}`: {source}")]
    InvalidOrigin {
        field: &'static str,
        #[source]
        source: OriginError,
    },

    /// A URL field could not be parsed.
    #[error("invalid URL in `{field}` ('{value}'): {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: url::ParseError,
    },

    /// `host.bind_address` is not a socket address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
}

// ── File schema ───────────────────────────────────────────────────────────────

/// On-disk representation of [`BridgeConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub messenger: MessengerSection,
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub guest: GuestSection,
    /// Guest → host trust pairs.  Empty means "use the built-in table".
    #[serde(default)]
    pub origins: Vec<OriginPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessengerSection {
    /// Seconds the theme backend may take before the request fails.
    #[serde(default = "default_apply_timeout_secs")]
    pub apply_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_host_origin")]
    pub origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestSection {
    #[serde(default = "default_guest_url")]
    pub url: String,
    #[serde(default = "default_host_url")]
    pub host_url: String,
}

/// One `[[origins]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OriginPair {
    pub guest: String,
    pub host: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_apply_timeout_secs() -> u64 {
    30
}
fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_host_origin() -> String {
    "http://localhost:8000".to_string()
}
fn default_guest_url() -> String {
    "https://localhost:7170/".to_string()
}
fn default_host_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

impl Default for MessengerSection {
    fn default() -> Self {
        Self {
            apply_timeout_secs: default_apply_timeout_secs(),
        }
    }
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            origin: default_host_origin(),
        }
    }
}

impl Default for GuestSection {
    fn default() -> Self {
        Self {
            url: default_guest_url(),
            host_url: default_host_url(),
        }
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl ConfigFile {
    /// Validates every field and builds the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid origin, URL, or address encountered.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        let origins = if self.origins.is_empty() {
            OriginRegistry::with_defaults()
        } else {
            self.origins
                .iter()
                .map(|pair| {
                    Ok((
                        parse_origin("origins.guest", &pair.guest)?,
                        parse_origin("origins.host", &pair.host)?,
                    ))
                })
                .collect::<Result<OriginRegistry, ConfigError>>()?
        };

        let bind_addr: SocketAddr = self
            .host
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.host.bind_address.clone()))?;

        Ok(BridgeConfig {
            messenger: MessengerConfig {
                origins,
                apply_timeout: Duration::from_secs(self.messenger.apply_timeout_secs),
            },
            host: HostConfig {
                bind_addr,
                origin: parse_origin("host.origin", &self.host.origin)?,
            },
            guest: GuestConfig {
                url: parse_url("guest.url", &self.guest.url)?,
                host_url: parse_url("guest.host_url", &self.guest.host_url)?,
            },
        })
    }
}

fn parse_origin(field: &'static str, value: &str) -> Result<Origin, ConfigError> {
    Origin::parse(value).map_err(|source| ConfigError::InvalidOrigin { field, source })
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|reason| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason,
    })
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses TOML text into a validated [`BridgeConfig`].
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML, or a validation error.
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;
    file.into_bridge_config()
}

/// Loads the config file at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, or a validation error.
pub fn load_config_file(path: &Path) -> Result<BridgeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BridgeConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        let defaults = BridgeConfig::default();

        assert_eq!(cfg.host.bind_addr, defaults.host.bind_addr);
        assert_eq!(cfg.host.origin, defaults.host.origin);
        assert_eq!(cfg.guest.url, defaults.guest.url);
        assert_eq!(cfg.messenger.apply_timeout, Duration::from_secs(30));
        assert_eq!(cfg.messenger.origins, OriginRegistry::with_defaults());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg = parse_config("[host]\nbind_address = \"0.0.0.0:9100\"\n").unwrap();
        assert_eq!(cfg.host.bind_addr.port(), 9100);
        assert_eq!(cfg.host.origin.as_str(), "http://localhost:8000");
    }

    #[test]
    fn test_origins_table_replaces_builtin_registry() {
        // Arrange
        let toml = r#"
            [[origins]]
            guest = "https://docs.example.com"
            host = "https://portal.example.com/"
        "#;

        // Act
        let cfg = parse_config(toml).unwrap();

        // Assert
        assert_eq!(cfg.messenger.origins.len(), 1);
        let guest = Origin::parse("https://docs.example.com").unwrap();
        assert_eq!(
            cfg.messenger.origins.trusted_host_for(&guest).map(Origin::as_str),
            Some("https://portal.example.com")
        );
        let local = Origin::parse("https://localhost:7170").unwrap();
        assert!(cfg.messenger.origins.trusted_host_for(&local).is_none());
    }

    #[test]
    fn test_apply_timeout_is_read_in_seconds() {
        let cfg = parse_config("[messenger]\napply_timeout_secs = 5\n").unwrap();
        assert_eq!(cfg.messenger.apply_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_origin_names_the_field() {
        let err = parse_config("[host]\norigin = \"not an origin\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOrigin {
                field: "host.origin",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let err = parse_config("[host]\nbind_address = \"localhost\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }

    #[test]
    fn test_invalid_guest_url_is_rejected() {
        let err = parse_config("[guest]\nhost_url = \"::nope\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                field: "guest.host_url",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("[host\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!(
            "theme-bridge-missing-{}.toml",
            uuid::Uuid::new_v4()
        ));
        let cfg = load_config_file(&path).unwrap();
        assert_eq!(cfg.host.bind_addr, BridgeConfig::default().host.bind_addr);
    }

    #[test]
    fn test_file_on_disk_is_loaded() {
        // Arrange: write to a unique temp file
        let path = std::env::temp_dir().join(format!(
            "theme-bridge-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "[guest]\nurl = \"https://localhost:7170/grid?x=1\"\n").unwrap();

        // Act
        let result = load_config_file(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        let cfg = result.unwrap();
        assert_eq!(cfg.guest.url.path(), "/grid");
    }

    #[test]
    fn test_default_schema_round_trips_through_toml() {
        let text = toml::to_string_pretty(&ConfigFile::default()).unwrap();
        let parsed: ConfigFile = toml::from_str(&text).unwrap();
        assert_eq!(parsed, ConfigFile::default());
    }
}
