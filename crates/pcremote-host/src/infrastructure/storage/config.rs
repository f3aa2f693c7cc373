//! TOML-based configuration for the host.
//!
//! Reads and writes [`AppConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\PCRemote\config.toml`
//! - Linux:    `~/.config/pcremote/config.toml`
//! - macOS:    `~/Library/Application Support/PCRemote/config.toml`
//!
//! Every field has a serde default, so an empty or partial file is valid and
//! a missing file means "all defaults".
//!
//! ```toml
//! [host]
//! show_qr = true
//! allow_shutdown = false
//!
//! [network]
//! discovery_port = 41234
//! control_port = 41235
//!
//! [input]
//! speed_factor = 1.5
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pcremote_core::protocol::{
    buffer::DEFAULT_MAX_PENDING_BYTES,
    tokens::{DEFAULT_CONTROL_PORT, DEFAULT_DISCOVERY_PORT},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::host::HostPolicy;
use crate::application::pointer::PointerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

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

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `network.bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub input: InputSettings,
}

/// General host behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSettings {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Draw the pairing secret as a terminal QR code.
    #[serde(default = "default_true")]
    pub show_qr: bool,
    /// Let `COMMAND:SHUTDOWN` power the machine off.
    #[serde(default)]
    pub allow_shutdown: bool,
    /// Go back to discovery after a rejected pairing instead of exiting.
    #[serde(default = "default_true")]
    pub rearm_after_rejection: bool,
    #[serde(default = "default_warning_threshold")]
    pub compromise_warning_threshold: u32,
    /// Seconds a client may take to confirm pairing; `0` waits forever.
    #[serde(default)]
    pub pairing_timeout_secs: u64,
}

/// Socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSettings {
    /// IP address to bind both sockets to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Largest undelimited run of bytes kept per connection.
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
}

/// Pointer tuning.  See [`PointerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSettings {
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    #[serde(default = "default_base_acceleration")]
    pub base_acceleration: f64,
    #[serde(default = "default_max_acceleration")]
    pub max_acceleration: f64,
    #[serde(default = "default_acceleration_sensitivity")]
    pub acceleration_sensitivity: f64,
    #[serde(default = "default_micro_steps")]
    pub micro_steps: u32,
    #[serde(default = "default_flush_hz")]
    pub flush_hz: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_warning_threshold() -> u32 {
    3
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}
fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}
fn default_max_pending_bytes() -> usize {
    DEFAULT_MAX_PENDING_BYTES
}
fn default_speed_factor() -> f64 {
    1.5
}
fn default_smoothing_factor() -> f64 {
    0.15
}
fn default_decay_factor() -> f64 {
    0.3
}
fn default_base_acceleration() -> f64 {
    1.0
}
fn default_max_acceleration() -> f64 {
    1.5
}
fn default_acceleration_sensitivity() -> f64 {
    0.015
}
fn default_micro_steps() -> u32 {
    2
}
fn default_flush_hz() -> u32 {
    60
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            show_qr: default_true(),
            allow_shutdown: false,
            rearm_after_rejection: default_true(),
            compromise_warning_threshold: default_warning_threshold(),
            pairing_timeout_secs: 0,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            discovery_port: default_discovery_port(),
            control_port: default_control_port(),
            max_pending_bytes: default_max_pending_bytes(),
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            speed_factor: default_speed_factor(),
            smoothing_factor: default_smoothing_factor(),
            decay_factor: default_decay_factor(),
            base_acceleration: default_base_acceleration(),
            max_acceleration: default_max_acceleration(),
            acceleration_sensitivity: default_acceleration_sensitivity(),
            micro_steps: default_micro_steps(),
            flush_hz: default_flush_hz(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl AppConfig {
    pub fn host_policy(&self) -> HostPolicy {
        HostPolicy {
            rearm_after_rejection: self.host.rearm_after_rejection,
            compromise_warning_threshold: self.host.compromise_warning_threshold.max(1),
            pairing_timeout: match self.host.pairing_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_pending_bytes: self.network.max_pending_bytes,
        }
    }

    pub fn pointer_config(&self) -> PointerConfig {
        let input = &self.input;
        PointerConfig {
            speed_factor: input.speed_factor,
            smoothing_factor: input.smoothing_factor,
            decay_factor: input.decay_factor,
            base_acceleration: input.base_acceleration,
            max_acceleration: input.max_acceleration,
            acceleration_sensitivity: input.acceleration_sensitivity,
            micro_steps: input.micro_steps,
            flush_interval: Duration::from_secs(1) / input.flush_hz.max(1),
        }
    }

    /// UDP address the discovery responder binds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` does not
    /// parse as an IP address.
    pub fn discovery_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.network.discovery_port))
    }

    /// TCP address the control listener binds.
    pub fn control_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.network.control_port))
    }

    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the default location, returning defaults when the
/// file does not exist yet.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, returning defaults when it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path` as pretty TOML, creating the parent directory.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PCRemote"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pcremote"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PCRemote")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("pcremote_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_uses_protocol_ports() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.network.discovery_port, 41234);
        assert_eq!(cfg.network.control_port, 41235);
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_shutdown_is_disabled_by_default() {
        let cfg = AppConfig::default();
        assert!(!cfg.host.allow_shutdown);
        assert!(cfg.host.show_qr);
    }

    #[test]
    fn test_default_pointer_config_matches_smoother_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pointer_config(), PointerConfig::default());
    }

    #[test]
    fn test_default_host_policy_matches_application_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.host_policy(), HostPolicy::default());
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[network]
control_port = 9999
[input]
micro_steps = 4
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.control_port, 9999);
        assert_eq!(cfg.network.discovery_port, 41234);
        assert_eq!(cfg.input.micro_steps, 4);
        assert_eq!(cfg.input.speed_factor, 1.5);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    #[test]
    fn test_pairing_timeout_zero_means_none() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.host_policy().pairing_timeout, None);

        cfg.host.pairing_timeout_secs = 30;
        assert_eq!(cfg.host_policy().pairing_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_flush_hz_becomes_interval() {
        let mut cfg = AppConfig::default();
        cfg.input.flush_hz = 100;
        assert_eq!(cfg.pointer_config().flush_interval, Duration::from_millis(10));

        cfg.input.flush_hz = 0;
        assert_eq!(cfg.pointer_config().flush_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bind_addresses_combine_ip_and_ports() {
        let mut cfg = AppConfig::default();
        cfg.network.bind_address = "127.0.0.1".to_string();

        assert_eq!(cfg.discovery_addr().unwrap(), "127.0.0.1:41234".parse().unwrap());
        assert_eq!(cfg.control_addr().unwrap(), "127.0.0.1:41235".parse().unwrap());
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.network.bind_address = "not-an-ip".to_string();

        assert!(matches!(
            cfg.control_addr(),
            Err(ConfigError::InvalidBindAddress(addr)) if addr == "not-an-ip"
        ));
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.network.control_port = 12345;
        cfg.host.log_level = "debug".to_string();
        cfg.host.allow_shutdown = true;

        // Act
        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
