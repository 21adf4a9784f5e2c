//! Shared configuration for aquamon tools.
//!
//! One TOML file plus `AQUAMON_*` environment overrides, layered with
//! figment, and translation to `aquamon_core::ManagerConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use aquamon_core::{ManagerConfig, ReconnectPolicy};

/// Prefix for environment overrides. Nested keys use `__`,
/// e.g. `AQUAMON_RECONNECT__MAX_ATTEMPTS=8`.
pub const ENV_PREFIX: &str = "AQUAMON_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration shared by `watch` and `simulate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Telemetry WebSocket endpoint.
    pub endpoint: String,

    pub reconnect: ReconnectSettings,

    pub simulator: SimulatorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080".into(),
            reconnect: ReconnectSettings::default(),
            simulator: SimulatorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

/// Settings for the mock device fleet served by `aquamon simulate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Listen address.
    pub bind: String,

    /// Milliseconds between sensor rounds.
    pub interval_ms: u64,

    /// MAC addresses of the simulated devices.
    pub devices: Vec<String>,

    /// Send a heartbeat every N sensor rounds.
    pub heartbeat_every: u32,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            interval_ms: 2000,
            devices: vec!["AA:BB:CC:DD:EE:01".into(), "AA:BB:CC:DD:EE:02".into()],
            heartbeat_every: 5,
        }
    }
}

impl SimulatorSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|e| invalid("simulator.bind", format!("'{}': {e}", self.bind)))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject settings the simulator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.interval_ms == 0 {
            return Err(invalid("simulator.interval_ms", "must be greater than zero"));
        }
        if self.heartbeat_every == 0 {
            return Err(invalid("simulator.heartbeat_every", "must be greater than zero"));
        }
        if self.devices.is_empty() {
            return Err(invalid("simulator.devices", "at least one device is required"));
        }
        Ok(())
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse and check a telemetry endpoint: `ws://` or `wss://` with a host.
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw
        .parse()
        .map_err(|e| invalid("endpoint", format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid(
            "endpoint",
            format!("'{raw}': scheme must be ws or wss, got '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("endpoint", format!("'{raw}': missing host")));
    }
    Ok(url)
}

impl Config {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    /// Build the manager configuration, validating the endpoint.
    pub fn to_manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        let endpoint = parse_endpoint(&self.endpoint)?;
        Ok(ManagerConfig::new(endpoint).with_reconnect(self.reconnect_policy()))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "aquamon", "aquamon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("aquamon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered provider stack: defaults, then `path`, then environment.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from an explicit file + environment. A missing file is
/// treated as empty.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent dirs.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Write the default config to `path`. Refuses to overwrite unless `force`.
pub fn init_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    save_config_to(&Config::default(), path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_translates_to_default_policy() {
        let manager = Config::default().to_manager_config().unwrap();
        assert_eq!(manager.endpoint.as_str(), "ws://localhost:8080/");
        assert_eq!(manager.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn endpoint_must_be_websocket() {
        for bad in ["http://localhost:8080", "localhost:8080", "not a url", "ws://"] {
            let err = parse_endpoint(bad).unwrap_err();
            assert!(
                matches!(err, ConfigError::Validation { ref field, .. } if field == "endpoint"),
                "{bad}: {err}"
            );
        }
        assert!(parse_endpoint("wss://tank.local/stream").is_ok());
    }

    #[test]
    fn simulator_settings_validate() {
        assert!(SimulatorSettings::default().validate().is_ok());

        let zero_interval = SimulatorSettings {
            interval_ms: 0,
            ..SimulatorSettings::default()
        };
        assert!(zero_interval.validate().is_err());

        let bad_bind = SimulatorSettings {
            bind: "localhost".into(),
            ..SimulatorSettings::default()
        };
        assert!(bad_bind.validate().is_err());

        let no_devices = SimulatorSettings {
            devices: Vec::new(),
            ..SimulatorSettings::default()
        };
        assert!(no_devices.validate().is_err());
    }
}
