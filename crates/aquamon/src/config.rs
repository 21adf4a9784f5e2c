//! CLI configuration: thin wrapper around `aquamon_config`.
//!
//! Adds resolution that respects `GlobalOpts` overrides (`--config`,
//! `--endpoint`).

use std::path::PathBuf;

use aquamon_core::ManagerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use aquamon_config::{Config, config_path, init_config, load_config_from, parse_endpoint};

/// `--config` if given, otherwise the platform default.
pub fn resolved_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load defaults + file + environment.
///
/// An explicit `--config` must exist; the default path is optional.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolved_path(global);
    if global.config.is_some() && !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    Ok(load_config_from(&path)?)
}

/// Translate config + flags into a `ManagerConfig`.
///
/// `--endpoint` takes priority over the file; a bad flag value is a usage
/// error while a bad file value is a configuration error.
pub fn manager_config(
    global: &GlobalOpts,
    cfg: &Config,
    max_attempts: Option<u32>,
) -> Result<ManagerConfig, CliError> {
    let endpoint = match global.endpoint.as_deref() {
        Some(flag) => parse_endpoint(flag).map_err(CliError::from_flag)?,
        None => parse_endpoint(&cfg.endpoint)?,
    };

    let mut policy = cfg.reconnect_policy();
    if let Some(max) = max_attempts {
        policy.max_attempts = max;
    }

    Ok(ManagerConfig::new(endpoint).with_reconnect(policy))
}
