//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use aquamon_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Lost connection to {url} after {attempts} reconnect attempts")]
    #[diagnostic(
        code(aquamon::reconnect_exhausted),
        help(
            "Check that the device or simulator is running and reachable.\n\
             Try: aquamon simulate   (in another terminal)\n\
             Or raise the budget with --max-attempts."
        )
    )]
    ReconnectExhausted { url: String, attempts: u32 },

    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(aquamon::bind_failed),
        help("Another process may own the port. Pick one with --bind.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(aquamon::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(aquamon::no_config),
        help("Create one with: aquamon config init --config {path}")
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(aquamon::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Invalid configuration")]
    #[diagnostic(
        code(aquamon::config),
        help("Run `aquamon config show` to see the resolved values.")
    )]
    Config(#[source] Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON rendering failed: {0}")]
    #[diagnostic(code(aquamon::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(aquamon::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML rendering failed: {0}")]
    #[diagnostic(code(aquamon::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ReconnectExhausted { .. } | Self::Bind { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            Self::NoConfig { .. } | Self::ConfigExists { .. } | Self::Config(_) => {
                exit_code::CONFIG
            }
            _ => exit_code::GENERAL,
        }
    }

    /// A flag value failed validation; reported as a usage error.
    pub fn from_flag(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => other.into(),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::AlreadyExists { path } => Self::ConfigExists {
                path: path.display().to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(Box::new(other)),
        }
    }
}
