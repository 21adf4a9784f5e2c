//! Clap derive structures for the `aquamon` CLI.
//!
//! Only depends on clap + clap_complete so `build.rs` can include it to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// aquamon -- watch aquaponics telemetry from the command line
#[derive(Debug, Parser)]
#[command(
    name = "aquamon",
    version,
    about = "Watch aquaponics sensor telemetry from the command line",
    long_about = "Connects to an ESP32 telemetry endpoint over WebSocket, classifies\n\
        every reading against water-quality thresholds and prints readings,\n\
        device status, heartbeats and alerts as they arrive.\n\n\
        `aquamon simulate` serves a mock device fleet for local testing.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "AQUAMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Telemetry endpoint (overrides the config file)
    #[arg(long, short = 'e', env = "AQUAMON_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AQUAMON_OUTPUT",
        default_value = "pretty",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored when interactive (default)
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON (one event per line)
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain tab-separated text (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream classified telemetry events from an endpoint
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Serve a simulated ESP32 device fleet over WebSocket
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Event kinds to print (comma-separated; default: all)
    #[arg(long, short = 'k', value_delimiter = ',')]
    pub kind: Vec<WatchKind>,

    /// Only print events from this device MAC
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Exit after this many data events (connection events don't count)
    #[arg(long, short = 'n')]
    pub count: Option<u64>,

    /// Override reconnect.max_attempts
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds allowed for each connect and handshake
    #[arg(
        long,
        value_name = "SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub connect_timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum WatchKind {
    Connection,
    SensorData,
    DeviceStatus,
    Alert,
    Heartbeat,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SIMULATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Listen address (overrides simulator.bind)
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Milliseconds between sensor rounds (overrides simulator.interval_ms)
    #[arg(long, short = 'i')]
    pub interval_ms: Option<u64>,

    /// Device MACs to simulate (comma-separated; overrides simulator.devices)
    #[arg(long, value_delimiter = ',')]
    pub devices: Vec<String>,

    /// Heartbeat every N rounds (overrides simulator.heartbeat_every)
    #[arg(long)]
    pub heartbeat_every: Option<u32>,

    /// Seed for reproducible readings
    #[arg(long)]
    pub seed: Option<u64>,

    /// Probability (0.0-1.0) per round that one channel jumps into alarm range
    #[arg(long, default_value = "0.0")]
    pub excursion: f64,

    /// Stop after this many rounds
    #[arg(long)]
    pub rounds: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration (defaults + file + environment)
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
