//! Output formatting: pretty, JSON, YAML, plain.
//!
//! `watch` renders one event at a time so output streams; `config show`
//! renders the resolved configuration as a table or a serde document.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Style};
use tabled::{Table, Tabled, settings::Style as TableStyle};

use aquamon_config::Config;
use aquamon_core::{
    Alert, AlertSeverity, ConnectionEvent, ConnectionStatus, DeviceState, DeviceStatus, Heartbeat,
    RealtimeEvent, SensorReading, SensorStatus,
};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        text.style(style).to_string()
    } else {
        text.to_owned()
    }
}

fn sensor_style(status: SensorStatus) -> Style {
    match status {
        SensorStatus::Normal => Style::new().green(),
        SensorStatus::Warning => Style::new().yellow(),
        SensorStatus::Critical => Style::new().red().bold(),
    }
}

fn severity_style(severity: AlertSeverity) -> Style {
    match severity {
        AlertSeverity::Info => Style::new().cyan(),
        AlertSeverity::Warning => Style::new().yellow(),
        AlertSeverity::Critical => Style::new().red().bold(),
    }
}

fn device_style(state: DeviceState) -> Style {
    match state {
        DeviceState::Online => Style::new().green(),
        DeviceState::Offline => Style::new().dimmed(),
        DeviceState::Error => Style::new().red(),
        DeviceState::Unknown => Style::new().yellow(),
    }
}

// ── Event rendering ──────────────────────────────────────────────────

/// Render one event in the chosen format. Never ends with a newline.
pub fn render_event(
    format: OutputFormat,
    event: &RealtimeEvent,
    color: bool,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Pretty => pretty_event(event, color),
        OutputFormat::Json => serde_json::to_string_pretty(event)?,
        OutputFormat::JsonCompact => serde_json::to_string(event)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(event)?.trim_end()),
        OutputFormat::Plain => plain_event(event),
    })
}

fn clock(ts: &DateTime<Utc>) -> String {
    ts.format("%H:%M:%S").to_string()
}

fn mac(device_mac: Option<&str>) -> &str {
    device_mac.unwrap_or("-")
}

fn pretty_event(event: &RealtimeEvent, color: bool) -> String {
    match event {
        RealtimeEvent::Connection(c) => pretty_connection(c, color),
        RealtimeEvent::SensorData(r) => pretty_reading(r, color),
        RealtimeEvent::DeviceStatus(s) => pretty_device(s, color),
        RealtimeEvent::Alert(a) => pretty_alert(a, color),
        RealtimeEvent::Heartbeat(h) => pretty_heartbeat(h, color),
    }
}

fn pretty_connection(c: &ConnectionEvent, color: bool) -> String {
    let style = match c.status {
        ConnectionStatus::Connected => Style::new().green().bold(),
        ConnectionStatus::Disconnected => Style::new().yellow(),
        ConnectionStatus::Error => Style::new().red(),
    };
    let mut line = format!(
        "{}  {:<10} {}",
        clock(&Utc::now()),
        "connection",
        paint(&c.status.to_string(), style, color)
    );
    if let Some(ref detail) = c.error {
        let _ = write!(line, ": {detail}");
    }
    line
}

fn pretty_reading(r: &SensorReading, color: bool) -> String {
    let v = &r.values;
    format!(
        "{}  {:<10} {:<17} {}  temp {:.1}°C  pH {:.2}  DO {:.1} mg/L  NH3 {:.2} mg/L  \
         NO2 {:.2}  NO3 {:.1}  turb {:.1} NTU",
        clock(&r.timestamp),
        "sensor",
        mac(r.device_mac.as_deref()),
        paint(&format!("{:<8}", r.status.to_string()), sensor_style(r.status), color),
        v.temperature,
        v.ph,
        v.dissolved_oxygen,
        v.ammonia,
        v.nitrite,
        v.nitrate,
        v.turbidity,
    )
}

fn pretty_device(s: &DeviceStatus, color: bool) -> String {
    let mut line = format!(
        "{}  {:<10} {:<17} {}",
        clock(&s.timestamp),
        "device",
        mac(s.device_mac.as_deref()),
        paint(&s.state.to_string(), device_style(s.state), color)
    );
    if !s.details.is_empty() {
        let details: Vec<String> = s.details.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let _ = write!(line, "  {}", details.join(" "));
    }
    line
}

fn pretty_alert(a: &Alert, color: bool) -> String {
    let style = severity_style(a.severity);
    format!(
        "{}  {:<10} {:<17} {} {:<11} {}",
        clock(&a.timestamp),
        paint("ALERT", style, color),
        mac(a.device_mac.as_deref()),
        paint(&format!("{:<8}", a.severity.to_string()), style, color),
        a.category.to_string(),
        a.message
    )
}

fn pretty_heartbeat(h: &Heartbeat, color: bool) -> String {
    format!(
        "{}  {:<10} {:<17} {}",
        clock(&h.timestamp),
        "heartbeat",
        mac(h.device_mac.as_deref()),
        paint(&h.status, Style::new().dimmed(), color)
    )
}

/// `kind<TAB>device<TAB>summary`, stable for scripting.
fn plain_event(event: &RealtimeEvent) -> String {
    let summary = match event {
        RealtimeEvent::Connection(c) => match c.error {
            Some(ref e) => format!("{} {e}", c.status),
            None => c.status.to_string(),
        },
        RealtimeEvent::SensorData(r) => format!(
            "{} {} {} {} {} {} {} {}",
            r.status,
            r.values.temperature,
            r.values.ph,
            r.values.dissolved_oxygen,
            r.values.turbidity,
            r.values.ammonia,
            r.values.nitrite,
            r.values.nitrate
        ),
        RealtimeEvent::DeviceStatus(s) => s.state.to_string(),
        RealtimeEvent::Alert(a) => format!("{} {} {}", a.severity, a.category, a.message),
        RealtimeEvent::Heartbeat(h) => h.status.clone(),
    };
    format!("{}\t{}\t{summary}", event.kind(), mac(event.device_mac()))
}

// ── Config rendering ─────────────────────────────────────────────────

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn config_rows(cfg: &Config) -> Vec<ConfigRow> {
    let row = |key, value: String| ConfigRow { key, value };
    vec![
        row("endpoint", cfg.endpoint.clone()),
        row("reconnect.max_attempts", cfg.reconnect.max_attempts.to_string()),
        row("reconnect.base_delay_ms", cfg.reconnect.base_delay_ms.to_string()),
        row("simulator.bind", cfg.simulator.bind.clone()),
        row("simulator.interval_ms", cfg.simulator.interval_ms.to_string()),
        row("simulator.devices", cfg.simulator.devices.join(", ")),
        row(
            "simulator.heartbeat_every",
            cfg.simulator.heartbeat_every.to_string(),
        ),
    ]
}

/// Render the resolved config. `plain` emits the TOML a file would hold.
pub fn render_config(format: OutputFormat, cfg: &Config) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Pretty => Table::new(config_rows(cfg))
            .with(TableStyle::rounded())
            .to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(cfg)?,
        OutputFormat::JsonCompact => serde_json::to_string(cfg)?,
        OutputFormat::Yaml => serde_yaml::to_string(cfg)?.trim_end().to_owned(),
        OutputFormat::Plain => toml::to_string_pretty(cfg)?.trim_end().to_owned(),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}
