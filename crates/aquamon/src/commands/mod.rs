//! Command handlers. `main` dispatches to these directly.

pub mod config_cmd;
pub mod simulate;
pub mod watch;
