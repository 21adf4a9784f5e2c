// ── Runtime connection configuration ──
//
// These types describe *where* to connect and *how* to retry.
// They never touch disk; aquamon-config builds a `ManagerConfig`
// from files and environment and hands it in.

use std::time::Duration;

use url::Url;

use crate::error::CoreError;

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Exponential backoff for reconnection attempts.
///
/// Attempt `n` (1-based) waits `base_delay * 2^(n-1)`. No jitter and no
/// ceiling other than `max_attempts` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub base_delay: Duration,

    /// Attempts allowed before giving up for the session. Default: 5.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// The full delay schedule this policy produces before giving up.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(|n| self.delay_for(n))
    }
}

// ── ManagerConfig ────────────────────────────────────────────────────

/// Configuration for one [`RealtimeManager`](crate::RealtimeManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Telemetry endpoint (e.g. `ws://localhost:8080`).
    pub endpoint: Url,
    pub reconnect: ReconnectPolicy,
}

impl ManagerConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Parse the endpoint from a string.
    pub fn from_endpoint(endpoint: &str) -> Result<Self, CoreError> {
        let url = endpoint.parse().map_err(|e| CoreError::Config {
            message: format!("invalid endpoint '{endpoint}': {e}"),
        })?;
        Ok(Self::new(url))
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}
