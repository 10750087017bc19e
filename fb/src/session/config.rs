//! Session tuning knobs

use std::time::Duration;

/// Timing and capacity parameters for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for every correlated request
    pub request_timeout: Duration,

    /// Keepalive cadence while Ready
    pub heartbeat_interval: Duration,

    /// Upper bound on concurrently in-flight requests
    pub pending_capacity: usize,

    /// Client version string reported in the login request
    pub client_version: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            pending_capacity: 64,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
