use std::time::Duration;

use gnsslink_frame::FramerConfig;
use serde::Deserialize;

/// Default period of the watchdog loop.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

/// Default pause between failed reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Driver settings consumed by the supervisor.
///
/// Either flag selects replay mode: end-of-stream is completion, not a
/// connection loss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Input is a recorded receiver log.
    pub read_from_log_file: bool,
    /// Input is a network capture.
    pub read_from_capture_file: bool,
}

impl Settings {
    pub fn is_replay(&self) -> bool {
        self.read_from_log_file || self.read_from_capture_file
    }
}

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often the watchdog checks the I/O task.
    pub watchdog_interval: Duration,
    /// Pause between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Send a liveness byte on every watchdog tick (TCP only).
    pub keepalive: bool,
    /// Framing limits.
    pub framer: FramerConfig,
    pub settings: Settings,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            keepalive: true,
            framer: FramerConfig::default(),
            settings: Settings::default(),
        }
    }
}
