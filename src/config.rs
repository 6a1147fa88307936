//! System configuration parameters
//!
//! All tunable parameters for the Millennium controller, grouped by
//! subsystem.  Every section defaults field-by-field, so a config file
//! only needs the keys it changes.  Loaded by the
//! [`JsonConfigAdapter`](crate::adapters::config_file::JsonConfigAdapter).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "MILLENNIUM_LOG_LEVEL";

/// Core system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub serial: SerialConfig,
    pub call: CallConfig,
    pub cards: CardConfig,
    pub display: DisplayConfig,
    pub persistence: PersistenceConfig,
    pub plugins: PluginConfig,
    pub bridge: BridgeConfig,
    pub system: LoopConfig,
    pub logging: LoggingConfig,
}

/// Panel serial link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path of the panel's USB serial port
    pub device: PathBuf,
    /// Line speed (8N1, no flow control)
    pub baud_rate: u32,
    /// Would-block retries before a write is abandoned
    pub write_retry_limit: u32,
    /// Sleep between would-block retries (microseconds)
    pub write_retry_sleep_us: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/serial/by-id/usb-Arduino_LLC_Millennium_Beta-if00"),
            baud_rate: 9600,
            write_retry_limit: 50,
            write_retry_sleep_us: 200,
        }
    }
}

/// Call pricing and time limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Price of a paid call (cents)
    pub cost_cents: u32,
    /// Hard limit on a paid call (seconds)
    pub timeout_secs: u32,
    /// Countdown shown once this many seconds remain
    pub warning_secs: u32,
    /// Idle handset-up session is abandoned after this long (seconds)
    pub idle_timeout_secs: u32,
    /// Numbers dialled without payment, matched exactly
    pub free_numbers: Vec<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            cost_cents: 50,
            timeout_secs: 300,
            warning_secs: 60,
            idle_timeout_secs: 60,
            free_numbers: vec!["911".into(), "311".into(), "0".into()],
        }
    }
}

impl CallConfig {
    /// Exact match against the configured free numbers.
    pub fn is_free_number(&self, number: &str) -> bool {
        !number.is_empty() && self.free_numbers.iter().any(|n| n == number)
    }
}

/// Calling-card reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub enabled: bool,
    /// Cards that make calls free of charge
    pub free_cards: Vec<String>,
    /// Service cards: free calls plus an admin banner
    pub admin_cards: Vec<String>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            free_cards: Vec::new(),
            admin_cards: Vec::new(),
        }
    }
}

/// Two-line display timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Minimum gap between physical display writes (ms)
    pub refresh_interval_ms: u64,
    /// Marquee step for lines wider than the display (ms)
    pub scroll_interval_ms: u64,
    /// Lifetime of transient messages such as "Call failed" (seconds)
    pub banner_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 33,
            scroll_interval_ms: 300,
            banner_secs: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub state_file: PathBuf,
    /// fsync the temp file before the rename
    pub fsync: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            state_file: PathBuf::from("/var/lib/millennium/state"),
            fsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Personality activated at start-up
    pub default: String,
    pub fortune_cost_cents: u32,
    pub jukebox_cost_cents: u32,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            default: "Classic Phone".into(),
            fortune_cost_cents: 25,
            jukebox_cost_cents: 25,
        }
    }
}

/// Simulated signaling backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Report the user agent as registered
    pub registered: bool,
    /// Delay before a placed call reports established (ms)
    pub answer_delay_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            registered: true,
            answer_delay_ms: 1500,
        }
    }
}

/// Main loop cadence and housekeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Sleep at the end of each poll iteration (ms)
    pub poll_interval_ms: u64,
    /// STATS log line period (seconds)
    pub stats_interval_secs: u64,
    /// Warn after this long without activity (seconds)
    pub inactivity_warn_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            stats_interval_secs: 300,
            inactivity_warn_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl SystemConfig {
    /// Apply environment overrides on top of the loaded values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.to_ascii_lowercase();
        }
    }
}
