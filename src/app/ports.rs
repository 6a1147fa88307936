//! Port traits: the hexagonal boundary between the controller and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DaemonController (domain)
//! ```
//!
//! | Port                | Direction          | Real adapter              |
//! |---------------------|--------------------|---------------------------|
//! | `CallBridge`        | domain → signaling | simulated SIP user agent  |
//! | `CoinValidatorPort` | domain → panel     | serial tty                |
//! | `DisplayPort`       | domain → panel     | serial tty                |
//! | `AudioFeedback`     | domain → speaker   | log-only tone player      |
//! | `EventSink`         | domain → logs      | `LogEventSink`            |
//! | `ConfigPort`        | config file ↔      | JSON file                 |
//! | `StatePort`         | state file ↔       | key=value file            |
//!
//! Output ports are fire-and-forget: adapters log their own failures and
//! the domain never branches on them.

use crate::config::SystemConfig;
use crate::persistence::PersistedState;

// ───────────────────────────────────────────────────────────────
// Call bridge (driven adapter: domain → signaling backend)
// ───────────────────────────────────────────────────────────────

/// Registration with the signaling backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Registered,
    Unregistered,
}

/// Narrow interface onto the VoIP stack.  Call progress comes back
/// asynchronously as `Event::CallState` on the event queue.
pub trait CallBridge {
    /// Dial `number`.
    fn place(&mut self, number: &str);

    /// Answer the ringing call.
    fn answer(&mut self);

    /// Hang up whatever call leg exists.
    fn hangup(&mut self);

    /// Send one DTMF digit on the active call.
    fn send_dtmf(&mut self, digit: char);

    fn registration_status(&self) -> RegistrationStatus;

    /// Stop the backend and join its thread.  Default: nothing to stop.
    fn shutdown(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Panel ports (driven adapter: domain → serial link)
// ───────────────────────────────────────────────────────────────

/// Coin validator: single command byte (see `link::codec::coin_cmd`).
pub trait CoinValidatorPort {
    fn write(&mut self, command: u8);
}

/// Two-line character display.  Lines arrive already cut to width.
pub trait DisplayPort {
    fn write(&mut self, line1: &str, line2: &str);
}

/// Both panel outputs on one link.  Lets a single adapter satisfy both
/// without a double mutable borrow.
pub trait PanelPort: CoinValidatorPort + DisplayPort {
    fn coin_command(&mut self, command: u8) {
        CoinValidatorPort::write(self, command);
    }

    fn show(&mut self, line1: &str, line2: &str) {
        DisplayPort::write(self, line1, line2);
    }
}

impl<T: CoinValidatorPort + DisplayPort> PanelPort for T {}

// ───────────────────────────────────────────────────────────────
// Audio feedback (driven adapter: domain → handset speaker)
// ───────────────────────────────────────────────────────────────

pub trait AudioFeedback {
    fn dial_tone(&mut self);
    fn dtmf(&mut self, key: char);
    fn coin_chime(&mut self);
    fn stop(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Every collaborator the controller drives, bundled for one call.
pub struct Ports<'a> {
    pub calls: &'a mut dyn CallBridge,
    pub panel: &'a mut dyn PanelPort,
    pub audio: &'a mut dyn AudioFeedback,
    pub sink: &'a mut dyn EventSink,
}

impl Ports<'_> {
    /// Shorter-lived copy for handing to a plugin.
    pub fn reborrow(&mut self) -> Ports<'_> {
        Ports {
            calls: &mut *self.calls,
            panel: &mut *self.panel,
            audio: &mut *self.audio,
            sink: &mut *self.sink,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ config file)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before accepting a config.  Invalid
/// ranges are rejected with [`ConfigError::ValidationFailed`], not
/// silently clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if no
    /// stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// State port (driven adapter: domain ↔ state snapshot)
// ───────────────────────────────────────────────────────────────

/// Durable snapshot of the daemon state.
pub trait StatePort {
    /// Atomically replace the stored snapshot.
    fn save(&mut self, state: &PersistedState) -> Result<(), crate::error::PersistError>;

    /// The stored snapshot, or `None` if absent or unreadable.
    fn load(&self) -> Option<PersistedState>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config could not be parsed.
    Corrupted(String),
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    Io(std::io::Error),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
