//! Outbound application events.
//!
//! The [`DaemonController`](super::service::DaemonController) and the
//! plugins emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them.

use crate::diagnostics::Counters;
use crate::fsm::PhoneState;

/// How a call attempt was paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Billing {
    /// Coins deducted (amount in cents).
    Paid(u32),
    /// Configured free / emergency number.
    Free,
    /// Accepted calling card.
    Card,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The controller has started (carries the initial state).
    Started(PhoneState),

    /// The daemon FSM moved between states.
    StateChanged { from: PhoneState, to: PhoneState },

    /// A coin was credited.
    CoinAccepted { cents: u32, total: u32 },

    /// An outbound call was handed to the call bridge.
    CallPlaced { number: String, billing: Billing },

    /// A paid call was refused because the backend is unregistered.
    CallRefused { number: String },

    /// An outbound call never connected; `refunded` cents returned.
    CallFailed { refunded: u32 },

    /// A call was cut off by the time limit.
    CallTimedOut { number: String },

    /// A call ended normally.
    CallEnded,

    /// A card was swiped.
    CardSwiped { accepted: bool, admin: bool },

    /// Personality switched.
    PluginActivated { from: Option<String>, to: String },

    /// Idle session abandoned; credit and digits cleared.
    SessionAbandoned { cents: u32 },

    /// Coin validator EEPROM maintenance report.
    EepromReport(&'static str),

    /// EEPROM validation mismatch.
    EepromMismatch { addr: u8, expected: u8, actual: u8 },

    /// Periodic counters snapshot.
    Stats(Counters),

    /// No activity for longer than the configured threshold.
    Inactive { idle_secs: u64 },
}
