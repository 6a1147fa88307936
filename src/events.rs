//! Hardware and call-signaling events, and the queue that carries them.
//!
//! Events are produced by:
//! - The frame decoder, on the main loop, right after a serial read
//! - The call bridge's signaling thread (`CallState` changes)
//! - The web-control bridge (synthetic hook/keypad/coin events)
//!
//! Events are consumed by the main loop, at most one per iteration.
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ FrameDecoder  │────▶│              │     │              │
//! │ Signaling thr │────▶│  EventQueue  │────▶│  Main Loop   │
//! │ Web control   │────▶│  (MPSC)      │     │  (consumer)  │
//! └───────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 64;

/// Card ids are exactly 16 characters on the wire.
pub const CARD_NUMBER_LEN: usize = 16;

/// A swiped card id.
pub type CardNumber = heapless::String<CARD_NUMBER_LEN>;

/// Switch-hook position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// Receiver lifted off the cradle.
    Up,
    /// Receiver resting on the cradle.
    Down,
}

/// Call progress reported by the signaling backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Incoming,
    Active,
    Ended,
    Invalid,
}

impl CallState {
    /// `Ended` and `Invalid` both mean the call leg is gone.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Invalid)
    }
}

/// Everything the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ── Panel input ───────────────────────────────────────
    /// Key pressed: `0`-`9`, `*` or `#`.
    Keypad(char),
    /// Card swiped through the reader.
    Card(CardNumber),
    /// Coin accepted by the validator (raw validator code).
    Coin(u8),
    /// Receiver lifted or replaced.
    HookChange(HookState),

    // ── Signaling ─────────────────────────────────────────
    /// Call state reported by the call bridge.
    CallState(CallState),

    // ── Coin validator EEPROM maintenance ─────────────────
    EepromUploadStart,
    EepromUploadEnd,
    EepromValidationStart,
    EepromValidationEnd,
    EepromValidationError { addr: u8, expected: u8, actual: u8 },
}

impl Event {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keypad(_) => "Keypad",
            Self::Card(_) => "Card",
            Self::Coin(_) => "Coin",
            Self::HookChange(_) => "HookChange",
            Self::CallState(_) => "CallState",
            Self::EepromUploadStart => "EepromUploadStart",
            Self::EepromUploadEnd => "EepromUploadEnd",
            Self::EepromValidationStart => "EepromValidationStart",
            Self::EepromValidationEnd => "EepromValidationEnd",
            Self::EepromValidationError { .. } => "EepromValidationError",
        }
    }
}

// ── Coin codes ────────────────────────────────────────────────
//
// The validator reports `'0'` for a rejected coin and `'1'`..`'8'` for
// its eight programmable slots.  Only slots 6-8 are programmed.

/// Value in cents for a validator coin code, `None` for unknown or
/// rejected coins.
pub fn coin_value_cents(code: u8) -> Option<u32> {
    match code {
        b'6' => Some(5),
        b'7' => Some(10),
        b'8' => Some(25),
        _ => None,
    }
}

/// Inverse of [`coin_value_cents`], used by web control to synthesise
/// coin events.
pub fn coin_code_for_cents(cents: u32) -> Option<u8> {
    match cents {
        5 => Some(b'6'),
        10 => Some(b'7'),
        25 => Some(b'8'),
        _ => None,
    }
}

// ── Multi-producer queue ──────────────────────────────────────
//
// The signaling thread and the main loop both push; only the main loop
// pops.  The embassy channel takes a critical section around every
// access, which on the host is a process-wide mutex.

/// Bounded FIFO of [`Event`]s, safe to share between threads.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push an event.  Callable from any thread.
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(embassy_sync::channel::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Event queue full, dropping {}", event.name());
                false
            }
        }
    }

    /// Pop the oldest event.  Never blocks; `None` when empty.
    pub fn pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
