//! Shared daemon state threaded through every FSM handler.
//!
//! `DaemonState` is the one record the hardware path, the active plugin
//! and the web-control bridge all agree on: hook/call status, credit and
//! the dial buffer.  It lives behind [`SharedState`]; every access holds
//! the lock only for the duration of that access.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::events::HookState;

use super::PhoneState;

/// Digits the dial buffer can hold (a full North American number).
pub const KEYPAD_CAPACITY: usize = 10;

/// Dial buffer: ASCII digits only, never longer than [`KEYPAD_CAPACITY`].
pub type KeypadBuffer = heapless::String<KEYPAD_CAPACITY>;

// ---------------------------------------------------------------------------
// DaemonState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DaemonState {
    pub current_state: PhoneState,
    /// Credit in cents.
    pub inserted_cents: u32,
    /// Last accepted transition or mutation.
    pub last_activity: Instant,
    /// Last reported hook position.
    pub handset: HookState,
    /// An outbound call has been placed and has not connected or failed yet.
    pub outbound_pending: bool,
    keypad_buffer: KeypadBuffer,
}

impl DaemonState {
    /// Start-of-process defaults: receiver down, no credit, empty buffer.
    pub fn new(now: Instant) -> Self {
        Self {
            current_state: PhoneState::IdleDown,
            inserted_cents: 0,
            last_activity: now,
            handset: HookState::Down,
            outbound_pending: false,
            keypad_buffer: KeypadBuffer::new(),
        }
    }

    /// Back to the start-of-process defaults.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Forget the current session's credit, digits and pending dial.
    pub fn clear_session(&mut self) {
        self.inserted_cents = 0;
        self.keypad_buffer.clear();
        self.outbound_pending = false;
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn keypad(&self) -> &str {
        &self.keypad_buffer
    }

    /// Append a digit.  Rejects non-digits and a full buffer, leaving the
    /// existing digits untouched.
    pub fn push_digit(&mut self, key: char) -> bool {
        key.is_ascii_digit() && self.keypad_buffer.push(key).is_ok()
    }

    pub fn pop_digit(&mut self) -> Option<char> {
        self.keypad_buffer.pop()
    }

    pub fn clear_keypad(&mut self) {
        self.keypad_buffer.clear();
    }

    pub fn add_cents(&mut self, cents: u32) {
        self.inserted_cents = self.inserted_cents.saturating_add(cents);
    }

    /// Deduct up to `cents`; returns the amount actually taken.
    pub fn take_cents(&mut self, cents: u32) -> u32 {
        let taken = cents.min(self.inserted_cents);
        self.inserted_cents -= taken;
        taken
    }

    /// A call leg exists that a local hang-up must tear down.
    pub fn call_in_progress(&self) -> bool {
        self.outbound_pending
            || matches!(
                self.current_state,
                PhoneState::CallActive | PhoneState::CallIncoming
            )
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Cloneable handle to the one `DaemonState`.
#[derive(Clone)]
pub struct SharedState(Arc<Mutex<DaemonState>>);

impl SharedState {
    pub fn new(state: DaemonState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock for one access.  Poisoning is ignored: every mutation is a
    /// plain field store.
    pub fn lock(&self) -> MutexGuard<'_, DaemonState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DaemonState {
        self.lock().clone()
    }
}
