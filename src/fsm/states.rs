//! Concrete state handlers and table builder.
//!
//! ```text
//!            HookUp                    CallState(Active)
//!  IDLE_DOWN ──────▶ IDLE_UP ─[dialing]──────────────────▶ CALL_ACTIVE
//!     ▲  │  ◀────────  │ ▲                                   │   ▲
//!     │  │  HookDown   │ └────────[ended, handset up]────────┘   │
//!     │  │             │ Coin / Keypad (accrue)                  │
//!     │  └─[Incoming]──▶ CALL_INCOMING ───────HookUp─────────────┘
//!     │                    │
//!     └──[HookDown / ended]┘            any ──[HookDown]──▶ IDLE_DOWN
//! ```
//!
//! Handlers only touch `DaemonState`.  Anything that talks to the outside
//! world happens in the controller once the lock is released.

use log::debug;

use super::context::DaemonState;
use super::{Outcome, PhoneState, StateDescriptor};
use crate::events::{CallState, Event, HookState, coin_value_cents};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; PhoneState::COUNT] {
    [
        StateDescriptor {
            id: PhoneState::Invalid,
            name: "Invalid",
            on_enter: None,
            on_exit: None,
            on_event: invalid_event,
        },
        StateDescriptor {
            id: PhoneState::IdleDown,
            name: "IdleDown",
            on_enter: Some(idle_down_enter),
            on_exit: None,
            on_event: idle_down_event,
        },
        StateDescriptor {
            id: PhoneState::IdleUp,
            name: "IdleUp",
            on_enter: None,
            on_exit: None,
            on_event: idle_up_event,
        },
        StateDescriptor {
            id: PhoneState::CallIncoming,
            name: "CallIncoming",
            on_enter: None,
            on_exit: None,
            on_event: call_incoming_event,
        },
        StateDescriptor {
            id: PhoneState::CallActive,
            name: "CallActive",
            on_enter: None,
            on_exit: Some(call_active_exit),
            on_event: call_active_event,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  INVALID: emergency stop; only a hang-up (or reset) brings it back
// ═══════════════════════════════════════════════════════════════════════════

fn invalid_event(_st: &mut DaemonState, ev: &Event) -> Outcome {
    match ev {
        Event::HookChange(HookState::Down) => Outcome::Transition(PhoneState::IdleDown),
        _ => Outcome::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE_DOWN
// ═══════════════════════════════════════════════════════════════════════════

fn idle_down_enter(st: &mut DaemonState) {
    st.clear_session();
}

fn idle_down_event(st: &mut DaemonState, ev: &Event) -> Outcome {
    match ev {
        Event::HookChange(HookState::Up) => {
            st.clear_session();
            Outcome::Transition(PhoneState::IdleUp)
        }
        Event::CallState(CallState::Incoming) => Outcome::Transition(PhoneState::CallIncoming),
        _ => Outcome::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE_UP: collecting coins and digits, possibly dialing out
// ═══════════════════════════════════════════════════════════════════════════

fn idle_up_event(st: &mut DaemonState, ev: &Event) -> Outcome {
    match ev {
        Event::HookChange(HookState::Down) => Outcome::Transition(PhoneState::IdleDown),
        Event::Coin(code) => match coin_value_cents(*code) {
            Some(cents) => {
                st.add_cents(cents);
                Outcome::Accepted
            }
            None => {
                debug!("Unrecognised coin code 0x{:02x}", code);
                Outcome::Ignored
            }
        },
        Event::Keypad(key) => {
            if st.push_digit(*key) {
                Outcome::Accepted
            } else {
                Outcome::Ignored
            }
        }
        Event::CallState(CallState::Active) if st.outbound_pending => {
            st.outbound_pending = false;
            Outcome::Transition(PhoneState::CallActive)
        }
        Event::CallState(cs) if cs.is_terminal() && st.outbound_pending => {
            // Never connected; the plugin refunds.
            st.outbound_pending = false;
            Outcome::Accepted
        }
        _ => Outcome::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALL_INCOMING: ringing
// ═══════════════════════════════════════════════════════════════════════════

fn call_incoming_event(st: &mut DaemonState, ev: &Event) -> Outcome {
    match ev {
        Event::HookChange(HookState::Up) | Event::CallState(CallState::Active) => {
            Outcome::Transition(PhoneState::CallActive)
        }
        Event::HookChange(HookState::Down) => Outcome::Transition(PhoneState::IdleDown),
        Event::CallState(cs) if cs.is_terminal() => Outcome::Transition(idle_for(st.handset)),
        _ => Outcome::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALL_ACTIVE
// ═══════════════════════════════════════════════════════════════════════════

fn call_active_exit(st: &mut DaemonState) {
    st.clear_keypad();
    st.outbound_pending = false;
}

fn call_active_event(st: &mut DaemonState, ev: &Event) -> Outcome {
    match ev {
        Event::HookChange(HookState::Down) => Outcome::Transition(PhoneState::IdleDown),
        Event::CallState(cs) if cs.is_terminal() => Outcome::Transition(idle_for(st.handset)),
        _ => Outcome::Ignored,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn idle_for(handset: HookState) -> PhoneState {
    match handset {
        HookState::Up => PhoneState::IdleUp,
        HookState::Down => PhoneState::IdleDown,
    }
}
