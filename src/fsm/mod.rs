//! Table-driven payphone state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ PhoneState   │ on_enter  │ on_exit  │ on_event         │  │
//! │  ├──────────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Invalid      │ -         │ -        │ fn(st, ev)->Out  │  │
//! │  │ IdleDown     │ fn(st)    │ -        │ fn(st, ev)->Out  │  │
//! │  │ IdleUp       │ -         │ -        │ fn(st, ev)->Out  │  │
//! │  │ CallIncoming │ -         │ -        │ fn(st, ev)->Out  │  │
//! │  │ CallActive   │ -         │ fn(st)   │ fn(st, ev)->Out  │  │
//! │  └──────────────┴───────────┴──────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is stateless: the current state lives in
//! [`DaemonState::current_state`] so web control can read and force it
//! under the same lock.  Each event goes to the current state's
//! `on_event`; a returned [`Outcome::Transition`] runs `on_exit` for the
//! old state and `on_enter` for the new one.  Side effects on the
//! collaborators (answer, hang-up, coin validator) are the caller's job,
//! performed after the lock is released.

pub mod context;
pub mod states;

use std::time::Instant;

use context::DaemonState;
use log::{debug, info};

use crate::events::Event;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Payphone states.  The discriminant is the persisted ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PhoneState {
    Invalid = 0,
    IdleDown = 1,
    IdleUp = 2,
    CallIncoming = 3,
    CallActive = 4,
}

impl PhoneState {
    /// Total number of states, used to size the table.
    pub const COUNT: usize = 5;

    /// Map a persisted ordinal back to a state.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Invalid),
            1 => Some(Self::IdleDown),
            2 => Some(Self::IdleUp),
            3 => Some(Self::CallIncoming),
            4 => Some(Self::CallActive),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::IdleDown => "IDLE_DOWN",
            Self::IdleUp => "IDLE_UP",
            Self::CallIncoming => "CALL_INCOMING",
            Self::CallActive => "CALL_ACTIVE",
        }
    }
}

impl core::fmt::Display for PhoneState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Handler signatures
// ---------------------------------------------------------------------------

/// What a state handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not applicable in this state.
    Ignored,
    /// Applied without leaving the state.
    Accepted,
    /// Move to another state.
    Transition(PhoneState),
}

/// `on_enter` / `on_exit` action.
pub type StateActionFn = fn(&mut DaemonState);

/// Per-event handler for one state.
pub type StateEventFn = fn(&mut DaemonState, &Event) -> Outcome;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: PhoneState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `PhoneState as usize`.
    table: [StateDescriptor; PhoneState::COUNT],
}

impl Fsm {
    pub fn new(table: [StateDescriptor; PhoneState::COUNT]) -> Self {
        Self { table }
    }

    /// Run one event through the current state's handler.
    ///
    /// Records the hook position carried by `HookChange` events before
    /// dispatch, and refreshes `last_activity` on anything accepted.
    pub fn handle(&self, state: &mut DaemonState, event: &Event, now: Instant) -> Outcome {
        if let Event::HookChange(hook) = event {
            state.handset = *hook;
        }

        let row = &self.table[state.current_state as usize];
        let outcome = (row.on_event)(state, event);

        match outcome {
            Outcome::Ignored => {
                debug!("{} ignored in {}", event.name(), row.name);
            }
            Outcome::Accepted => state.touch(now),
            Outcome::Transition(next) => {
                self.transition(state, next);
                state.touch(now);
            }
        }
        outcome
    }

    /// Jump straight to `next` (web control, emergency stop).
    /// Runs the exit/enter actions; a no-op if already there.
    pub fn force_transition(&self, state: &mut DaemonState, next: PhoneState, now: Instant) {
        if state.current_state != next {
            self.transition(state, next);
        }
        state.touch(now);
    }

    fn transition(&self, state: &mut DaemonState, next: PhoneState) {
        let from = &self.table[state.current_state as usize];
        let to = &self.table[next as usize];

        info!("FSM transition: {} -> {}", from.name, to.name);

        if let Some(exit) = from.on_exit {
            exit(state);
        }
        state.current_state = to.id;
        if let Some(enter) = to.on_enter {
            enter(state);
        }
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new(states::build_state_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CallState, HookState};

    fn setup() -> (Fsm, DaemonState, Instant) {
        let now = Instant::now();
        (Fsm::default(), DaemonState::new(now), now)
    }

    fn lift(fsm: &Fsm, st: &mut DaemonState, now: Instant) {
        fsm.handle(st, &Event::HookChange(HookState::Up), now);
    }

    #[test]
    fn table_rows_match_their_index() {
        let fsm = Fsm::default();
        for (idx, row) in fsm.table.iter().enumerate() {
            assert_eq!(row.id as usize, idx, "row {} out of place", row.name);
        }
    }

    #[test]
    fn ordinals_round_trip() {
        for ord in 0..PhoneState::COUNT as u8 {
            let st = PhoneState::from_ordinal(ord).unwrap();
            assert_eq!(st.ordinal(), ord);
        }
        assert!(PhoneState::from_ordinal(9).is_none());
    }

    #[test]
    fn hook_up_from_idle_down_clears_session() {
        let (fsm, mut st, now) = setup();
        st.add_cents(25);
        st.push_digit('7');
        let out = fsm.handle(&mut st, &Event::HookChange(HookState::Up), now);
        assert_eq!(out, Outcome::Transition(PhoneState::IdleUp));
        assert_eq!(st.inserted_cents, 0);
        assert_eq!(st.keypad(), "");
    }

    #[test]
    fn coins_only_count_while_idle_up() {
        let (fsm, mut st, now) = setup();
        assert_eq!(fsm.handle(&mut st, &Event::Coin(b'8'), now), Outcome::Ignored);
        assert_eq!(st.inserted_cents, 0);

        lift(&fsm, &mut st, now);
        assert_eq!(fsm.handle(&mut st, &Event::Coin(b'8'), now), Outcome::Accepted);
        assert_eq!(fsm.handle(&mut st, &Event::Coin(b'6'), now), Outcome::Accepted);
        assert_eq!(fsm.handle(&mut st, &Event::Coin(b'0'), now), Outcome::Ignored);
        assert_eq!(st.inserted_cents, 30);
    }

    #[test]
    fn eleventh_digit_is_ignored() {
        let (fsm, mut st, now) = setup();
        lift(&fsm, &mut st, now);
        for d in "1234567890".chars() {
            assert_eq!(fsm.handle(&mut st, &Event::Keypad(d), now), Outcome::Accepted);
        }
        assert_eq!(fsm.handle(&mut st, &Event::Keypad('5'), now), Outcome::Ignored);
        assert_eq!(st.keypad(), "1234567890");
    }

    #[test]
    fn hook_down_resets_to_defaults() {
        let (fsm, mut st, now) = setup();
        lift(&fsm, &mut st, now);
        fsm.handle(&mut st, &Event::Coin(b'8'), now);
        fsm.handle(&mut st, &Event::HookChange(HookState::Down), now);
        assert_eq!(st.current_state, PhoneState::IdleDown);
        assert_eq!(st.inserted_cents, 0);
    }

    #[test]
    fn incoming_call_answered_by_lifting() {
        let (fsm, mut st, now) = setup();
        let out = fsm.handle(&mut st, &Event::CallState(CallState::Incoming), now);
        assert_eq!(out, Outcome::Transition(PhoneState::CallIncoming));
        let out = fsm.handle(&mut st, &Event::HookChange(HookState::Up), now);
        assert_eq!(out, Outcome::Transition(PhoneState::CallActive));
    }

    #[test]
    fn outbound_dial_connects_only_when_pending() {
        let (fsm, mut st, now) = setup();
        lift(&fsm, &mut st, now);
        let active = Event::CallState(CallState::Active);
        assert_eq!(fsm.handle(&mut st, &active, now), Outcome::Ignored);

        st.outbound_pending = true;
        assert_eq!(
            fsm.handle(&mut st, &active, now),
            Outcome::Transition(PhoneState::CallActive)
        );
        assert!(!st.outbound_pending);
    }

    #[test]
    fn failed_outbound_dial_stays_idle_up() {
        let (fsm, mut st, now) = setup();
        lift(&fsm, &mut st, now);
        st.outbound_pending = true;
        let out = fsm.handle(&mut st, &Event::CallState(CallState::Invalid), now);
        assert_eq!(out, Outcome::Accepted);
        assert_eq!(st.current_state, PhoneState::IdleUp);
        assert!(!st.outbound_pending);
    }

    #[test]
    fn remote_hangup_returns_to_idle_up_with_handset_lifted() {
        let (fsm, mut st, now) = setup();
        lift(&fsm, &mut st, now);
        st.outbound_pending = true;
        fsm.handle(&mut st, &Event::CallState(CallState::Active), now);
        let out = fsm.handle(&mut st, &Event::CallState(CallState::Ended), now);
        assert_eq!(out, Outcome::Transition(PhoneState::IdleUp));
    }

    #[test]
    fn missed_incoming_call_returns_to_idle_down() {
        let (fsm, mut st, now) = setup();
        fsm.handle(&mut st, &Event::CallState(CallState::Incoming), now);
        let out = fsm.handle(&mut st, &Event::CallState(CallState::Ended), now);
        assert_eq!(out, Outcome::Transition(PhoneState::IdleDown));
    }

    #[test]
    fn invalid_recovers_on_hook_down_only() {
        let (fsm, mut st, now) = setup();
        fsm.force_transition(&mut st, PhoneState::Invalid, now);
        assert_eq!(
            fsm.handle(&mut st, &Event::HookChange(HookState::Up), now),
            Outcome::Ignored
        );
        assert_eq!(
            fsm.handle(&mut st, &Event::HookChange(HookState::Down), now),
            Outcome::Transition(PhoneState::IdleDown)
        );
    }

    #[test]
    fn accepted_events_refresh_activity() {
        let (fsm, mut st, now) = setup();
        let later = now + std::time::Duration::from_secs(5);
        lift(&fsm, &mut st, later);
        assert_eq!(st.last_activity, later);
    }
}
