//! Control surface bridge.
//!
//! [`ControlHandle`] is the cloneable handle the web portal and console
//! use to drive the phone from any thread.  Each command either mutates
//! `DaemonState` directly under its lock, becomes an [`Event`] on the
//! shared queue for normal dispatch, or is posted to the main thread as
//! a [`ControlRequest`] when it needs collaborators only the main loop
//! owns (plugins, the panel, the state file).
//!
//! | Command                               | Route                      |
//! |---------------------------------------|----------------------------|
//! | start_call, emergency_stop, reset     | direct + `Resync` request  |
//! | keypad_clear, keypad_backspace        | direct (IdleUp only)       |
//! | coin_return                           | direct + `ReturnCoins`     |
//! | keypad_press, coin_insert, handset_*  | synthetic `Event`          |
//! | activate_plugin, save_state           | request                    |

use std::sync::Arc;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use super::commands::ControlCommand;
use crate::events::{Event, EventQueue, HookState, coin_code_for_cents};
use crate::fsm::context::SharedState;
use crate::fsm::{Fsm, PhoneState};

/// Pending main-thread requests.
pub const REQUEST_CAP: usize = 8;

/// Work only the main loop can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    ActivatePlugin(String),
    SaveState,
    /// Tell the validator to hand the coins back.
    ReturnCoins,
    /// State was forced from outside; hang up a live call if there was
    /// one and let the active plugin re-derive its view.
    Resync { hangup: bool },
}

pub type RequestMailbox = Channel<CriticalSectionRawMutex, ControlRequest, REQUEST_CAP>;

#[derive(Clone)]
pub struct ControlHandle {
    state: SharedState,
    fsm: Arc<Fsm>,
    queue: Arc<EventQueue>,
    requests: Arc<RequestMailbox>,
    plugins: Arc<[String]>,
}

impl ControlHandle {
    pub fn new(
        state: SharedState,
        fsm: Arc<Fsm>,
        queue: Arc<EventQueue>,
        requests: Arc<RequestMailbox>,
        plugins: Vec<String>,
    ) -> Self {
        Self {
            state,
            fsm,
            queue,
            requests,
            plugins: plugins.into(),
        }
    }

    /// Parse and apply one wire command.
    pub fn execute(&self, input: &str) -> bool {
        match ControlCommand::parse(input) {
            Some(cmd) => self.apply(cmd),
            None => {
                warn!("CONTROL | unrecognised command {:?}", input.trim());
                false
            }
        }
    }

    /// Apply one command.  `true` on success.
    pub fn apply(&self, cmd: ControlCommand) -> bool {
        let now = Instant::now();
        let ok = match &cmd {
            ControlCommand::StartCall => {
                self.force(PhoneState::CallIncoming, now);
                true
            }
            ControlCommand::EmergencyStop => {
                warn!("CONTROL | emergency stop");
                let live = self.force(PhoneState::Invalid, now);
                self.request(ControlRequest::Resync { hangup: live })
            }
            ControlCommand::ResetSystem => {
                let live = {
                    let mut st = self.state.lock();
                    let live = st.call_in_progress();
                    st.reset(now);
                    live
                };
                self.request(ControlRequest::Resync { hangup: live })
            }
            ControlCommand::KeypadClear => {
                let mut st = self.state.lock();
                let ready = st.current_state == PhoneState::IdleUp;
                if ready {
                    st.clear_keypad();
                    st.touch(now);
                }
                ready
            }
            ControlCommand::KeypadBackspace => {
                let mut st = self.state.lock();
                let ready = st.current_state == PhoneState::IdleUp && st.pop_digit().is_some();
                if ready {
                    st.touch(now);
                }
                ready
            }
            ControlCommand::CoinReturn => {
                {
                    let mut st = self.state.lock();
                    st.inserted_cents = 0;
                    st.touch(now);
                }
                self.request(ControlRequest::ReturnCoins)
            }
            ControlCommand::KeypadPress(key) => self.queue.push(Event::Keypad(*key)),
            ControlCommand::CoinInsert(cents) => match coin_code_for_cents(*cents) {
                Some(code) => self.queue.push(Event::Coin(code)),
                None => false,
            },
            ControlCommand::HandsetUp => self.queue.push(Event::HookChange(HookState::Up)),
            ControlCommand::HandsetDown => self.queue.push(Event::HookChange(HookState::Down)),
            ControlCommand::ActivatePlugin(name) => {
                if self.plugins.iter().any(|p| p == name) {
                    self.request(ControlRequest::ActivatePlugin(name.clone()))
                } else {
                    warn!("CONTROL | no plugin named {:?}", name);
                    false
                }
            }
            ControlCommand::SaveState => self.request(ControlRequest::SaveState),
        };

        if ok {
            info!("CONTROL | {:?} applied", cmd);
        } else {
            warn!("CONTROL | {:?} refused", cmd);
        }
        ok
    }

    /// Oldest pending main-thread request.
    pub fn next_request(&self) -> Option<ControlRequest> {
        self.requests.try_receive().ok()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Force the FSM; returns whether a call leg was live before.
    fn force(&self, next: PhoneState, now: Instant) -> bool {
        let mut st = self.state.lock();
        let live = st.call_in_progress();
        self.fsm.force_transition(&mut st, next, now);
        live
    }

    fn request(&self, req: ControlRequest) -> bool {
        match self.requests.try_send(req) {
            Ok(()) => true,
            Err(embassy_sync::channel::TrySendError::Full(req)) => {
                warn!("CONTROL | request mailbox full, dropping {:?}", req);
                false
            }
        }
    }
}
