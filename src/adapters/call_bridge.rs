//! Simulated SIP user agent.
//!
//! Stands in for the VoIP stack: a signaling thread owns the call leg
//! and reports progress back onto the shared [`EventQueue`] as
//! `Event::CallState`, exactly as a real user agent's event callback
//! would.  The controller talks to it only through [`CallBridge`].
//!
//! ```text
//!  main loop ──place/answer/hangup──▶ mpsc ──▶ signaling thread
//!      ▲                                             │
//!      └────────── EventQueue ◀── CallState ─────────┘
//! ```
//!
//! A placed call reports established after `bridge.answer_delay_ms`.
//! An incoming call is injected through a [`Ringer`], which the console
//! hands out as the `ring` command.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::{CallBridge, RegistrationStatus};
use crate::config::BridgeConfig;
use crate::events::{CallState, Event, EventQueue};

/// Map a user-agent status string onto the controller's call states.
///
/// Progress notifications that do not change the leg (ringing, early
/// media, DTMF) map to `None`; unrecognised statuses are `Invalid`.
pub fn call_state_from_status(status: &str) -> Option<CallState> {
    match status {
        "CALL_INCOMING" => Some(CallState::Incoming),
        "CALL_ESTABLISHED" => Some(CallState::Active),
        "CALL_CLOSED" => Some(CallState::Ended),
        "CALL_OUTGOING" | "CALL_RINGING" | "CALL_PROGRESS" | "CALL_ANSWERED"
        | "CALL_DTMF_START" | "CALL_DTMF_END" | "CALL_RTPESTAB" => None,
        _ => Some(CallState::Invalid),
    }
}

enum Signal {
    Place(String),
    Answer,
    Hangup,
    Dtmf(char),
    Ring,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Idle,
    Dialing { established_at: Instant },
    Ringing,
    Active,
}

pub struct SimulatedCallBridge {
    tx: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
    registered: bool,
}

impl SimulatedCallBridge {
    /// Spawn the signaling thread.
    pub fn spawn(config: &BridgeConfig, queue: Arc<EventQueue>) -> Self {
        let (tx, rx) = mpsc::channel();
        let answer_delay = Duration::from_millis(config.answer_delay_ms);
        let worker = thread::Builder::new()
            .name("signaling".into())
            .spawn(move || signaling_loop(&rx, &queue, answer_delay));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("SIP   | signaling thread failed to start: {}", e);
                None
            }
        };
        info!(
            "SIP   | user agent {}",
            if config.registered { "registered" } else { "not registered" }
        );
        let registered = config.registered && worker.is_some();
        Self {
            tx,
            worker,
            registered,
        }
    }

    /// Handle for injecting incoming calls from another thread.
    pub fn ringer(&self) -> Ringer {
        Ringer {
            tx: self.tx.clone(),
        }
    }

    fn signal(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            warn!("SIP   | signaling thread is gone");
        }
    }
}

/// Simulates a call arriving from the network.
#[derive(Clone)]
pub struct Ringer {
    tx: Sender<Signal>,
}

impl Ringer {
    /// `false` once the signaling thread has stopped.
    pub fn ring(&self) -> bool {
        self.tx.send(Signal::Ring).is_ok()
    }
}

fn report(queue: &EventQueue, status: &str) {
    debug!("SIP   | UA event {}", status);
    if let Some(state) = call_state_from_status(status) {
        queue.push(Event::CallState(state));
    }
}

fn signaling_loop(rx: &Receiver<Signal>, queue: &EventQueue, answer_delay: Duration) {
    let mut leg = Leg::Idle;
    loop {
        let received = match leg {
            Leg::Dialing { established_at } => {
                let wait = established_at.saturating_duration_since(Instant::now());
                rx.recv_timeout(wait)
            }
            _ => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let signal = match received {
            Ok(signal) => signal,
            Err(RecvTimeoutError::Timeout) => {
                leg = Leg::Active;
                report(queue, "CALL_ESTABLISHED");
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match signal {
            Signal::Place(number) => {
                if leg != Leg::Idle {
                    report(queue, "CALL_CLOSED");
                }
                info!("SIP   | dialing {}", number);
                report(queue, "CALL_OUTGOING");
                leg = Leg::Dialing {
                    established_at: Instant::now() + answer_delay,
                };
            }
            Signal::Answer => {
                if leg == Leg::Ringing {
                    leg = Leg::Active;
                    report(queue, "CALL_ESTABLISHED");
                } else {
                    debug!("SIP   | answer with no ringing call");
                }
            }
            Signal::Hangup => {
                if leg != Leg::Idle {
                    leg = Leg::Idle;
                    report(queue, "CALL_CLOSED");
                }
            }
            Signal::Dtmf(digit) => {
                if leg == Leg::Active {
                    debug!("SIP   | DTMF {}", digit);
                }
            }
            Signal::Ring => {
                if leg == Leg::Idle {
                    leg = Leg::Ringing;
                    report(queue, "CALL_INCOMING");
                } else {
                    debug!("SIP   | busy, incoming call rejected");
                }
            }
            Signal::Shutdown => break,
        }
    }
    debug!("SIP   | signaling thread exiting");
}

impl CallBridge for SimulatedCallBridge {
    fn place(&mut self, number: &str) {
        self.signal(Signal::Place(number.to_string()));
    }

    fn answer(&mut self) {
        self.signal(Signal::Answer);
    }

    fn hangup(&mut self) {
        self.signal(Signal::Hangup);
    }

    fn send_dtmf(&mut self, digit: char) {
        self.signal(Signal::Dtmf(digit));
    }

    fn registration_status(&self) -> RegistrationStatus {
        if self.registered {
            RegistrationStatus::Registered
        } else {
            RegistrationStatus::Unregistered
        }
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(Signal::Shutdown);
            if worker.join().is_err() {
                warn!("SIP   | signaling thread panicked");
            }
            info!("SIP   | stopped");
        }
    }
}

impl Drop for SimulatedCallBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
