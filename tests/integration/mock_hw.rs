//! Mock panel, call bridge and sinks for integration tests.
//!
//! Records every collaborator call so tests can assert on the full
//! command history without a serial port or a VoIP stack.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use millennium::app::events::AppEvent;
use millennium::app::ports::{
    AudioFeedback, CallBridge, CoinValidatorPort, DisplayPort, EventSink, Ports,
    RegistrationStatus,
};
use millennium::app::service::DaemonController;
use millennium::config::SystemConfig;
use millennium::events::{CallState, Event};
use millennium::fsm::PhoneState;
use millennium::link::transport::Transport;
use millennium::persistence::PersistedState;

// ── MockLink ──────────────────────────────────────────────────

/// Scripted serial link: inbound chunks are handed out one per read,
/// outbound commands are recorded.
#[derive(Default)]
pub struct MockLink {
    inbound: VecDeque<Vec<u8>>,
    pub coin_commands: Vec<u8>,
    pub frames: Vec<(String, String)>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.inbound.push_back(bytes.to_vec());
    }

    pub fn last_frame(&self) -> Option<&(String, String)> {
        self.frames.last()
    }
}

impl Transport for MockLink {
    type Error = Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(mut chunk) = self.inbound.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.inbound.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn write_all(&mut self, _data: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl CoinValidatorPort for MockLink {
    fn write(&mut self, command: u8) {
        self.coin_commands.push(command);
    }
}

impl DisplayPort for MockLink {
    fn write(&mut self, line1: &str, line2: &str) {
        self.frames.push((line1.to_string(), line2.to_string()));
    }
}

// ── MockBridge ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Place(String),
    Answer,
    Hangup,
    Dtmf(char),
    Shutdown,
}

pub struct MockBridge {
    pub calls: Vec<BridgeCall>,
    pub registered: bool,
}

#[allow(dead_code)]
impl MockBridge {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            registered: true,
        }
    }

    pub fn placed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BridgeCall::Place(n) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &BridgeCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CallBridge for MockBridge {
    fn place(&mut self, number: &str) {
        self.calls.push(BridgeCall::Place(number.to_string()));
    }

    fn answer(&mut self) {
        self.calls.push(BridgeCall::Answer);
    }

    fn hangup(&mut self) {
        self.calls.push(BridgeCall::Hangup);
    }

    fn send_dtmf(&mut self, digit: char) {
        self.calls.push(BridgeCall::Dtmf(digit));
    }

    fn registration_status(&self) -> RegistrationStatus {
        if self.registered {
            RegistrationStatus::Registered
        } else {
            RegistrationStatus::Unregistered
        }
    }

    fn shutdown(&mut self) {
        self.calls.push(BridgeCall::Shutdown);
    }
}

// ── MockAudio ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Sound {
    DialTone,
    Dtmf(char),
    CoinChime,
    Stop,
}

#[derive(Default)]
pub struct MockAudio {
    pub sounds: Vec<Sound>,
}

impl AudioFeedback for MockAudio {
    fn dial_tone(&mut self) {
        self.sounds.push(Sound::DialTone);
    }

    fn dtmf(&mut self, key: char) {
        self.sounds.push(Sound::Dtmf(key));
    }

    fn coin_chime(&mut self) {
        self.sounds.push(Sound::CoinChime);
    }

    fn stop(&mut self) {
        self.sounds.push(Sound::Stop);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn any(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// A started controller plus every mock it drives, on a manual clock.
pub struct Harness {
    pub controller: DaemonController,
    pub link: MockLink,
    pub bridge: MockBridge,
    pub audio: MockAudio,
    pub sink: RecordingSink,
    pub now: Instant,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(config: SystemConfig) -> Self {
        Self::build(DaemonController::new(config, Instant::now()), None)
    }

    /// Register the built-in plugins and start, optionally from a
    /// restored snapshot.
    pub fn build(mut controller: DaemonController, restored: Option<PersistedState>) -> Self {
        controller
            .register_builtin_plugins()
            .expect("built-in plugins register");
        let mut h = Self {
            controller,
            link: MockLink::default(),
            bridge: MockBridge::new(),
            audio: MockAudio::default(),
            sink: RecordingSink::default(),
            now: Instant::now(),
        };
        let mut ports = Ports {
            calls: &mut h.bridge,
            panel: &mut h.link,
            audio: &mut h.audio,
            sink: &mut h.sink,
        };
        h.controller.start(restored, &mut ports, h.now);
        h
    }

    /// One main-loop iteration, 1 ms after the previous one.
    pub fn iterate(&mut self) {
        self.now += Duration::from_millis(1);
        self.controller.run_once(
            &mut self.link,
            &mut self.bridge,
            &mut self.audio,
            &mut self.sink,
            self.now,
        );
    }

    /// Iterate until the queue is drained and a few ticks have run.
    pub fn settle(&mut self) {
        for _ in 0..256 {
            self.iterate();
            if self.controller.queue().is_empty() {
                break;
            }
        }
        for _ in 0..3 {
            self.iterate();
        }
    }

    /// Feed raw panel bytes and process everything they produce.
    pub fn panel(&mut self, bytes: &[u8]) {
        self.link.queue_bytes(bytes);
        self.settle();
    }

    pub fn keys(&mut self, digits: &str) {
        for d in digits.chars() {
            self.panel(&[b'K', d as u8]);
        }
    }

    /// Push a call-state report as the signaling thread would.
    pub fn signal(&mut self, call: CallState) {
        assert!(self.controller.queue().push(Event::CallState(call)));
        self.settle();
    }

    /// Move the clock forward and tick.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
        self.settle();
    }

    pub fn phone_state(&self) -> PhoneState {
        self.controller.state().lock().current_state
    }

    pub fn credit(&self) -> u32 {
        self.controller.state().lock().inserted_cents
    }

    pub fn keypad(&self) -> String {
        self.controller.state().lock().keypad().to_string()
    }
}
