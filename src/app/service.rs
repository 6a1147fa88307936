//! Daemon controller: the hexagonal core.
//!
//! [`DaemonController`] owns the FSM, the plugin registry, the display
//! model and the frame decoder.  All I/O flows through port traits
//! passed in per call, so the whole controller runs against mocks.
//!
//! ```text
//!  Transport ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                │       DaemonController        │
//!  EventQueue ──▶│ FSM · PluginRegistry · Display│ ──▶ CallBridge
//!  Requests   ──▶└──────────────────────────────┘ ──▶ PanelPort / Audio
//! ```
//!
//! One iteration of the main loop is three explicit phases:
//!
//! 1. **poll**: one non-blocking read, decode, queue every frame;
//! 2. **dispatch**: at most one event through FSM then plugin;
//! 3. **tick**: control requests, plugin timers, display, housekeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::diagnostics::{Counters, HealthCheck, Interval};
use crate::display::DisplayManager;
use crate::error::PluginError;
use crate::events::{Event, EventQueue, HookState, coin_value_cents};
use crate::fsm::context::{DaemonState, SharedState};
use crate::fsm::{Fsm, Outcome, PhoneState};
use crate::link::codec::{FrameDecoder, coin_cmd};
use crate::link::transport::Transport;
use crate::persistence::PersistedState;
use crate::plugins::classic_phone::ClassicPhone;
use crate::plugins::fortune_teller::FortuneTeller;
use crate::plugins::jukebox::Jukebox;
use crate::plugins::{Plugin, PluginContext, PluginRegistry};

use super::control::{ControlHandle, ControlRequest, RequestMailbox};
use super::events::AppEvent;
use super::ports::{AudioFeedback, CallBridge, EventSink, PanelPort, Ports, StatePort};

/// Bytes taken from the link per poll.
const READ_CHUNK: usize = 64;

// ───────────────────────────────────────────────────────────────
// DaemonController
// ───────────────────────────────────────────────────────────────

pub struct DaemonController {
    config: SystemConfig,
    state: SharedState,
    fsm: Arc<Fsm>,
    registry: PluginRegistry,
    display: DisplayManager,
    decoder: FrameDecoder,
    queue: Arc<EventQueue>,
    requests: Arc<RequestMailbox>,
    store: Option<Box<dyn StatePort>>,
    counters: Counters,
    stats: Interval,
    health: HealthCheck,
    started: Instant,
    /// State as of the last `StateChanged` emitted.
    last_seen: PhoneState,
}

impl DaemonController {
    /// Build the controller.  Does **not** activate a plugin; call
    /// [`start`](Self::start) once plugins are registered.
    pub fn new(config: SystemConfig, now: Instant) -> Self {
        let display = DisplayManager::new(
            Duration::from_millis(config.display.refresh_interval_ms),
            Duration::from_millis(config.display.scroll_interval_ms),
        );
        let stats = Interval::new(Duration::from_secs(config.system.stats_interval_secs), now);
        let health = HealthCheck::new(Duration::from_secs(config.system.inactivity_warn_secs));

        Self {
            config,
            state: SharedState::new(DaemonState::new(now)),
            fsm: Arc::new(Fsm::default()),
            registry: PluginRegistry::new(),
            display,
            decoder: FrameDecoder::new(),
            queue: Arc::new(EventQueue::new()),
            requests: Arc::new(RequestMailbox::new()),
            store: None,
            counters: Counters::default(),
            stats,
            health,
            started: now,
            last_seen: PhoneState::IdleDown,
        }
    }

    /// Attach the snapshot store used by `save_state` and shutdown.
    pub fn with_store(mut self, store: Box<dyn StatePort>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        self.registry.register(plugin)
    }

    /// Install Classic Phone, Fortune Teller and Jukebox.
    pub fn register_builtin_plugins(&mut self) -> Result<(), PluginError> {
        let plugins = &self.config.plugins;
        let builtin: [Box<dyn Plugin>; 3] = [
            Box::new(ClassicPhone::new(&self.config.call)),
            Box::new(FortuneTeller::new(plugins.fortune_cost_cents)),
            Box::new(Jukebox::new(plugins.jukebox_cost_cents)),
        ];
        for plugin in builtin {
            self.registry.register(plugin)?;
        }
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Apply a restored snapshot, activate the starting plugin and
    /// announce the initial state.
    ///
    /// A snapshot taken with the receiver up (idle or mid-call) resumes
    /// in `IdleUp` with its credit; anything else starts in `IdleDown`
    /// with none.  Calls never survive a restart.
    pub fn start(&mut self, restored: Option<PersistedState>, ports: &mut Ports<'_>, now: Instant) {
        let mut plugin = self.config.plugins.default.clone();

        if let Some(saved) = restored {
            let mut st = self.state.lock();
            if matches!(
                saved.last_state,
                PhoneState::IdleUp | PhoneState::CallIncoming | PhoneState::CallActive
            ) {
                st.current_state = PhoneState::IdleUp;
                st.handset = HookState::Up;
                st.inserted_cents = saved.inserted_cents;
            }
            st.touch(now);
            info!(
                "Restored state: {} with {}c, plugin '{}'",
                st.current_state, st.inserted_cents, saved.active_plugin
            );
            plugin = saved.active_plugin;
        }

        if let Err(e) = self.activate(&plugin, ports, now) {
            warn!("Cannot activate '{}': {}", plugin, e);
            let fallback = self.config.plugins.default.clone();
            if fallback != plugin {
                if let Err(e) = self.activate(&fallback, ports, now) {
                    warn!("Cannot activate default plugin '{}': {}", fallback, e);
                }
            }
        }

        for (name, description, active) in self.registry.list() {
            info!(
                "Plugin {} {} - {}",
                if active { "*" } else { " " },
                name,
                description
            );
        }

        let current = self.state.lock().current_state;
        self.last_seen = current;
        self.emit(ports.sink, AppEvent::Started(current));
        info!("DaemonController started in {}", current);
        self.refresh_display(now);
    }

    /// Persist the final snapshot and stop the signaling backend.
    pub fn shutdown(&mut self, calls: &mut dyn CallBridge) {
        self.save_state();
        calls.shutdown();
        info!("DaemonController stopped");
    }

    // ── Main-loop phases ──────────────────────────────────────

    /// One full iteration: poll the link, dispatch one event, tick.
    ///
    /// `link` is both the byte source and the panel output, so it is
    /// taken whole here and lent out as the panel port afterwards.
    pub fn run_once<L: Transport + PanelPort>(
        &mut self,
        link: &mut L,
        calls: &mut dyn CallBridge,
        audio: &mut dyn AudioFeedback,
        sink: &mut dyn EventSink,
        now: Instant,
    ) {
        self.poll_link(link);
        let mut ports = Ports {
            calls,
            panel: link,
            audio,
            sink,
        };
        self.step(&mut ports, now);
    }

    /// Phases two and three.
    pub fn step(&mut self, ports: &mut Ports<'_>, now: Instant) {
        self.dispatch_next(ports, now);
        self.tick(ports, now);
    }

    /// Phase one: read once, decode, queue.  Returns the events queued.
    pub fn poll_link<T: Transport + ?Sized>(&mut self, link: &mut T) -> usize {
        let mut buf = [0u8; READ_CHUNK];
        let n = match link.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("LINK | read failed: {}", e);
                return 0;
            }
        };
        if n == 0 {
            return 0;
        }
        self.feed_bytes(&buf[..n])
    }

    /// Decode raw link bytes and queue the events.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> usize {
        let events = self.decoder.feed(bytes);
        events
            .into_iter()
            .map(|event| self.queue.push(event))
            .filter(|&queued| queued)
            .count()
    }

    /// Phase two: dispatch the oldest queued event, if any.
    pub fn dispatch_next(&mut self, ports: &mut Ports<'_>, now: Instant) -> bool {
        match self.queue.pop() {
            Some(event) => {
                self.dispatch_event(&event, ports, now);
                true
            }
            None => false,
        }
    }

    /// Run one event through the FSM, apply the collaborator side
    /// effects of any transition, then hand it to the active plugin.
    pub fn dispatch_event(&mut self, event: &Event, ports: &mut Ports<'_>, now: Instant) {
        self.counters.events_processed += 1;
        debug!("Dispatching {}", event.name());

        if self.handle_eeprom(event, ports.sink) {
            return;
        }

        let (before, was_live, outcome, after, credit) = {
            let mut st = self.state.lock();
            let before = st.current_state;
            let was_live = st.call_in_progress();
            let outcome = self.fsm.handle(&mut st, event, now);
            (before, was_live, outcome, st.current_state, st.inserted_cents)
        };

        Self::transition_effects(event, before, after, was_live, ports);

        if let (Event::Coin(code), Outcome::Accepted) = (event, outcome) {
            if let Some(cents) = coin_value_cents(*code) {
                self.emit(ports.sink, AppEvent::CoinAccepted { cents, total: credit });
            }
        }

        let mut ctx = PluginContext {
            state: &self.state,
            fsm: &self.fsm,
            ports: ports.reborrow(),
            config: &self.config,
            counters: &mut self.counters,
            now,
        };
        self.registry.dispatch(event, outcome, &mut ctx);

        self.note_state(ports.sink);
        self.refresh_display(now);
    }

    /// Phase three: main-thread requests, plugin timers, display and
    /// periodic housekeeping.
    pub fn tick(&mut self, ports: &mut Ports<'_>, now: Instant) {
        self.process_requests(ports, now);

        let mut ctx = PluginContext {
            state: &self.state,
            fsm: &self.fsm,
            ports: ports.reborrow(),
            config: &self.config,
            counters: &mut self.counters,
            now,
        };
        self.registry.tick(&mut ctx);
        self.note_state(ports.sink);

        self.refresh_display(now);
        self.display.tick(now);
        self.display.flush(now, &mut *ports.panel);

        if self.stats.due(now) {
            self.counters.uptime_secs = now.saturating_duration_since(self.started).as_secs();
            self.counters.events_dropped = self.queue.dropped();
            self.counters.noise_bytes = self.decoder.noise_bytes();
            let counters = self.counters;
            self.emit(ports.sink, AppEvent::Stats(counters));
        }

        let last_activity = self.state.lock().last_activity;
        if let Some(idle_secs) = self.health.check(last_activity, now) {
            self.emit(ports.sink, AppEvent::Inactive { idle_secs });
        }
    }

    /// Drain requests posted by [`ControlHandle`]s.
    pub fn process_requests(&mut self, ports: &mut Ports<'_>, now: Instant) {
        while let Ok(request) = self.requests.try_receive() {
            match request {
                ControlRequest::ActivatePlugin(name) => {
                    if let Err(e) = self.activate(&name, ports, now) {
                        warn!("CONTROL | {}", e);
                    }
                }
                ControlRequest::SaveState => {
                    self.save_state();
                }
                ControlRequest::ReturnCoins => {
                    ports.panel.coin_command(coin_cmd::RETURN);
                }
                ControlRequest::Resync { hangup } => {
                    if hangup {
                        ports.calls.hangup();
                    }
                    ports.audio.stop();
                    let mut ctx = PluginContext {
                        state: &self.state,
                        fsm: &self.fsm,
                        ports: ports.reborrow(),
                        config: &self.config,
                        counters: &mut self.counters,
                        now,
                    };
                    self.registry.reactivate(&mut ctx);
                }
            }
        }
        self.note_state(ports.sink);
    }

    /// Switch the active plugin.
    pub fn activate(
        &mut self,
        name: &str,
        ports: &mut Ports<'_>,
        now: Instant,
    ) -> Result<(), PluginError> {
        let mut ctx = PluginContext {
            state: &self.state,
            fsm: &self.fsm,
            ports: ports.reborrow(),
            config: &self.config,
            counters: &mut self.counters,
            now,
        };
        self.registry.activate(name, &mut ctx)?;
        self.display.invalidate();
        self.refresh_display(now);
        Ok(())
    }

    // ── Persistence ───────────────────────────────────────────

    /// What would be written to the state file right now.
    pub fn snapshot(&self) -> PersistedState {
        let st = self.state.lock();
        PersistedState {
            inserted_cents: st.inserted_cents,
            last_state: st.current_state,
            active_plugin: self
                .registry
                .active_name()
                .map_or_else(|| self.config.plugins.default.clone(), str::to_string),
        }
    }

    /// Write the snapshot through the attached store.  `false` if there
    /// is no store or the write failed.
    pub fn save_state(&mut self) -> bool {
        let snapshot = self.snapshot();
        let Some(store) = self.store.as_mut() else {
            debug!("No state store attached; not saving");
            return false;
        };
        match store.save(&snapshot) {
            Ok(()) => {
                info!(
                    "State saved: {} with {}c, plugin '{}'",
                    snapshot.last_state, snapshot.inserted_cents, snapshot.active_plugin
                );
                true
            }
            Err(e) => {
                warn!("State save failed: {}", e);
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn display(&self) -> &DisplayManager {
        &self.display
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Handle for the control surface, usable from any thread.
    pub fn control_handle(&self) -> ControlHandle {
        let plugins = self
            .registry
            .list()
            .into_iter()
            .map(|(name, _, _)| name.to_string())
            .collect();
        ControlHandle::new(
            self.state.clone(),
            Arc::clone(&self.fsm),
            Arc::clone(&self.queue),
            Arc::clone(&self.requests),
            plugins,
        )
    }

    // ── Internal ──────────────────────────────────────────────

    /// Collaborator calls implied by a transition.
    fn transition_effects(
        event: &Event,
        before: PhoneState,
        after: PhoneState,
        was_live: bool,
        ports: &mut Ports<'_>,
    ) {
        let hook_down = matches!(event, Event::HookChange(HookState::Down));
        if hook_down && was_live {
            ports.calls.hangup();
        }
        if before == after {
            return;
        }
        match (before, after) {
            (PhoneState::IdleDown, PhoneState::IdleUp) => {
                ports.panel.coin_command(coin_cmd::ACCEPT);
            }
            (PhoneState::IdleDown, PhoneState::CallIncoming) => {
                ports.panel.coin_command(coin_cmd::REJECT);
                ports.panel.coin_command(coin_cmd::RESET);
            }
            (PhoneState::CallIncoming, PhoneState::CallActive)
                if matches!(event, Event::HookChange(HookState::Up)) =>
            {
                ports.calls.answer();
            }
            (_, PhoneState::IdleDown) if hook_down => {
                ports.panel.coin_command(coin_cmd::RETURN);
                ports.panel.coin_command(coin_cmd::RESET);
            }
            _ => {}
        }
    }

    /// Coin validator maintenance frames are reported, not dispatched.
    fn handle_eeprom(&mut self, event: &Event, sink: &mut dyn EventSink) -> bool {
        let report = match event {
            Event::EepromUploadStart => AppEvent::EepromReport("upload started"),
            Event::EepromUploadEnd => AppEvent::EepromReport("upload finished"),
            Event::EepromValidationStart => AppEvent::EepromReport("validation started"),
            Event::EepromValidationEnd => AppEvent::EepromReport("validation finished"),
            Event::EepromValidationError {
                addr,
                expected,
                actual,
            } => AppEvent::EepromMismatch {
                addr: *addr,
                expected: *expected,
                actual: *actual,
            },
            _ => return false,
        };
        self.emit(sink, report);
        true
    }

    /// Emit `StateChanged` if the state moved since the last look.
    fn note_state(&mut self, sink: &mut dyn EventSink) {
        let current = self.state.lock().current_state;
        if current != self.last_seen {
            let from = std::mem::replace(&mut self.last_seen, current);
            self.emit(sink, AppEvent::StateChanged { from, to: current });
        }
    }

    fn refresh_display(&mut self, now: Instant) {
        let snapshot = self.state.snapshot();
        if let Some(text) = self.registry.display_text(&snapshot, now) {
            self.display.show(&text);
        }
    }

    fn emit(&mut self, sink: &mut dyn EventSink, event: AppEvent) {
        self.counters.observe(&event);
        sink.emit(&event);
    }
}
