//! Personalities that run on the payphone hardware.
//!
//! ```text
//!   DaemonController ──dispatch(event)──▶ PluginRegistry ──▶ active Plugin
//!                                              │                 │
//!                                              │        PluginContext
//!                                              │   (SharedState, Ports, config)
//!                                              ▼
//!                                    Classic Phone · Fortune Teller · Jukebox
//! ```
//!
//! The controller runs every event through the FSM first and hands it to
//! the active plugin afterwards, so a plugin always sees `DaemonState`
//! with the event already applied (coin credited, digit appended, state
//! moved).  Plugins keep their own transient state in their own struct;
//! the shared fields (credit, dial buffer, hook and call state) are only
//! touched through [`PluginContext`].
//!
//! | Handler          | Called when                                   |
//! |------------------|-----------------------------------------------|
//! | `on_coin`        | the FSM credited a coin                       |
//! | `on_keypad`      | any key, including `*` and `#`                |
//! | `on_hook`        | receiver lifted or replaced                   |
//! | `on_call_state`  | the call bridge reported progress             |
//! | `on_card`        | a card was swiped                             |
//! | `on_activate`    | the plugin became the active one              |
//! | `on_deactivate`  | another plugin is about to take over          |
//! | `on_tick`        | every main-loop iteration                     |

pub mod classic_phone;
pub mod fortune_teller;
pub mod jukebox;

use std::time::Instant;

use log::{debug, info};

use crate::app::events::{AppEvent, Billing};
use crate::app::ports::Ports;
use crate::config::SystemConfig;
use crate::diagnostics::Counters;
use crate::display::DisplayText;
use crate::error::PluginError;
use crate::events::{CallState, Event, HookState, coin_value_cents};
use crate::fsm::context::{DaemonState, SharedState};
use crate::fsm::{Fsm, Outcome, PhoneState};

/// Upper bound on installed personalities.
pub const MAX_PLUGINS: usize = 10;

// ───────────────────────────────────────────────────────────────
// Plugin contract
// ───────────────────────────────────────────────────────────────

/// A personality.  Every handler defaults to doing nothing, so a plugin
/// implements only what it reacts to.
pub trait Plugin {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn on_activate(&mut self, _ctx: &mut PluginContext<'_>) {}

    fn on_deactivate(&mut self, _ctx: &mut PluginContext<'_>) {}

    fn on_coin(&mut self, _ctx: &mut PluginContext<'_>, _cents: u32) {}

    fn on_keypad(&mut self, _ctx: &mut PluginContext<'_>, _key: char) {}

    fn on_hook(&mut self, _ctx: &mut PluginContext<'_>, _hook: HookState) {}

    fn on_call_state(&mut self, _ctx: &mut PluginContext<'_>, _call: CallState) {}

    fn on_card(&mut self, _ctx: &mut PluginContext<'_>, _card: &str) {}

    fn on_tick(&mut self, _ctx: &mut PluginContext<'_>) {}

    /// What the panel should show right now.
    fn display_text(&self, state: &DaemonState, now: Instant) -> DisplayText;
}

// ───────────────────────────────────────────────────────────────
// PluginContext
// ───────────────────────────────────────────────────────────────

/// Everything a plugin handler may touch for the duration of one call.
pub struct PluginContext<'a> {
    pub state: &'a SharedState,
    pub fsm: &'a Fsm,
    pub ports: Ports<'a>,
    pub config: &'a SystemConfig,
    pub counters: &'a mut Counters,
    pub now: Instant,
}

impl PluginContext<'_> {
    /// Run `f` under the state lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut DaemonState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn snapshot(&self) -> DaemonState {
        self.state.snapshot()
    }

    pub fn phone_state(&self) -> PhoneState {
        self.with_state(|s| s.current_state)
    }

    pub fn credit(&self) -> u32 {
        self.with_state(|s| s.inserted_cents)
    }

    pub fn add_cents(&self, cents: u32) {
        self.with_state(|s| s.add_cents(cents));
    }

    /// Deduct up to `cents`, returning what was taken.
    pub fn take_cents(&self, cents: u32) -> u32 {
        self.with_state(|s| s.take_cents(cents))
    }

    pub fn clear_keypad(&self) {
        self.with_state(DaemonState::clear_keypad);
    }

    pub fn clear_session(&self) {
        self.with_state(DaemonState::clear_session);
    }

    /// Count and forward an application event.
    pub fn emit(&mut self, event: AppEvent) {
        self.counters.observe(&event);
        self.ports.sink.emit(&event);
    }

    pub fn coin_command(&mut self, command: u8) {
        self.ports.panel.coin_command(command);
    }

    /// Mark an outbound dial as pending and hand the number to the
    /// call bridge.
    pub fn place_call(&mut self, number: &str, billing: Billing) {
        self.with_state(|s| s.outbound_pending = true);
        self.ports.audio.stop();
        self.ports.calls.place(number);
        info!("PHONE | dialing {} ({:?})", number, billing);
        self.emit(AppEvent::CallPlaced {
            number: number.to_string(),
            billing,
        });
    }

    /// Tear down the current call leg from this end and drop back to the
    /// idle state matching the receiver.  Returns `false` when there was
    /// nothing to hang up.
    pub fn hangup(&mut self) -> bool {
        let (now, fsm) = (self.now, self.fsm);
        {
            let mut st = self.state.lock();
            if !st.call_in_progress() {
                return false;
            }
            st.outbound_pending = false;
            if matches!(
                st.current_state,
                PhoneState::CallActive | PhoneState::CallIncoming
            ) {
                let next = match st.handset {
                    HookState::Up => PhoneState::IdleUp,
                    HookState::Down => PhoneState::IdleDown,
                };
                fsm.force_transition(&mut st, next, now);
            }
        }
        self.ports.calls.hangup();
        true
    }
}

// ───────────────────────────────────────────────────────────────
// PluginRegistry
// ───────────────────────────────────────────────────────────────

/// Installed personalities plus the one currently receiving events.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    active: Option<usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a plugin.  Names are unique.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(PluginError::DuplicateName(plugin.name().to_string()));
        }
        if self.plugins.len() >= MAX_PLUGINS {
            return Err(PluginError::RegistryFull);
        }
        debug!("Registered plugin '{}'", plugin.name());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Make `name` the active plugin.
    ///
    /// The outgoing plugin is deactivated and the dial buffer cleared;
    /// credit is left untouched so a switch never loses coins.
    pub fn activate(&mut self, name: &str, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let idx = self
            .plugins
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| PluginError::UnknownName(name.to_string()))?;

        let from = self.active.map(|i| self.plugins[i].name().to_string());
        if let Some(current) = self.active {
            self.plugins[current].on_deactivate(ctx);
            ctx.clear_keypad();
        }

        self.active = Some(idx);
        self.plugins[idx].on_activate(ctx);

        info!("Plugin activated: {}", name);
        ctx.emit(AppEvent::PluginActivated {
            from,
            to: name.to_string(),
        });
        Ok(())
    }

    /// Route one event, already run through the FSM with `outcome`, to
    /// the active plugin.
    pub fn dispatch(&mut self, event: &Event, outcome: Outcome, ctx: &mut PluginContext<'_>) {
        let Some(plugin) = self.active_mut() else {
            return;
        };
        match event {
            Event::Coin(code) => {
                if outcome == Outcome::Accepted {
                    if let Some(cents) = coin_value_cents(*code) {
                        plugin.on_coin(ctx, cents);
                    }
                }
            }
            Event::Keypad(key) => plugin.on_keypad(ctx, *key),
            Event::HookChange(hook) => plugin.on_hook(ctx, *hook),
            Event::CallState(call) => plugin.on_call_state(ctx, *call),
            Event::Card(card) => plugin.on_card(ctx, card),
            _ => {}
        }
    }

    /// Re-run the active plugin's activation after the shared state was
    /// changed behind its back (reset, emergency stop).
    pub fn reactivate(&mut self, ctx: &mut PluginContext<'_>) {
        if let Some(plugin) = self.active_mut() {
            plugin.on_activate(ctx);
        }
    }

    /// Per-iteration timer hook of the active plugin.
    pub fn tick(&mut self, ctx: &mut PluginContext<'_>) {
        if let Some(plugin) = self.active_mut() {
            plugin.on_tick(ctx);
        }
    }

    /// Display text from the active plugin.
    pub fn display_text(&self, state: &DaemonState, now: Instant) -> Option<DisplayText> {
        self.active
            .map(|i| self.plugins[i].display_text(state, now))
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.map(|i| self.plugins[i].name())
    }

    /// `(name, description, active)` for every installed plugin.
    pub fn list(&self) -> Vec<(&'static str, &'static str, bool)> {
        self.plugins
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), p.description(), self.active == Some(i)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn active_mut(&mut self) -> Option<&mut Box<dyn Plugin>> {
        let idx = self.active?;
        self.plugins.get_mut(idx)
    }
}
