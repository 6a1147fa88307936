//! Classic Phone: coin-operated calling.
//!
//! ```text
//!   lift ──▶ coins + digits ──check_and_call──▶ dialing ──Active──▶ in call
//!              ▲                                   │                  │
//!              │               Ended/Invalid: refund, "Call failed"   │
//!              └───────────────────────────────────┘   timeout/hangup ┘
//! ```
//!
//! Dialing rules, evaluated after every coin, digit and card:
//!
//! 1. The buffer exactly matches a free number: dial now, no charge.
//! 2. An accepted card was swiped and ten digits are in: dial, no charge.
//! 3. Ten digits and enough credit: check registration, charge, dial.
//!    Unregistered: refuse, charge nothing.
//!
//! Paid calls are cut off after `call.timeout_secs`; the last
//! `call.warning_secs` show a countdown.

use std::time::{Duration, Instant};

use log::{debug, info};

use super::{Plugin, PluginContext};
use crate::app::events::{AppEvent, Billing};
use crate::app::ports::RegistrationStatus;
use crate::config::CallConfig;
use crate::display::{DisplayText, format_number};
use crate::events::{CallState, HookState};
use crate::fsm::PhoneState;
use crate::fsm::context::{DaemonState, KEYPAD_CAPACITY};

pub const NAME: &str = "Classic Phone";

pub struct ClassicPhone {
    call_cost_cents: u32,
    call_timeout: Duration,
    warning: Duration,
    idle_timeout: Duration,

    is_dialing: bool,
    is_in_call: bool,
    is_emergency_call: bool,
    is_card_call: bool,
    /// The current call came in rather than going out.
    is_incoming: bool,
    /// Number of the current outbound attempt.
    number: String,
    /// Cents charged for the current attempt; refunded if it never connects.
    charged: u32,
    call_start: Option<Instant>,
    last_activity: Option<Instant>,
    banner: Option<(DisplayText, Instant)>,
}

impl ClassicPhone {
    pub fn new(call: &CallConfig) -> Self {
        Self {
            call_cost_cents: call.cost_cents,
            call_timeout: Duration::from_secs(u64::from(call.timeout_secs)),
            warning: Duration::from_secs(u64::from(call.warning_secs)),
            idle_timeout: Duration::from_secs(u64::from(call.idle_timeout_secs)),
            is_dialing: false,
            is_in_call: false,
            is_emergency_call: false,
            is_card_call: false,
            is_incoming: false,
            number: String::new(),
            charged: 0,
            call_start: None,
            last_activity: None,
            banner: None,
        }
    }

    pub fn is_dialing(&self) -> bool {
        self.is_dialing
    }

    pub fn is_in_call(&self) -> bool {
        self.is_in_call
    }

    fn reset_call(&mut self) {
        self.is_dialing = false;
        self.is_in_call = false;
        self.is_emergency_call = false;
        self.is_incoming = false;
        self.number.clear();
        self.charged = 0;
        self.call_start = None;
    }

    fn reset_all(&mut self) {
        self.reset_call();
        self.is_card_call = false;
        self.banner = None;
    }

    fn show_banner(&mut self, ctx: &PluginContext<'_>, line1: &str, line2: &str) {
        let until = ctx.now + Duration::from_secs(ctx.config.display.banner_secs);
        self.banner = Some((DisplayText::new(line1, line2), until));
    }

    /// Paid outbound calls run against the clock.
    fn is_timed(&self) -> bool {
        !(self.is_emergency_call || self.is_card_call || self.is_incoming)
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        if !self.is_in_call || !self.is_timed() {
            return None;
        }
        let start = self.call_start?;
        Some(self.call_timeout.saturating_sub(now.saturating_duration_since(start)))
    }

    fn check_and_call(&mut self, ctx: &mut PluginContext<'_>) {
        if self.is_dialing || self.is_in_call {
            return;
        }
        let (number, credit, state) = ctx.with_state(|s| {
            (s.keypad().to_string(), s.inserted_cents, s.current_state)
        });
        if state != PhoneState::IdleUp || number.is_empty() {
            return;
        }

        if ctx.config.call.is_free_number(&number) {
            self.is_emergency_call = true;
            self.start_call(ctx, number, Billing::Free, 0);
            return;
        }
        if number.len() < KEYPAD_CAPACITY {
            return;
        }
        if self.is_card_call {
            self.start_call(ctx, number, Billing::Card, 0);
            return;
        }
        if credit < self.call_cost_cents {
            return;
        }

        if ctx.ports.calls.registration_status() != RegistrationStatus::Registered {
            info!("PHONE | refusing {}: not registered", number);
            ctx.clear_keypad();
            self.show_banner(ctx, "Service unavail", "Not registered");
            ctx.emit(AppEvent::CallRefused { number });
            return;
        }

        let charged = ctx.take_cents(self.call_cost_cents);
        self.start_call(ctx, number, Billing::Paid(charged), charged);
    }

    fn start_call(
        &mut self,
        ctx: &mut PluginContext<'_>,
        number: String,
        billing: Billing,
        charged: u32,
    ) {
        self.is_incoming = false;
        self.is_dialing = true;
        self.charged = charged;
        self.last_activity = Some(ctx.now);
        ctx.place_call(&number, billing);
        self.number = number;
    }

    fn end_session(&mut self, ctx: &PluginContext<'_>) {
        ctx.clear_session();
        self.reset_all();
        self.last_activity = Some(ctx.now);
    }
}

impl Plugin for ClassicPhone {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Traditional pay phone functionality with VoIP calling"
    }

    fn on_activate(&mut self, ctx: &mut PluginContext<'_>) {
        self.reset_all();
        self.last_activity = Some(ctx.now);
        // Credit restored from a snapshot may already be enough.
        self.check_and_call(ctx);
    }

    fn on_deactivate(&mut self, ctx: &mut PluginContext<'_>) {
        if self.is_dialing {
            // The bridge's failure report will reach the next plugin.
            let refunded = self.charged;
            ctx.add_cents(refunded);
            info!("PHONE | dial to {} abandoned, refunded {}c", self.number, refunded);
            ctx.emit(AppEvent::CallFailed { refunded });
        }
        if self.is_dialing || self.is_in_call {
            ctx.hangup();
        }
        self.reset_all();
    }

    fn on_coin(&mut self, ctx: &mut PluginContext<'_>, cents: u32) {
        ctx.ports.audio.coin_chime();
        self.last_activity = Some(ctx.now);
        debug!("PHONE | coin {}c, credit {}c", cents, ctx.credit());
        self.check_and_call(ctx);
    }

    fn on_keypad(&mut self, ctx: &mut PluginContext<'_>, key: char) {
        if self.is_in_call {
            ctx.ports.calls.send_dtmf(key);
            ctx.ports.audio.dtmf(key);
            return;
        }
        if self.is_dialing || ctx.phone_state() != PhoneState::IdleUp {
            return;
        }
        ctx.ports.audio.dtmf(key);
        self.last_activity = Some(ctx.now);
        self.check_and_call(ctx);
    }

    fn on_hook(&mut self, ctx: &mut PluginContext<'_>, hook: HookState) {
        match hook {
            HookState::Up => {
                if ctx.phone_state() == PhoneState::CallActive {
                    // Picked up a ringing call.
                    self.is_incoming = true;
                    self.is_in_call = true;
                    self.call_start = Some(ctx.now);
                    info!("PHONE | incoming call answered");
                } else {
                    self.reset_all();
                    self.last_activity = Some(ctx.now);
                    ctx.ports.audio.dial_tone();
                }
            }
            HookState::Down => {
                ctx.ports.audio.stop();
                if self.is_in_call {
                    ctx.emit(AppEvent::CallEnded);
                }
                self.reset_all();
            }
        }
    }

    fn on_call_state(&mut self, ctx: &mut PluginContext<'_>, call: CallState) {
        debug!(
            "PHONE | call state {:?} (dialing={}, in_call={})",
            call, self.is_dialing, self.is_in_call
        );
        match call {
            CallState::Incoming => {
                if self.is_dialing
                    || self.is_in_call
                    || ctx.phone_state() != PhoneState::CallIncoming
                {
                    debug!("PHONE | incoming report ignored while busy");
                    return;
                }
                self.reset_call();
                self.is_incoming = true;
            }
            CallState::Active => {
                if self.is_dialing {
                    self.is_dialing = false;
                    self.is_in_call = true;
                    self.call_start = Some(ctx.now);
                    info!("PHONE | connected to {}", self.number);
                } else if self.is_incoming && ctx.phone_state() == PhoneState::CallActive {
                    self.is_in_call = true;
                    self.call_start.get_or_insert(ctx.now);
                }
            }
            CallState::Ended | CallState::Invalid => {
                if self.is_dialing {
                    let refunded = self.charged;
                    ctx.add_cents(refunded);
                    ctx.clear_keypad();
                    info!("PHONE | call to {} failed, refunded {}c", self.number, refunded);
                    ctx.emit(AppEvent::CallFailed { refunded });
                    self.reset_call();
                    if refunded > 0 {
                        self.show_banner(ctx, "Call failed", &format!("Refunded {}c", refunded));
                    } else {
                        self.show_banner(ctx, "Call failed", "");
                    }
                } else if self.is_in_call || self.is_incoming {
                    info!("PHONE | call ended by remote");
                    ctx.emit(AppEvent::CallEnded);
                    self.reset_call();
                }
                self.last_activity = Some(ctx.now);
            }
        }
    }

    fn on_card(&mut self, ctx: &mut PluginContext<'_>, card: &str) {
        if !ctx.config.cards.enabled {
            debug!("PHONE | card support disabled");
            return;
        }
        if self.is_dialing || self.is_in_call || ctx.phone_state() != PhoneState::IdleUp {
            debug!("PHONE | card ignored outside an idle session");
            return;
        }

        let cards = &ctx.config.cards;
        let admin = cards.admin_cards.iter().any(|c| c == card);
        let accepted = admin || cards.free_cards.iter().any(|c| c == card);
        ctx.emit(AppEvent::CardSwiped { accepted, admin });
        self.last_activity = Some(ctx.now);

        if !accepted {
            self.show_banner(ctx, "Card rejected", "Insert coins");
            return;
        }
        self.is_card_call = true;
        if admin {
            self.show_banner(ctx, "Service mode", "Card accepted");
        } else {
            self.show_banner(ctx, "Card accepted", "Dial number");
        }
        self.check_and_call(ctx);
    }

    fn on_tick(&mut self, ctx: &mut PluginContext<'_>) {
        let now = ctx.now;
        if self.banner.as_ref().is_some_and(|(_, until)| now >= *until) {
            self.banner = None;
        }

        if let Some(remaining) = self.remaining(now) {
            if remaining.is_zero() {
                info!("PHONE | call to {} reached its time limit", self.number);
                let number = std::mem::take(&mut self.number);
                ctx.emit(AppEvent::CallTimedOut { number });
                ctx.hangup();
                self.end_session(ctx);
                self.show_banner(ctx, "Time expired", "Thank you");
            }
            return;
        }

        if self.is_dialing || self.is_in_call || self.idle_timeout.is_zero() {
            return;
        }
        let Some(last) = self.last_activity else {
            return;
        };
        if now.saturating_duration_since(last) < self.idle_timeout {
            return;
        }
        let (state, cents, digits) =
            ctx.with_state(|s| (s.current_state, s.inserted_cents, !s.keypad().is_empty()));
        if state == PhoneState::IdleUp && (cents > 0 || digits || self.is_card_call) {
            info!("PHONE | session abandoned with {}c", cents);
            ctx.emit(AppEvent::SessionAbandoned { cents });
            self.end_session(ctx);
        } else {
            self.last_activity = Some(now);
        }
    }

    fn display_text(&self, state: &DaemonState, now: Instant) -> DisplayText {
        if let Some((text, until)) = &self.banner {
            if now < *until {
                return text.clone();
            }
        }

        if self.is_in_call {
            return match self.remaining(now) {
                Some(left) if left <= self.warning => {
                    let secs = left.as_secs();
                    DisplayText::new(
                        "Call active",
                        format!("{}:{:02} remaining", secs / 60, secs % 60),
                    )
                }
                _ => DisplayText::new("Call active", "Hang up to end"),
            };
        }
        if self.is_dialing {
            return DisplayText::new(format_number(&self.number), "Dialing...");
        }

        match state.current_state {
            PhoneState::IdleDown => DisplayText::new("Lift receiver", "to make a call"),
            PhoneState::CallIncoming => DisplayText::new("Call incoming...", "Lift receiver"),
            PhoneState::Invalid => DisplayText::new("Out of service", "Please hang up"),
            PhoneState::CallActive => DisplayText::new("Call active", "Hang up to end"),
            PhoneState::IdleUp => {
                let line2 = if self.is_card_call {
                    "Card: dial number".to_string()
                } else if state.inserted_cents > 0 {
                    format!("Have: {}c", state.inserted_cents)
                } else {
                    format!("Insert {}c", self.call_cost_cents)
                };
                DisplayText::new(format_number(state.keypad()), line2)
            }
        }
    }
}
