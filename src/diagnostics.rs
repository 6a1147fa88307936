//! Runtime counters and the activity health check.
//!
//! Counters are derived from the [`AppEvent`] stream rather than bumped
//! by hand at each call site: every event the core emits passes through
//! [`Counters::observe`] on its way to the sink.  A snapshot goes out as
//! `AppEvent::Stats` on a fixed interval.

use std::time::{Duration, Instant};

use crate::app::events::{AppEvent, Billing};
use crate::fsm::PhoneState;

/// Monotonic activity counters since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub uptime_secs: u64,
    pub events_processed: u64,
    pub events_dropped: u32,
    pub noise_bytes: u64,
    pub coins_inserted: u64,
    pub coin_value_cents: u64,
    pub calls_placed: u64,
    pub calls_free: u64,
    pub calls_card: u64,
    pub calls_answered: u64,
    pub calls_refused: u64,
    pub calls_failed: u64,
    pub calls_timed_out: u64,
    pub calls_ended: u64,
    pub cards_rejected: u64,
    pub plugin_switches: u64,
    pub sessions_abandoned: u64,
}

impl Counters {
    /// Fold one outbound event into the counters.
    pub fn observe(&mut self, event: &AppEvent) {
        match event {
            AppEvent::CoinAccepted { cents, .. } => {
                self.coins_inserted += 1;
                self.coin_value_cents += u64::from(*cents);
            }
            AppEvent::CallPlaced { billing, .. } => {
                self.calls_placed += 1;
                match billing {
                    Billing::Paid(_) => {}
                    Billing::Free => self.calls_free += 1,
                    Billing::Card => self.calls_card += 1,
                }
            }
            AppEvent::StateChanged {
                from: PhoneState::CallIncoming,
                to: PhoneState::CallActive,
            } => self.calls_answered += 1,
            AppEvent::CallRefused { .. } => self.calls_refused += 1,
            AppEvent::CallFailed { .. } => self.calls_failed += 1,
            AppEvent::CallTimedOut { .. } => self.calls_timed_out += 1,
            AppEvent::CallEnded => self.calls_ended += 1,
            AppEvent::CardSwiped { accepted: false, .. } => self.cards_rejected += 1,
            AppEvent::PluginActivated { from: Some(_), .. } => self.plugin_switches += 1,
            AppEvent::SessionAbandoned { .. } => self.sessions_abandoned += 1,
            _ => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Fixed-interval trigger
// ───────────────────────────────────────────────────────────────

/// Fires once per `period`, evaluated cooperatively on each poll.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period: Duration,
    last: Instant,
}

impl Interval {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self { period, last: now }
    }

    /// `true` (and re-arms) when a full period has passed.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.period {
            self.last = now;
            true
        } else {
            false
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Activity health check
// ───────────────────────────────────────────────────────────────

/// Warns once when nothing has happened for longer than `threshold`,
/// re-arming when activity resumes.
#[derive(Debug)]
pub struct HealthCheck {
    threshold: Duration,
    warned: bool,
}

impl HealthCheck {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            warned: false,
        }
    }

    /// Idle seconds the first time the threshold is crossed, else `None`.
    pub fn check(&mut self, last_activity: Instant, now: Instant) -> Option<u64> {
        let idle = now.saturating_duration_since(last_activity);
        if idle <= self.threshold {
            self.warned = false;
            return None;
        }
        if self.warned {
            return None;
        }
        self.warned = true;
        Some(idle.as_secs())
    }
}
