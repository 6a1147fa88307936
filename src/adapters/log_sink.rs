//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade, one `SUBSYSTEM | detail` line per event.  A metrics
//! or WebSocket adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::{AppEvent, Billing};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::CoinAccepted { cents, total } => {
                info!("COIN  | +{}c total={}c", cents, total);
            }
            AppEvent::CallPlaced { number, billing } => {
                let billing = match billing {
                    Billing::Paid(cents) => format!("paid {}c", cents),
                    Billing::Free => "free".to_string(),
                    Billing::Card => "card".to_string(),
                };
                info!("CALL  | placed to {} ({})", number, billing);
            }
            AppEvent::CallRefused { number } => {
                warn!("CALL  | refused to {}: backend not registered", number);
            }
            AppEvent::CallFailed { refunded } => {
                warn!("CALL  | failed, refunded {}c", refunded);
            }
            AppEvent::CallTimedOut { number } => {
                info!("CALL  | to {} timed out", number);
            }
            AppEvent::CallEnded => {
                info!("CALL  | ended");
            }
            AppEvent::CardSwiped { accepted, admin } => {
                info!(
                    "CARD  | {}{}",
                    if *accepted { "accepted" } else { "rejected" },
                    if *admin { " (admin)" } else { "" }
                );
            }
            AppEvent::PluginActivated { from, to } => match from {
                Some(from) => info!("PLUGIN| {} -> {}", from, to),
                None => info!("PLUGIN| {}", to),
            },
            AppEvent::SessionAbandoned { cents } => {
                info!("IDLE  | session abandoned, {}c cleared", cents);
            }
            AppEvent::EepromReport(what) => {
                info!("EEPROM| {}", what);
            }
            AppEvent::EepromMismatch {
                addr,
                expected,
                actual,
            } => {
                warn!(
                    "EEPROM| mismatch at 0x{:02x}: expected 0x{:02x}, read 0x{:02x}",
                    addr, expected, actual
                );
            }
            AppEvent::Stats(c) => {
                info!(
                    "STATS | up={}s | events={} dropped={} noise={}B | coins={} ({}c) | \
                     calls={} free={} card={} answered={} failed={} timeout={} refused={} | \
                     switches={} abandoned={}",
                    c.uptime_secs,
                    c.events_processed,
                    c.events_dropped,
                    c.noise_bytes,
                    c.coins_inserted,
                    c.coin_value_cents,
                    c.calls_placed,
                    c.calls_free,
                    c.calls_card,
                    c.calls_answered,
                    c.calls_failed,
                    c.calls_timed_out,
                    c.calls_refused,
                    c.plugin_switches,
                    c.sessions_abandoned,
                );
            }
            AppEvent::Inactive { idle_secs } => {
                warn!("HEALTH| no activity for {}s", idle_secs);
            }
        }
    }
}
