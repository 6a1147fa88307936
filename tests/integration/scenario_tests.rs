//! End-to-end call scenarios: panel bytes in, collaborator calls out.

use std::time::Duration;

use millennium::app::events::{AppEvent, Billing};
use millennium::config::SystemConfig;
use millennium::events::CallState;
use millennium::fsm::PhoneState;

use crate::mock_hw::{BridgeCall, Harness, Sound};

const HOOK_UP: &[u8] = b"HU";
const HOOK_DOWN: &[u8] = b"HD";
const QUARTER: &[u8] = b"V8";

fn harness() -> Harness {
    Harness::new(SystemConfig::default())
}

/// Lift, pay 50c and dial a full number; the call is left dialing.
fn dial_paid_call(h: &mut Harness) {
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.keys("5555555555");
}

#[test]
fn idle_panel_invites_a_call() {
    let mut h = harness();
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    h.settle();
    assert_eq!(
        h.link.last_frame(),
        Some(&("Lift receiver".to_string(), "to make a call".to_string()))
    );
}

// ── Scenario 1: paid call ─────────────────────────────────────

#[test]
fn paid_call_is_placed_and_charged() {
    let mut h = harness();
    dial_paid_call(&mut h);

    assert_eq!(h.bridge.placed(), vec!["5555555555"]);
    assert_eq!(h.credit(), 0);
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::CallPlaced { billing: Billing::Paid(50), .. }
    )));
    assert_eq!(h.link.coin_commands.first(), Some(&b'a'));
    assert!(h.audio.sounds.contains(&Sound::DialTone));
    assert!(h.audio.sounds.contains(&Sound::CoinChime));
}

#[test]
fn nine_digits_and_full_credit_do_not_dial() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.keys("555555555");
    assert!(h.bridge.placed().is_empty());
    assert_eq!(h.credit(), 50);
}

#[test]
fn insufficient_credit_waits_for_coins() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    h.keys("5555555555");
    assert!(h.bridge.placed().is_empty());

    h.panel(QUARTER);
    assert_eq!(h.bridge.placed(), vec!["5555555555"]);
    assert_eq!(h.credit(), 0);
}

#[test]
fn eleventh_digit_is_rejected() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.keys("12345678901");
    assert_eq!(h.keypad(), "1234567890");
}

// ── Scenario 2: free number ───────────────────────────────────

#[test]
fn free_number_dials_without_coins() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.keys("9110000000");

    assert_eq!(h.bridge.placed(), vec!["911"]);
    assert_eq!(h.credit(), 0);
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::CallPlaced { billing: Billing::Free, .. }
    )));
}

// ── Scenario 3: hang up with credit ───────────────────────────

#[test]
fn hang_up_clears_credit_and_returns_coins() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    assert_eq!(h.credit(), 25);

    h.panel(HOOK_DOWN);
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.credit(), 0);
    assert!(h.link.coin_commands.ends_with(&[b'c', b'z']));
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 0);
    assert_eq!(h.audio.sounds.last(), Some(&Sound::Stop));
}

// ── Scenario 4: remote end of an active call ──────────────────

#[test]
fn remote_invalid_ends_call_without_second_hangup() {
    let mut h = harness();
    dial_paid_call(&mut h);
    h.signal(CallState::Active);
    assert_eq!(h.phone_state(), PhoneState::CallActive);

    h.signal(CallState::Invalid);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 0);
    assert!(h.sink.any(|e| matches!(e, AppEvent::CallEnded)));
}

#[test]
fn remote_end_after_hook_down_returns_to_idle_down() {
    let mut h = harness();
    dial_paid_call(&mut h);
    h.signal(CallState::Active);
    h.panel(HOOK_DOWN);

    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);

    // The bridge's own close report arrives afterwards and changes nothing.
    h.signal(CallState::Ended);
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
}

// ── Failure and refund ────────────────────────────────────────

#[test]
fn failed_dial_refunds_exactly_the_charge() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.keys("5555555555");
    assert_eq!(h.credit(), 25);

    h.signal(CallState::Ended);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
    assert_eq!(h.credit(), 75);
    assert!(h.sink.any(|e| matches!(e, AppEvent::CallFailed { refunded: 50 })));
    assert_eq!(h.controller.display().visible().0, "Call failed");
}

#[test]
fn incoming_report_during_dial_does_not_cancel_refund() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.keys("5555555555");
    assert_eq!(h.credit(), 25);

    h.signal(CallState::Incoming);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);

    h.signal(CallState::Invalid);
    assert_eq!(h.credit(), 75);
    assert!(h.sink.any(|e| matches!(e, AppEvent::CallFailed { refunded: 50 })));
}

#[test]
fn stray_incoming_report_leaves_next_paid_call_timed() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.signal(CallState::Incoming);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);

    h.panel(QUARTER);
    h.panel(QUARTER);
    h.keys("5555555555");
    h.signal(CallState::Active);
    assert_eq!(h.phone_state(), PhoneState::CallActive);

    h.advance(Duration::from_secs(400));
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
}

#[test]
fn switching_plugin_during_pending_dial_refunds() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.panel(QUARTER);
    h.keys("5555555555");
    assert_eq!(h.credit(), 25);

    assert!(h.controller.control_handle().execute("activate_plugin:Jukebox"));
    h.settle();
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
    assert_eq!(h.credit(), 75);

    // The bridge's own failure report lands on the new plugin.
    h.signal(CallState::Ended);
    assert_eq!(h.credit(), 75);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
}

#[test]
fn unregistered_backend_refuses_paid_call() {
    let mut h = harness();
    h.bridge.registered = false;
    dial_paid_call(&mut h);

    assert!(h.bridge.placed().is_empty());
    assert_eq!(h.credit(), 50);
    assert!(h.sink.any(|e| matches!(e, AppEvent::CallRefused { .. })));
    assert_eq!(h.controller.display().visible().0, "Service unavail");
}

// ── In-call behaviour ─────────────────────────────────────────

#[test]
fn keys_during_call_are_sent_as_dtmf() {
    let mut h = harness();
    dial_paid_call(&mut h);
    h.signal(CallState::Active);
    h.keys("1#");
    assert!(h.bridge.calls.contains(&BridgeCall::Dtmf('1')));
    assert!(h.bridge.calls.contains(&BridgeCall::Dtmf('#')));
}

#[test]
fn paid_call_counts_down_then_times_out() {
    let mut config = SystemConfig::default();
    config.call.timeout_secs = 30;
    config.call.warning_secs = 10;
    let mut h = Harness::new(config);
    dial_paid_call(&mut h);
    h.signal(CallState::Active);

    h.advance(Duration::from_secs(25));
    let (line1, line2) = h.controller.display().visible();
    assert_eq!(line1, "Call active");
    assert!(line2.starts_with("0:0") && line2.ends_with("remaining"), "{line2}");

    h.advance(Duration::from_secs(6));
    assert!(h.sink.any(|e| matches!(e, AppEvent::CallTimedOut { .. })));
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
    assert_eq!(h.credit(), 0);
}

#[test]
fn incoming_call_is_answered_by_lifting() {
    let mut h = harness();
    h.signal(CallState::Incoming);
    assert_eq!(h.phone_state(), PhoneState::CallIncoming);
    assert!(h.link.coin_commands.ends_with(&[b'f', b'z']));

    h.panel(HOOK_UP);
    assert_eq!(h.phone_state(), PhoneState::CallActive);
    assert_eq!(h.bridge.count(&BridgeCall::Answer), 1);

    h.panel(HOOK_DOWN);
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
}

#[test]
fn card_call_needs_no_coins() {
    let mut config = SystemConfig::default();
    config.cards.free_cards = vec!["1234567890123456".into()];
    let mut h = Harness::new(config);
    h.panel(HOOK_UP);
    h.panel(b"C1234567890123456");
    h.keys("5555555555");

    assert_eq!(h.bridge.placed(), vec!["5555555555"]);
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::CardSwiped { accepted: true, admin: false }
    )));
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::CallPlaced { billing: Billing::Card, .. }
    )));
}

// ── Link robustness ───────────────────────────────────────────

#[test]
fn line_noise_before_a_frame_is_skipped() {
    let mut h = harness();
    h.panel(b"\x00xx\xffHU");
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
}

#[test]
fn frame_split_across_reads_is_reassembled() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.link.queue_bytes(b"V");
    h.iterate();
    assert_eq!(h.credit(), 0);
    h.panel(b"8");
    assert_eq!(h.credit(), 25);
}

#[test]
fn eeprom_reports_do_not_change_state() {
    let mut h = harness();
    h.panel(b"AB");
    h.panel(b"E\x10\x20\x30");
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert!(h.sink.any(|e| matches!(e, AppEvent::EepromReport(_))));
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::EepromMismatch { addr: 0x10, expected: 0x20, actual: 0x30 }
    )));
}

#[test]
fn state_changes_are_reported_once_each() {
    let mut h = harness();
    h.panel(HOOK_UP);
    h.panel(HOOK_DOWN);
    let changes: Vec<_> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            (PhoneState::IdleDown, PhoneState::IdleUp),
            (PhoneState::IdleUp, PhoneState::IdleDown),
        ]
    );
}
