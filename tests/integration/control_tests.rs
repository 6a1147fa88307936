//! Web-control commands routed through `ControlHandle` into a running
//! controller.

use millennium::app::events::AppEvent;
use millennium::config::SystemConfig;
use millennium::events::CallState;
use millennium::fsm::PhoneState;

use crate::mock_hw::{BridgeCall, Harness};

fn harness() -> Harness {
    let mut h = Harness::new(SystemConfig::default());
    h.settle();
    h
}

/// Run a command and let the main loop process whatever it queued.
fn exec(h: &mut Harness, command: &str) -> bool {
    let ok = h.controller.control_handle().execute(command);
    h.settle();
    ok
}

#[test]
fn synthetic_events_place_a_call() {
    let mut h = harness();
    assert!(exec(&mut h, "handset_up"));
    assert!(exec(&mut h, "coin_insert:25"));
    assert!(exec(&mut h, "coin_insert:25"));
    for _ in 0..10 {
        assert!(exec(&mut h, "keypad_press:5"));
    }
    assert_eq!(h.bridge.placed(), vec!["5555555555"]);
    assert_eq!(h.credit(), 0);
}

#[test]
fn malformed_commands_are_refused() {
    let mut h = harness();
    assert!(!exec(&mut h, "coin_insert:30"));
    assert!(!exec(&mut h, "keypad_press:x"));
    assert!(!exec(&mut h, "dance"));
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
}

#[test]
fn keypad_editing_needs_receiver_up() {
    let mut h = harness();
    assert!(!exec(&mut h, "keypad_clear"));

    exec(&mut h, "handset_up");
    exec(&mut h, "keypad_press:1");
    exec(&mut h, "keypad_press:2");
    assert!(exec(&mut h, "keypad_backspace"));
    assert_eq!(h.keypad(), "1");
    assert!(exec(&mut h, "keypad_clear"));
    assert_eq!(h.keypad(), "");
    assert!(!exec(&mut h, "keypad_backspace"));
}

#[test]
fn coin_return_zeroes_credit_and_commands_validator() {
    let mut h = harness();
    exec(&mut h, "handset_up");
    exec(&mut h, "coin_insert:10");
    assert_eq!(h.credit(), 10);

    assert!(exec(&mut h, "coin_return"));
    assert_eq!(h.credit(), 0);
    assert_eq!(h.link.coin_commands.last(), Some(&b'c'));
}

#[test]
fn start_call_rings_and_lifting_answers() {
    let mut h = harness();
    assert!(exec(&mut h, "start_call"));
    assert_eq!(h.phone_state(), PhoneState::CallIncoming);
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::StateChanged { to: PhoneState::CallIncoming, .. }
    )));

    exec(&mut h, "handset_up");
    assert_eq!(h.phone_state(), PhoneState::CallActive);
    assert_eq!(h.bridge.count(&BridgeCall::Answer), 1);
}

#[test]
fn emergency_stop_hangs_up_once_and_waits_for_hook() {
    let mut h = harness();
    exec(&mut h, "handset_up");
    exec(&mut h, "coin_insert:25");
    exec(&mut h, "coin_insert:25");
    h.keys("5555555555");
    h.signal(CallState::Active);
    assert_eq!(h.phone_state(), PhoneState::CallActive);

    assert!(exec(&mut h, "emergency_stop"));
    assert_eq!(h.phone_state(), PhoneState::Invalid);
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
    assert_eq!(h.controller.display().visible().0, "Out of service");

    // Everything but a hang-up is ignored.
    exec(&mut h, "coin_insert:25");
    assert_eq!(h.phone_state(), PhoneState::Invalid);

    exec(&mut h, "handset_down");
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
}

#[test]
fn reset_system_restores_defaults() {
    let mut h = harness();
    exec(&mut h, "handset_up");
    exec(&mut h, "coin_insert:25");
    exec(&mut h, "keypad_press:4");

    assert!(exec(&mut h, "reset_system"));
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.credit(), 0);
    assert_eq!(h.keypad(), "");
}

#[test]
fn plugin_switch_keeps_credit() {
    let mut h = harness();
    exec(&mut h, "handset_up");
    exec(&mut h, "coin_insert:25");
    exec(&mut h, "keypad_press:7");

    assert!(exec(&mut h, "activate_plugin:Jukebox"));
    assert_eq!(h.controller.registry().active_name(), Some("Jukebox"));
    assert_eq!(h.credit(), 25);
    assert_eq!(h.keypad(), "");
    assert!(h.sink.any(|e| matches!(
        e,
        AppEvent::PluginActivated { to, .. } if to == "Jukebox"
    )));

    assert!(exec(&mut h, "activate_plugin:Classic Phone"));
    assert_eq!(h.credit(), 25);
}

#[test]
fn unknown_plugin_is_refused() {
    let mut h = harness();
    assert!(!exec(&mut h, "activate_plugin:Karaoke"));
    assert_eq!(h.controller.registry().active_name(), Some("Classic Phone"));
}

#[test]
fn switching_away_mid_call_hangs_up() {
    let mut h = harness();
    exec(&mut h, "handset_up");
    exec(&mut h, "keypad_press:9");
    exec(&mut h, "keypad_press:1");
    exec(&mut h, "keypad_press:1");
    h.signal(CallState::Active);
    assert_eq!(h.phone_state(), PhoneState::CallActive);

    exec(&mut h, "activate_plugin:Fortune Teller");
    assert_eq!(h.bridge.count(&BridgeCall::Hangup), 1);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
}
