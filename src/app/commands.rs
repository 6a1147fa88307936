//! Inbound control commands.
//!
//! The control surface (web portal, console) sends short strings; each
//! one parses into a [`ControlCommand`] that the
//! [`ControlHandle`](super::control::ControlHandle) applies.
//!
//! | Wire form               | Command                         |
//! |-------------------------|---------------------------------|
//! | `start_call`            | `StartCall`                     |
//! | `reset_system`          | `ResetSystem`                   |
//! | `emergency_stop`        | `EmergencyStop`                 |
//! | `keypad_press:<0-9>`    | `KeypadPress(digit)`            |
//! | `keypad_clear`          | `KeypadClear`                   |
//! | `keypad_backspace`      | `KeypadBackspace`               |
//! | `coin_insert:<5,10,25>` | `CoinInsert(cents)`             |
//! | `coin_return`           | `CoinReturn`                    |
//! | `handset_up`            | `HandsetUp`                     |
//! | `handset_down`          | `HandsetDown`                   |
//! | `activate_plugin:<n>`   | `ActivatePlugin(name)`          |
//! | `save_state`            | `SaveState`                     |

use crate::events::coin_code_for_cents;

/// Commands the control surface can send into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Simulate an incoming call.
    StartCall,

    /// Back to start-of-process defaults.
    ResetSystem,

    /// Take the phone out of service until the receiver is replaced.
    EmergencyStop,

    /// Press one digit key.
    KeypadPress(char),

    KeypadClear,

    KeypadBackspace,

    /// Drop a coin of this many cents (5, 10 or 25).
    CoinInsert(u32),

    /// Return all credit.
    CoinReturn,

    HandsetUp,

    HandsetDown,

    /// Switch personality.
    ActivatePlugin(String),

    /// Write the state snapshot now.
    SaveState,
}

impl ControlCommand {
    /// Parse the wire form.  `None` for anything unrecognised or out of
    /// range.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (verb, arg) = match input.split_once(':') {
            Some((verb, arg)) => (verb, Some(arg.trim())),
            None => (input, None),
        };

        let cmd = match (verb, arg) {
            ("start_call", None) => Self::StartCall,
            ("reset_system", None) => Self::ResetSystem,
            ("emergency_stop", None) => Self::EmergencyStop,
            ("keypad_clear", None) => Self::KeypadClear,
            ("keypad_backspace", None) => Self::KeypadBackspace,
            ("coin_return", None) => Self::CoinReturn,
            ("handset_up", None) => Self::HandsetUp,
            ("handset_down", None) => Self::HandsetDown,
            ("save_state", None) => Self::SaveState,
            ("keypad_press", Some(arg)) => {
                let mut chars = arg.chars();
                match (chars.next(), chars.next()) {
                    (Some(d), None) if d.is_ascii_digit() => Self::KeypadPress(d),
                    _ => return None,
                }
            }
            ("coin_insert", Some(arg)) => {
                let cents = arg.parse::<u32>().ok()?;
                coin_code_for_cents(cents)?;
                Self::CoinInsert(cents)
            }
            ("activate_plugin", Some(name)) if !name.is_empty() => {
                Self::ActivatePlugin(name.to_string())
            }
            _ => return None,
        };
        Some(cmd)
    }
}
