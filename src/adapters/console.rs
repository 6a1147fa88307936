//! Line-oriented control console on stdin.
//!
//! Each line is one web-control command (`keypad_press:5`,
//! `coin_insert:25`, `activate_plugin:Jukebox`, ...) handed to a
//! [`ControlHandle`] from a reader thread.  EOF ends the thread.
//!
//! `ring` is handled here rather than by the handle: it asks the
//! simulated signaling backend for an incoming call.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::adapters::call_bridge::Ringer;
use crate::app::control::ControlHandle;

/// Feed every non-empty line of `input` to `handle`.  Returns the number
/// of commands that succeeded.
pub fn run_console<R: BufRead>(input: R, handle: &ControlHandle, ringer: Option<&Ringer>) -> usize {
    let mut applied = 0;
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("CONSOLE | read failed: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ok = match (line, ringer) {
            ("ring", Some(ringer)) => ringer.ring(),
            ("ring", None) => {
                warn!("CONSOLE | no signaling backend to ring");
                false
            }
            _ => handle.execute(line),
        };
        if ok {
            applied += 1;
        }
    }
    debug!("CONSOLE | input closed");
    applied
}

/// Start the stdin reader thread.
pub fn spawn_stdin_console(
    handle: ControlHandle,
    ringer: Option<Ringer>,
) -> io::Result<JoinHandle<()>> {
    info!("CONSOLE | reading commands from stdin");
    thread::Builder::new().name("console".into()).spawn(move || {
        let stdin = io::stdin();
        run_console(stdin.lock(), &handle, ringer.as_ref());
    })
}
