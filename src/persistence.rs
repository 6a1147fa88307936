//! Durable snapshot of the daemon state.
//!
//! File format, one `key=value` per line:
//! ```text
//! inserted_cents=25
//! last_state=2
//! active_plugin=Classic Phone
//! ```
//!
//! `save` writes a sibling `<path>.tmp`, flushes (and optionally fsyncs)
//! it, then renames it over `path`, so a reader sees either the old file
//! or the new one.  `load` is all-or-nothing: a missing file, a missing
//! key or a value that does not parse yields `None`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::PersistError;
use crate::fsm::PhoneState;

/// What survives a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedState {
    pub inserted_cents: u32,
    pub last_state: PhoneState,
    pub active_plugin: String,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Atomically replace the snapshot at `path`.
pub fn save(state: &PersistedState, path: &Path, fsync: bool) -> Result<(), PersistError> {
    if !storable(&state.active_plugin) {
        return Err(PersistError::InvalidValue("active_plugin"));
    }
    let tmp = temp_path(path);

    let written = write_snapshot(&tmp, state, fsync);

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::Write(e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        warn!("Failed to rename {} over {}", tmp.display(), path.display());
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::Rename(e));
    }

    debug!("State saved to {}", path.display());
    Ok(())
}

/// Values are read back trimmed, one per line.
fn storable(value: &str) -> bool {
    !value.is_empty() && value.trim() == value && !value.contains(['\n', '\r'])
}

fn write_snapshot(tmp: &Path, state: &PersistedState, fsync: bool) -> std::io::Result<()> {
    let mut f = File::create(tmp)?;
    writeln!(f, "inserted_cents={}", state.inserted_cents)?;
    writeln!(f, "last_state={}", state.last_state.ordinal())?;
    writeln!(f, "active_plugin={}", state.active_plugin)?;
    f.flush()?;
    if fsync {
        f.sync_all()?;
    }
    Ok(())
}

/// Read the snapshot at `path`; `None` if absent or unreadable.
pub fn load(path: &Path) -> Option<PersistedState> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            debug!("No state at {}: {}", path.display(), e);
            return None;
        }
    };

    let parsed = parse(&text);
    if parsed.is_none() {
        warn!("Ignoring unparseable state file {}", path.display());
    }
    parsed
}

/// Parse the key=value body.  Unknown keys are skipped.
pub fn parse(text: &str) -> Option<PersistedState> {
    let mut cents = None;
    let mut last_state = None;
    let mut plugin = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=')?;
        match key.trim() {
            "inserted_cents" => cents = Some(value.trim().parse::<u32>().ok()?),
            "last_state" => {
                let ordinal = value.trim().parse::<u8>().ok()?;
                last_state = Some(PhoneState::from_ordinal(ordinal)?);
            }
            "active_plugin" => plugin = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Some(PersistedState {
        inserted_cents: cents?,
        last_state: last_state?,
        active_plugin: plugin?,
    })
}
