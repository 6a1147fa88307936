//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.  Every section
//! of [`SystemConfig`] is optional in the file; missing keys take their
//! defaults.
//!
//! # Validation
//!
//! All fields are range-checked on load and before saving.  Out-of-range
//! values are rejected, never clamped.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use crate::events::CARD_NUMBER_LEN;
use crate::fsm::context::KEYPAD_CAPACITY;

/// Baud rates the panel firmware can be built for.
const BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115_200];

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

pub struct JsonConfigAdapter {
    path: PathBuf,
}

impl JsonConfigAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Range-check every field.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !BAUD_RATES.contains(&cfg.serial.baud_rate) {
        return Err(ConfigError::ValidationFailed(
            "serial.baud_rate must be a standard rate 1200–115200",
        ));
    }
    if !(1..=1000).contains(&cfg.serial.write_retry_limit) {
        return Err(ConfigError::ValidationFailed(
            "serial.write_retry_limit must be 1–1000",
        ));
    }
    if cfg.serial.write_retry_sleep_us > 100_000 {
        return Err(ConfigError::ValidationFailed(
            "serial.write_retry_sleep_us must be at most 100000",
        ));
    }
    if !(1..=10_000).contains(&cfg.call.cost_cents) {
        return Err(ConfigError::ValidationFailed(
            "call.cost_cents must be 1–10000",
        ));
    }
    if !(1..=86_400).contains(&cfg.call.timeout_secs) {
        return Err(ConfigError::ValidationFailed(
            "call.timeout_secs must be 1–86400",
        ));
    }
    if cfg.call.warning_secs >= cfg.call.timeout_secs {
        return Err(ConfigError::ValidationFailed(
            "call.warning_secs must be < call.timeout_secs",
        ));
    }
    let number_ok =
        |n: &String| !n.is_empty() && n.len() <= KEYPAD_CAPACITY && n.bytes().all(|b| b.is_ascii_digit());
    if !cfg.call.free_numbers.iter().all(number_ok) {
        return Err(ConfigError::ValidationFailed(
            "call.free_numbers entries must be 1–10 digits",
        ));
    }
    let card_ok = |c: &String| c.len() == CARD_NUMBER_LEN && c.is_ascii();
    if !cfg.cards.free_cards.iter().chain(&cfg.cards.admin_cards).all(card_ok) {
        return Err(ConfigError::ValidationFailed(
            "cards entries must be 16 ASCII characters",
        ));
    }
    if !(1..=1000).contains(&cfg.display.refresh_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "display.refresh_interval_ms must be 1–1000",
        ));
    }
    if !(50..=5000).contains(&cfg.display.scroll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "display.scroll_interval_ms must be 50–5000",
        ));
    }
    if cfg.plugins.default.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "plugins.default must name a plugin",
        ));
    }
    if cfg.system.poll_interval_ms > 100 {
        return Err(ConfigError::ValidationFailed(
            "system.poll_interval_ms must be 0–100",
        ));
    }
    if cfg.system.stats_interval_secs == 0 {
        return Err(ConfigError::ValidationFailed(
            "system.stats_interval_secs must be > 0",
        ));
    }
    if !LOG_LEVELS.contains(&cfg.logging.level.as_str()) {
        return Err(ConfigError::ValidationFailed(
            "logging.level must be off, error, warn, info, debug or trace",
        ));
    }
    Ok(())
}

impl ConfigPort for JsonConfigAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", self.path.display());
                return Ok(SystemConfig::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let cfg: SystemConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        validate_config(&cfg)?;
        info!("Loaded config from {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Corrupted(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let written = fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(json.as_bytes())?;
            f.write_all(b"\n")?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::Io(e));
        }
        info!("Config saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(validate_config(&SystemConfig::default()).is_ok());
    }

    #[test]
    fn rejects_zero_call_cost() {
        let mut cfg = SystemConfig::default();
        cfg.call.cost_cents = 0;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_warning_longer_than_timeout() {
        let mut cfg = SystemConfig::default();
        cfg.call.timeout_secs = 30;
        cfg.call.warning_secs = 60;
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_non_digit_free_number() {
        let mut cfg = SystemConfig::default();
        cfg.call.free_numbers.push("91a".into());
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_odd_baud_rate() {
        let mut cfg = SystemConfig::default();
        cfg.serial.baud_rate = 9601;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonConfigAdapter::new(dir.path().join("absent.json"));
        assert_eq!(adapter.load().unwrap(), SystemConfig::default());
    }

    #[test]
    fn malformed_file_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonConfigAdapter::new(&path).load(),
            Err(ConfigError::Corrupted(_))
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonConfigAdapter::new(dir.path().join("millennium.json"));
        let mut cfg = SystemConfig::default();
        cfg.call.cost_cents = 35;
        cfg.plugins.default = "Jukebox".into();
        adapter.save(&cfg).unwrap();
        assert_eq!(adapter.load().unwrap(), cfg);
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonConfigAdapter::new(dir.path().join("millennium.json"));
        let mut cfg = SystemConfig::default();
        cfg.display.refresh_interval_ms = 0;
        assert!(adapter.save(&cfg).is_err());
        assert!(!adapter.path().exists());
    }
}
