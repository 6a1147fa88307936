//! Application core: domain logic behind port traits.
//!
//! The payphone rules live here: the controller that sequences decode,
//! dispatch and tick, the control-surface bridge, and the structured
//! events the core emits.  Everything physical goes through the traits
//! in [`ports`], so the whole layer is testable without a panel.

pub mod commands;
pub mod control;
pub mod events;
pub mod ports;
pub mod service;
