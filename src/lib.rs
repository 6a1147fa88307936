//! Millennium payphone controller library.
//!
//! Exposes every module for the integration tests, the property tests
//! and the fuzz target.  The daemon binary in `main.rs` wires the
//! adapters to the [`app::service::DaemonController`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod display;
pub mod error;
pub mod events;
pub mod fsm;
pub mod link;
pub mod persistence;
pub mod plugins;
