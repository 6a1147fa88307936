//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  Everything runs on the host with no panel
//! or signaling backend attached.

mod control_tests;
mod mock_hw;
mod persistence_tests;
mod scenario_tests;
