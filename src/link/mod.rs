//! Serial link to the payphone panel.
//!
//! The panel (keypad, hook switch, coin validator, card reader and the
//! two-line display) hangs off one USB serial port.  [`codec`] turns the
//! inbound byte stream into [`Event`](crate::events::Event)s and frames
//! the outbound display/coin commands; [`transport`] is the byte pipe.

pub mod codec;
pub mod transport;
