//! Transport abstraction: the byte pipe to the panel.
//!
//! Concrete implementations:
//! - USB serial tty ([`SerialLink`](crate::adapters::serial::SerialLink))
//! - Scripted in-memory links in tests
//!
//! - [`NullTransport`] when no panel is attached
//!
//! The controller's poll phase is generic over `Transport`, so a replayed
//! capture or a pty can stand in for the real panel.

/// Non-blocking byte-oriented channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Display;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available; never blocks.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write all of `data`, retrying briefly on would-block.
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// A transport that never produces input and swallows every write.
/// Used when the panel is absent (bench runs driven by web control).
pub struct NullTransport;

impl Transport for NullTransport {
    type Error = core::convert::Infallible;

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn write_all(&mut self, _data: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl crate::app::ports::CoinValidatorPort for NullTransport {
    fn write(&mut self, command: u8) {
        log::debug!("NullTransport: coin command {:?}", command as char);
    }
}

impl crate::app::ports::DisplayPort for NullTransport {
    fn write(&mut self, line1: &str, line2: &str) {
        log::debug!("NullTransport: display [{}] [{}]", line1, line2);
    }
}
