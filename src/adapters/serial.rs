//! USB serial tty to the payphone panel.
//!
//! The device is opened in raw 8N1 mode with no flow control and a zero
//! timeout.  Reads return 0 when nothing is waiting.  Writes retry
//! on would-block up to `serial.write_retry_limit` times, sleeping
//! `serial.write_retry_sleep_us` between attempts; past that the frame
//! is abandoned.
//!
//! The one link implements [`Transport`] for the poll phase and both
//! panel output ports (coin validator and display).

use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::app::ports::{CoinValidatorPort, DisplayPort};
use crate::config::SerialConfig;
use crate::error::LinkError;
use crate::link::codec::{encode_coin_command, encode_display, render_display};
use crate::link::transport::Transport;

pub struct SerialLink {
    port: Box<dyn SerialPort>,
    retry_limit: u32,
    retry_sleep: Duration,
    abandoned: u64,
}

/// A zero-timeout port reports "nothing ready" as either kind.
fn not_ready(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

impl SerialLink {
    /// Open and configure the tty.
    pub fn open(path: &Path, config: &SerialConfig) -> Result<Self, LinkError> {
        let port = serialport::new(path.to_string_lossy(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|e| LinkError::Open(io::Error::from(e)))?;
        if let Err(e) = port.clear(serialport::ClearBuffer::All) {
            debug!("Serial: could not flush {}: {}", path.display(), e);
        }
        info!(
            "Serial link open: {} @ {} baud 8N1",
            path.display(),
            config.baud_rate
        );
        Ok(Self {
            port,
            retry_limit: config.write_retry_limit,
            retry_sleep: Duration::from_micros(config.write_retry_sleep_us),
            abandoned: 0,
        })
    }

    /// Frames given up on since open.
    pub fn abandoned_writes(&self) -> u64 {
        self.abandoned
    }

    /// Fire-and-forget write used by the panel ports.
    fn send(&mut self, what: &str, frame: &[u8]) {
        match self.write_all(frame) {
            Ok(()) => debug!("Serial: {} ({} bytes)", what, frame.len()),
            Err(e @ LinkError::RetriesExhausted { .. }) => {
                self.abandoned += 1;
                warn!("Serial: {} dropped: {}", what, e);
            }
            Err(e) => {
                self.abandoned += 1;
                error!("Serial: {} failed: {}", what, e);
            }
        }
    }
}

impl Transport for SerialLink {
    type Error = LinkError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        loop {
            match self.port.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if not_ready(&e) => return Ok(0),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(LinkError::Io(e)),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut written = 0;
        let mut retries = 0;
        while written < data.len() {
            match self.port.write(&data[written..]) {
                Ok(0) => {
                    return Err(LinkError::Io(io::Error::from(io::ErrorKind::WriteZero)));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if not_ready(&e) => {
                    retries += 1;
                    if retries > self.retry_limit {
                        return Err(LinkError::RetriesExhausted {
                            written,
                            total: data.len(),
                        });
                    }
                    thread::sleep(self.retry_sleep);
                }
                Err(e) => return Err(LinkError::Io(e)),
            }
        }
        Ok(())
    }
}

impl CoinValidatorPort for SerialLink {
    fn write(&mut self, command: u8) {
        let frame = encode_coin_command(command);
        self.send("coin command", &frame);
    }
}

impl DisplayPort for SerialLink {
    fn write(&mut self, line1: &str, line2: &str) {
        match encode_display(&render_display(line1, line2)) {
            Ok(frame) => self.send("display", &frame),
            Err(e) => error!("Serial: display frame rejected: {}", e),
        }
    }
}
