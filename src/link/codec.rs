//! Marker-framed panel protocol.
//!
//! Inbound (panel → controller), one marker byte plus a fixed payload:
//! ```text
//! ┌────────┬──────────────────────┐
//! │ Marker │ Payload (fixed len)  │
//! └────────┴──────────────────────┘
//! ```
//!
//! | Marker | Event                      | Payload |
//! |--------|----------------------------|---------|
//! | `K`    | Keypad                     | 1       |
//! | `H`    | HookChange (`U`/`D`)       | 1       |
//! | `V`    | Coin (validator code)      | 1       |
//! | `C`    | Card                       | 16      |
//! | `E`    | EEPROM validation error    | 3       |
//! | `A`    | EEPROM upload start        | 0       |
//! | `B`    | EEPROM upload end          | 0       |
//! | `D`    | EEPROM validation start    | 0       |
//! | `F`    | EEPROM validation end      | 0       |
//! | `@`    | reserved, dropped          | -       |
//!
//! Bytes before the first marker are line noise and are discarded; this
//! is how the decoder resynchronises after a glitch.  A frame whose
//! payload has not fully arrived stays buffered until the next read.
//!
//! Outbound (controller → panel):
//! ```text
//! 0x02 <len> <len bytes>    display write
//! 0x03 <byte>               coin validator command
//! ```

use log::{debug, warn};

use crate::error::LinkError;
use crate::events::{CARD_NUMBER_LEN, CardNumber, Event, HookState};

/// Characters per display line.
pub const DISPLAY_WIDTH: usize = 20;

/// Rendered display payload: line 1, line feed, line 2.
pub const DISPLAY_FRAME_LEN: usize = DISPLAY_WIDTH * 2 + 1;

/// Outbound command byte: display write.
pub const CMD_DISPLAY: u8 = 0x02;

/// Outbound command byte: coin validator.
pub const CMD_COIN: u8 = 0x03;

/// Coin validator command bytes.
pub mod coin_cmd {
    /// Enable coin acceptance.
    pub const ACCEPT: u8 = b'a';
    /// Return escrowed coins.
    pub const RETURN: u8 = b'c';
    /// Refuse coins (line busy / ringing).
    pub const REJECT: u8 = b'f';
    /// Reset the validator.
    pub const RESET: u8 = b'z';
}

/// Payload length for a marker byte.  `Some(None)` is the reserved
/// marker, `None` is not a marker at all.
fn marker_payload_len(byte: u8) -> Option<Option<usize>> {
    match byte {
        b'K' | b'H' | b'V' => Some(Some(1)),
        b'C' => Some(Some(CARD_NUMBER_LEN)),
        b'E' => Some(Some(3)),
        b'A' | b'B' | b'D' | b'F' => Some(Some(0)),
        b'@' => Some(None),
        _ => None,
    }
}

/// Streaming frame decoder.
///
/// Holds at most one incomplete frame between calls; anything that can
/// never become part of a frame is dropped as soon as it is seen.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    noise_bytes: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the link.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Decode the next complete frame, if one is buffered.
    pub fn next_event(&mut self) -> Option<Event> {
        loop {
            let Some(start) = self
                .buf
                .iter()
                .position(|b| marker_payload_len(*b).is_some())
            else {
                self.discard(self.buf.len());
                return None;
            };
            self.discard(start);

            let marker = self.buf[0];
            let Some(Some(len)) = marker_payload_len(marker) else {
                warn!("Dropping reserved marker '{}'", marker as char);
                self.discard(1);
                continue;
            };

            if self.buf.len() < 1 + len {
                return None;
            }

            let event = decode_frame(marker, &self.buf[1..=len]);
            self.buf.drain(..=len);

            match event {
                Some(event) => return Some(event),
                None => warn!("Malformed '{}' frame dropped", marker as char),
            }
        }
    }

    /// Feed bytes and collect every event they complete, in order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Event> {
        self.push_bytes(data);
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Bytes currently held for an incomplete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes discarded as noise since construction.
    pub fn noise_bytes(&self) -> u64 {
        self.noise_bytes
    }

    /// Drop any partial frame (e.g. after the link reopens).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn discard(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        debug!("Discarding {} unframed byte(s)", count);
        self.noise_bytes += count as u64;
        self.buf.drain(..count);
    }
}

fn decode_frame(marker: u8, payload: &[u8]) -> Option<Event> {
    match marker {
        b'K' => match payload[0] {
            key @ (b'0'..=b'9' | b'*' | b'#') => Some(Event::Keypad(key as char)),
            _ => None,
        },
        b'H' => match payload[0] {
            b'U' => Some(Event::HookChange(HookState::Up)),
            b'D' => Some(Event::HookChange(HookState::Down)),
            _ => None,
        },
        b'V' => Some(Event::Coin(payload[0])),
        b'C' => {
            let text = core::str::from_utf8(payload).ok()?;
            let mut card = CardNumber::new();
            card.push_str(text).ok()?;
            Some(Event::Card(card))
        }
        b'E' => Some(Event::EepromValidationError {
            addr: payload[0],
            expected: payload[1],
            actual: payload[2],
        }),
        b'A' => Some(Event::EepromUploadStart),
        b'B' => Some(Event::EepromUploadEnd),
        b'D' => Some(Event::EepromValidationStart),
        b'F' => Some(Event::EepromValidationEnd),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Frame a display message as `[0x02][len][message]`.
pub fn encode_display(message: &[u8]) -> Result<Vec<u8>, LinkError> {
    let len = u8::try_from(message.len()).map_err(|_| LinkError::MessageTooLong(message.len()))?;
    let mut out = Vec::with_capacity(message.len() + 2);
    out.push(CMD_DISPLAY);
    out.push(len);
    out.extend_from_slice(message);
    Ok(out)
}

/// Frame a coin validator command as `[0x03][byte]`.
pub fn encode_coin_command(byte: u8) -> [u8; 2] {
    [CMD_COIN, byte]
}

/// Render two visible lines into the fixed display payload: each line
/// space-padded or truncated to [`DISPLAY_WIDTH`], non-ASCII shown as `?`.
pub fn render_display(line1: &str, line2: &str) -> [u8; DISPLAY_FRAME_LEN] {
    let mut out = [b' '; DISPLAY_FRAME_LEN];
    fill_line(&mut out[..DISPLAY_WIDTH], line1);
    out[DISPLAY_WIDTH] = 0x0A;
    fill_line(&mut out[DISPLAY_WIDTH + 1..], line2);
    out
}

fn fill_line(dst: &mut [u8], text: &str) {
    for (slot, ch) in dst.iter_mut().zip(text.chars()) {
        *slot = if ch.is_ascii() && !ch.is_ascii_control() { ch as u8 } else { b'?' };
    }
}
