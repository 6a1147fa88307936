//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences from the panel link into the frame
//! decoder, whole and split at every offset, and asserts that both
//! paths decode the same events and never hold more than one partial
//! frame.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use millennium::link::codec::FrameDecoder;

/// Marker byte plus the longest payload (a card number).
const MAX_PENDING: usize = 17;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    let whole = decoder.feed(data);
    assert!(decoder.pending() < MAX_PENDING, "decoder held more than one frame");

    let mut split = FrameDecoder::new();
    let mut events = Vec::new();
    for byte in data {
        events.extend(split.feed(core::slice::from_ref(byte)));
    }
    assert_eq!(events, whole, "byte-at-a-time decoding diverged");

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    assert_eq!(decoder.pending(), 0);
    let _ = decoder.feed(data);
});
