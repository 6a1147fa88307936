//! Handset audio feedback.
//!
//! No sound device on the host build: tones are logged and the current
//! tone is tracked so a hang-up can be seen to silence it.

use log::debug;

use crate::app::ports::AudioFeedback;

/// Tone currently "playing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// 350 Hz + 440 Hz, continuous until stopped.
    Dial,
    /// ~150 ms DTMF pair for one key.
    Dtmf(char),
    /// ~200 ms coin-deposit chime.
    Coin,
}

#[derive(Debug, Default)]
pub struct LogAudio {
    playing: Option<Tone>,
}

impl LogAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing(&self) -> Option<Tone> {
        self.playing
    }

    fn play(&mut self, tone: Tone) {
        debug!("AUDIO | {:?}", tone);
        self.playing = Some(tone);
    }
}

impl AudioFeedback for LogAudio {
    fn dial_tone(&mut self) {
        self.play(Tone::Dial);
    }

    fn dtmf(&mut self, key: char) {
        self.play(Tone::Dtmf(key));
    }

    fn coin_chime(&mut self) {
        self.play(Tone::Coin);
    }

    fn stop(&mut self) {
        if self.playing.take().is_some() {
            debug!("AUDIO | stop");
        }
    }
}
