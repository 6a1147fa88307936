//! Two-line display model with marquee scrolling and write debouncing.
//!
//! ```text
//!  set_text ──▶ ┌──────────────────┐  tick (scroll step)
//!               │  DisplayManager  │◀──────────────────
//!               │  line1 · line2   │
//!               └────────┬─────────┘
//!                        │ flush: dirty && ≥ refresh interval
//!                        ▼
//!                   DisplayPort
//! ```
//!
//! Lines wider than the panel scroll one character per step, with a
//! three-space gap before the text wraps round.  Setting the same text
//! twice changes nothing (no scroll reset, no write), and however many
//! changes land inside one refresh interval only the last is written.

use std::time::{Duration, Instant};

use crate::app::ports::DisplayPort;
use crate::link::codec::DISPLAY_WIDTH;

/// Blank columns between the end of a scrolling line and its restart.
pub const SCROLL_GAP: usize = 3;

/// Text a plugin wants on the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayText {
    pub line1: String,
    pub line2: String,
}

impl DisplayText {
    pub fn new(line1: impl Into<String>, line2: impl Into<String>) -> Self {
        Self {
            line1: line1.into(),
            line2: line2.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// One line
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScrollLine {
    chars: Vec<char>,
    pos: usize,
}

impl ScrollLine {
    fn set(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.pos = 0;
    }

    fn matches(&self, text: &str) -> bool {
        self.chars.iter().copied().eq(text.chars())
    }

    fn scrolling(&self) -> bool {
        self.chars.len() > DISPLAY_WIDTH
    }

    fn advance(&mut self) {
        if self.scrolling() {
            self.pos = (self.pos + 1) % (self.chars.len() + SCROLL_GAP);
        }
    }

    fn visible(&self) -> String {
        if !self.scrolling() {
            return self.chars.iter().collect();
        }
        let period = self.chars.len() + SCROLL_GAP;
        (0..DISPLAY_WIDTH)
            .map(|i| {
                let idx = (self.pos + i) % period;
                self.chars.get(idx).copied().unwrap_or(' ')
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// DisplayManager
// ---------------------------------------------------------------------------

pub struct DisplayManager {
    line1: ScrollLine,
    line2: ScrollLine,
    dirty: bool,
    refresh_interval: Duration,
    scroll_interval: Duration,
    last_write: Option<Instant>,
    last_scroll: Option<Instant>,
    last_sent: Option<(String, String)>,
    writes: u64,
}

impl DisplayManager {
    pub fn new(refresh_interval: Duration, scroll_interval: Duration) -> Self {
        Self {
            line1: ScrollLine::default(),
            line2: ScrollLine::default(),
            dirty: false,
            refresh_interval,
            scroll_interval,
            last_write: None,
            last_scroll: None,
            last_sent: None,
            writes: 0,
        }
    }

    /// Replace the text.  Identical text is a no-op.
    pub fn set_text(&mut self, line1: &str, line2: &str) {
        if self.line1.matches(line1) && self.line2.matches(line2) {
            return;
        }
        self.line1.set(line1);
        self.line2.set(line2);
        self.last_scroll = None;
        self.dirty = true;
    }

    pub fn show(&mut self, text: &DisplayText) {
        self.set_text(&text.line1, &text.line2);
    }

    /// Advance scrolling lines by one step per scroll interval.
    pub fn tick(&mut self, now: Instant) {
        if !self.line1.scrolling() && !self.line2.scrolling() {
            return;
        }
        let anchor = *self.last_scroll.get_or_insert(now);
        if now.saturating_duration_since(anchor) >= self.scroll_interval {
            self.line1.advance();
            self.line2.advance();
            self.last_scroll = Some(now);
            self.dirty = true;
        }
    }

    /// Write to the panel if something changed and the refresh interval
    /// has elapsed.  Returns `true` when a physical write happened.
    pub fn flush<P: DisplayPort + ?Sized>(&mut self, now: Instant, port: &mut P) -> bool {
        if !self.dirty {
            return false;
        }
        if let Some(last) = self.last_write {
            if now.saturating_duration_since(last) < self.refresh_interval {
                return false;
            }
        }

        let visible = self.visible();
        self.dirty = false;
        if self.last_sent.as_ref() == Some(&visible) {
            return false;
        }

        port.write(&visible.0, &visible.1);
        self.last_write = Some(now);
        self.last_sent = Some(visible);
        self.writes += 1;
        true
    }

    /// Force the next flush to write even if the text is unchanged.
    pub fn invalidate(&mut self) {
        self.last_sent = None;
        self.dirty = true;
    }

    /// What the panel shows right now (each line at most 20 chars).
    pub fn visible(&self) -> (String, String) {
        (self.line1.visible(), self.line2.visible())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Physical writes so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

/// Format a partial number as `(XXX) XXX-XXXX`, unfilled positions `_`.
pub fn format_number(digits: &str) -> String {
    const TEMPLATE: &str = "(___) ___-____";
    let mut digits = digits.chars().filter(char::is_ascii_digit);
    TEMPLATE
        .chars()
        .map(|c| match c {
            '_' => digits.next().unwrap_or('_'),
            other => other,
        })
        .collect()
}
