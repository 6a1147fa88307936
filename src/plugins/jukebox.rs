//! Jukebox: coin-operated music player.
//!
//! Keys `1`-`9` buy and play a song, `*` stops it, `#` brings the menu
//! back for a moment.  Playback ends by itself once the song's length has
//! elapsed.

use std::time::{Duration, Instant};

use log::info;

use super::{Plugin, PluginContext};
use crate::display::DisplayText;
use crate::events::HookState;
use crate::fsm::PhoneState;
use crate::fsm::context::DaemonState;

pub const NAME: &str = "Jukebox";

/// How long `#` keeps the menu over the song title.
const MENU_PEEK: Duration = Duration::from_secs(3);

pub struct Song {
    pub title: &'static str,
    pub artist: &'static str,
    pub duration_secs: u64,
}

pub const SONGS: [Song; 9] = [
    Song { title: "Bohemian Rhapsody", artist: "Queen", duration_secs: 355 },
    Song { title: "Hotel California", artist: "Eagles", duration_secs: 391 },
    Song { title: "Stairway to Heaven", artist: "Led Zeppelin", duration_secs: 482 },
    Song { title: "Sweet Child O Mine", artist: "Guns N Roses", duration_secs: 356 },
    Song { title: "Imagine", artist: "John Lennon", duration_secs: 183 },
    Song { title: "Billie Jean", artist: "Michael Jackson", duration_secs: 294 },
    Song { title: "Like a Rolling Stone", artist: "Bob Dylan", duration_secs: 366 },
    Song { title: "Smells Like Teen Spirit", artist: "Nirvana", duration_secs: 301 },
    Song { title: "What's Going On", artist: "Marvin Gaye", duration_secs: 233 },
];

struct Playing {
    song: usize,
    ends: Instant,
}

pub struct Jukebox {
    cost_cents: u32,
    playing: Option<Playing>,
    menu_until: Option<Instant>,
}

impl Jukebox {
    pub fn new(cost_cents: u32) -> Self {
        Self {
            cost_cents,
            playing: None,
            menu_until: None,
        }
    }

    /// Index into [`SONGS`] of the song playing now.
    pub fn now_playing(&self) -> Option<usize> {
        self.playing.as_ref().map(|p| p.song)
    }

    fn stop(&mut self, reason: &str) {
        if let Some(p) = self.playing.take() {
            info!("JUKEBOX | {} stopped ({})", SONGS[p.song].title, reason);
        }
        self.menu_until = None;
    }

    fn menu(&self, credit: u32) -> DisplayText {
        if credit >= self.cost_cents {
            DisplayText::new("Select Song", "1-9 Keys")
        } else {
            DisplayText::new("JUKEBOX", format!("Insert {} cents", self.cost_cents))
        }
    }
}

impl Plugin for Jukebox {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Coin-operated music player"
    }

    fn on_activate(&mut self, _ctx: &mut PluginContext<'_>) {
        self.playing = None;
        self.menu_until = None;
    }

    fn on_deactivate(&mut self, _ctx: &mut PluginContext<'_>) {
        self.stop("plugin switched");
    }

    fn on_coin(&mut self, ctx: &mut PluginContext<'_>, _cents: u32) {
        ctx.ports.audio.coin_chime();
    }

    fn on_keypad(&mut self, ctx: &mut PluginContext<'_>, key: char) {
        ctx.clear_keypad();
        if self.playing.is_some() {
            match key {
                '*' => self.stop("stopped by caller"),
                '#' => self.menu_until = Some(ctx.now + MENU_PEEK),
                _ => {}
            }
            return;
        }
        if ctx.phone_state() != PhoneState::IdleUp {
            return;
        }
        let Some(song) = key
            .to_digit(10)
            .and_then(|d| (d as usize).checked_sub(1))
            .filter(|&i| i < SONGS.len())
        else {
            return;
        };
        if ctx.credit() < self.cost_cents {
            return;
        }

        ctx.take_cents(self.cost_cents);
        let track = &SONGS[song];
        info!("JUKEBOX | playing {} by {}", track.title, track.artist);
        self.playing = Some(Playing {
            song,
            ends: ctx.now + Duration::from_secs(track.duration_secs),
        });
        self.menu_until = None;
    }

    fn on_hook(&mut self, _ctx: &mut PluginContext<'_>, hook: HookState) {
        if hook == HookState::Down {
            self.stop("receiver replaced");
        }
    }

    fn on_tick(&mut self, ctx: &mut PluginContext<'_>) {
        if self.menu_until.is_some_and(|t| ctx.now >= t) {
            self.menu_until = None;
        }
        if self.playing.as_ref().is_some_and(|p| ctx.now >= p.ends) {
            self.stop("finished");
        }
    }

    fn display_text(&self, state: &DaemonState, now: Instant) -> DisplayText {
        let peeking = self.menu_until.is_some_and(|t| now < t);
        match &self.playing {
            Some(p) if !peeking => {
                let song = &SONGS[p.song];
                DisplayText::new(song.title, song.artist)
            }
            _ => self.menu(state.inserted_cents),
        }
    }
}
