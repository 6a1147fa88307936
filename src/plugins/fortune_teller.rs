//! Fortune Teller: pay, pick a category, receive a fortune.
//!
//! ```text
//!  Waiting ──key 1-5 (paid)──▶ Reading (2 s) ──▶ Showing (6 s) ──▶ Waiting
//! ```

use std::time::{Duration, Instant};

use log::info;
use rand::Rng;

use super::{Plugin, PluginContext};
use crate::display::DisplayText;
use crate::events::HookState;
use crate::fsm::PhoneState;
use crate::fsm::context::DaemonState;

pub const NAME: &str = "Fortune Teller";

const READING_TIME: Duration = Duration::from_secs(2);
const SHOW_TIME: Duration = Duration::from_secs(6);

const CATEGORIES: [&str; 5] = ["Love", "Career", "Health", "Money", "General"];

const FORTUNES: [[&str; 4]; 5] = [
    [
        "A new romance will blossom soon",
        "Your heart will find its match",
        "Love is written in the stars for you",
        "A special someone is thinking of you",
    ],
    [
        "Great success awaits in your work",
        "A promotion is on the horizon",
        "Your talents will be recognized",
        "New opportunities will present themselves",
    ],
    [
        "Your vitality will increase",
        "Good health will be your companion",
        "Energy and strength will return",
        "Wellness is your destiny",
    ],
    [
        "Financial abundance is coming",
        "Your investments will prosper",
        "Money will flow to you easily",
        "Wealth and security await",
    ],
    [
        "Good fortune follows you",
        "Your path is blessed with luck",
        "Positive changes are coming",
        "The universe smiles upon you",
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Reading { category: usize, until: Instant },
    Showing { category: usize, fortune: usize, until: Instant },
}

pub struct FortuneTeller {
    cost_cents: u32,
    phase: Phase,
}

impl FortuneTeller {
    pub fn new(cost_cents: u32) -> Self {
        Self {
            cost_cents,
            phase: Phase::Waiting,
        }
    }

    /// The fortune currently on show, if any.
    pub fn current_fortune(&self) -> Option<(&'static str, &'static str)> {
        match self.phase {
            Phase::Showing {
                category, fortune, ..
            } => Some((CATEGORIES[category], FORTUNES[category][fortune])),
            _ => None,
        }
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.phase, Phase::Reading { .. })
    }
}

impl Plugin for FortuneTeller {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Mystical fortune telling experience"
    }

    fn on_activate(&mut self, _ctx: &mut PluginContext<'_>) {
        self.phase = Phase::Waiting;
    }

    fn on_deactivate(&mut self, _ctx: &mut PluginContext<'_>) {
        self.phase = Phase::Waiting;
    }

    fn on_coin(&mut self, ctx: &mut PluginContext<'_>, _cents: u32) {
        ctx.ports.audio.coin_chime();
    }

    fn on_keypad(&mut self, ctx: &mut PluginContext<'_>, key: char) {
        // Digits only drive the menu here; never let them pile up.
        ctx.clear_keypad();
        if self.phase != Phase::Waiting || ctx.phone_state() != PhoneState::IdleUp {
            return;
        }
        let Some(category) = key.to_digit(10).filter(|d| (1..=5).contains(d)) else {
            return;
        };
        if ctx.credit() < self.cost_cents {
            return;
        }

        ctx.take_cents(self.cost_cents);
        ctx.ports.audio.dtmf(key);
        let category = (category - 1) as usize;
        info!("FORTUNE | reading {}", CATEGORIES[category]);
        self.phase = Phase::Reading {
            category,
            until: ctx.now + READING_TIME,
        };
    }

    fn on_hook(&mut self, _ctx: &mut PluginContext<'_>, _hook: HookState) {
        self.phase = Phase::Waiting;
    }

    fn on_tick(&mut self, ctx: &mut PluginContext<'_>) {
        match self.phase {
            Phase::Reading { category, until } if ctx.now >= until => {
                let fortune = rand::rng().random_range(0..FORTUNES[category].len());
                info!(
                    "FORTUNE | {} - {}",
                    CATEGORIES[category], FORTUNES[category][fortune]
                );
                self.phase = Phase::Showing {
                    category,
                    fortune,
                    until: ctx.now + SHOW_TIME,
                };
            }
            Phase::Showing { until, .. } if ctx.now >= until => {
                self.phase = Phase::Waiting;
            }
            _ => {}
        }
    }

    fn display_text(&self, state: &DaemonState, _now: Instant) -> DisplayText {
        match self.phase {
            Phase::Reading { .. } => DisplayText::new("Reading", "Crystal..."),
            Phase::Showing {
                category, fortune, ..
            } => DisplayText::new(CATEGORIES[category], FORTUNES[category][fortune]),
            Phase::Waiting => {
                let credit = state.inserted_cents;
                if credit >= self.cost_cents {
                    DisplayText::new("Choose Fortune", "1-5 Keys")
                } else if credit > 0 {
                    DisplayText::new(
                        format!("Have: {}c", credit),
                        format!("Need: {}c", self.cost_cents - credit),
                    )
                } else {
                    DisplayText::new(format!("Insert {}c", self.cost_cents), "for your fortune")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{Rig, lifted};

    #[test]
    fn welcome_then_menu_once_paid() {
        let now = Instant::now();
        let ft = FortuneTeller::new(25);
        let mut st = DaemonState::new(now);
        st.current_state = PhoneState::IdleUp;
        assert_eq!(
            ft.display_text(&st, now),
            DisplayText::new("Insert 25c", "for your fortune")
        );
        st.add_cents(10);
        assert_eq!(
            ft.display_text(&st, now),
            DisplayText::new("Have: 10c", "Need: 15c")
        );
        st.add_cents(15);
        assert_eq!(
            ft.display_text(&st, now),
            DisplayText::new("Choose Fortune", "1-5 Keys")
        );
    }

    #[test]
    fn unpaid_key_does_nothing() {
        let now = Instant::now();
        let mut rig = Rig::default();
        let state = lifted(10, now);
        let mut ft = FortuneTeller::new(25);
        ft.on_keypad(&mut rig.ctx(&state, now), '1');
        assert!(!ft.is_reading());
        assert_eq!(state.lock().inserted_cents, 10);
    }

    #[test]
    fn paid_reading_shows_a_fortune_from_the_category() {
        let now = Instant::now();
        let mut rig = Rig::default();
        let state = lifted(30, now);
        let mut ft = FortuneTeller::new(25);

        state.lock().push_digit('2');
        ft.on_keypad(&mut rig.ctx(&state, now), '2');
        assert!(ft.is_reading());
        assert_eq!(state.lock().inserted_cents, 5);
        assert_eq!(state.lock().keypad(), "");

        ft.on_tick(&mut rig.ctx(&state, now + Duration::from_secs(1)));
        assert!(ft.is_reading());

        ft.on_tick(&mut rig.ctx(&state, now + READING_TIME));
        let (category, fortune) = ft.current_fortune().unwrap();
        assert_eq!(category, "Career");
        assert!(FORTUNES[1].contains(&fortune));

        ft.on_tick(&mut rig.ctx(&state, now + READING_TIME + SHOW_TIME));
        assert_eq!(ft.current_fortune(), None);
    }

    #[test]
    fn out_of_range_key_is_ignored() {
        let now = Instant::now();
        let mut rig = Rig::default();
        let state = lifted(25, now);
        let mut ft = FortuneTeller::new(25);
        ft.on_keypad(&mut rig.ctx(&state, now), '7');
        ft.on_keypad(&mut rig.ctx(&state, now), '*');
        assert!(!ft.is_reading());
        assert_eq!(state.lock().inserted_cents, 25);
    }
}
