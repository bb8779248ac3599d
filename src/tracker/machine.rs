//! Keyboard event state machine
//!
//! Records the most recent key-down and, in combination mode, the ordered set
//! of held keys. The release action is guarded by a two-state latch so it
//! fires at most once per press cycle.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{Config, DisplayMode};
use crate::events::KeyTransition;
use crate::keys::{format_decimal, format_friendly, format_hex, KeyEvent, KeyNamer};

/// Release action latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseAction {
    /// A press cycle is open; the next qualifying key-up fires the action
    #[default]
    Armed,
    /// Already fired this cycle; only a key-down re-arms it
    Fired,
}

impl std::fmt::Display for ReleaseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseAction::Armed => write!(f, "Armed"),
            ReleaseAction::Fired => write!(f, "Fired"),
        }
    }
}

/// Per-measure key tracking state
pub struct Tracker {
    config: Config,
    /// Most recent key-down code, 0 when none or cleared
    last_key_code: u32,
    last_key_event: Option<KeyEvent>,
    /// Held keys in press order; only used in combination mode
    pressed: Vec<KeyEvent>,
    /// Last non-empty rendered combination
    last_combination: String,
    release: ReleaseAction,
    namer: Arc<dyn KeyNamer>,
}

impl Tracker {
    /// Create a tracker with the given configuration and key namer
    pub fn new(config: Config, namer: Arc<dyn KeyNamer>) -> Self {
        Self {
            config,
            last_key_code: 0,
            last_key_event: None,
            pressed: Vec::new(),
            last_combination: String::new(),
            release: ReleaseAction::Armed,
            namer,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current release latch state
    pub fn release_state(&self) -> ReleaseAction {
        self.release
    }

    /// Virtual key codes currently held, in press order
    pub fn pressed_keys(&self) -> Vec<u32> {
        self.pressed.iter().map(|e| e.vk_code).collect()
    }

    fn is_combination(&self) -> bool {
        self.config.display_mode == DisplayMode::Combination
    }

    /// Apply a transition, returning the release action to execute, if any
    pub fn apply(&mut self, transition: KeyTransition) -> Option<String> {
        match transition {
            KeyTransition::KeyDown(event) => {
                self.on_key_down(event);
                None
            }
            KeyTransition::KeyUp(event) => self.on_key_up(event),
        }
    }

    /// Record a key-down and open a new press cycle
    pub fn on_key_down(&mut self, event: KeyEvent) {
        trace!(vk_code = event.vk_code, "key down");

        self.last_key_code = event.vk_code;
        self.last_key_event = Some(event);
        self.release = ReleaseAction::Armed;

        if self.is_combination() {
            self.pressed.retain(|held| held.vk_code != event.vk_code);
            self.pressed.push(event);
        }
    }

    /// Record a key-up; returns the release action if it fires now
    ///
    /// In combination mode the action fires once all held keys are released.
    /// In every other mode it fires on the first key-up of the press cycle.
    pub fn on_key_up(&mut self, event: KeyEvent) -> Option<String> {
        trace!(vk_code = event.vk_code, "key up");

        if self.is_combination() {
            self.pressed.retain(|held| held.vk_code != event.vk_code);
            if !self.pressed.is_empty() {
                return None;
            }
        }

        self.fire_release()
    }

    fn fire_release(&mut self) -> Option<String> {
        if self.release == ReleaseAction::Fired || self.config.on_release_action.is_empty() {
            return None;
        }

        self.release = ReleaseAction::Fired;
        debug!(action = %self.config.on_release_action, "release action fired");
        Some(self.config.on_release_action.clone())
    }

    /// The numeric measure value: last key-down code, or 0
    pub fn numeric_value(&self) -> f64 {
        f64::from(self.last_key_code)
    }

    /// Render the current state as text
    ///
    /// Outside combination mode this is a read-and-clear when
    /// `clear_on_read` is set.
    pub fn display_string(&mut self) -> String {
        if self.is_combination() {
            return self.combination_string();
        }

        if self.last_key_code == 0 {
            return String::new();
        }

        let code = self.last_key_code;
        let text = match self.config.display_mode {
            DisplayMode::Decimal => format_decimal(code),
            DisplayMode::Hex => format_hex(code),
            _ => {
                let event = self.last_key_event.unwrap_or_else(|| KeyEvent::from_vk(code));
                format_friendly(&event, self.namer.as_ref())
            }
        };

        if self.config.clear_on_read {
            self.last_key_code = 0;
        }

        text
    }

    fn combination_string(&mut self) -> String {
        if self.pressed.is_empty() {
            if !self.config.clear_on_read && !self.last_combination.is_empty() {
                return self.last_combination.clone();
            }
            return String::new();
        }

        let names: Vec<String> = self
            .pressed
            .iter()
            .map(|event| format_friendly(event, self.namer.as_ref()))
            .collect();
        self.last_combination = names.join(" + ");
        self.last_combination.clone()
    }

    /// Apply a new configuration and clear key state
    ///
    /// The retained combination survives a reset.
    pub fn reset(&mut self, config: Config) {
        debug!(?config, "tracker reset");
        self.config = config;
        self.last_key_code = 0;
        self.last_key_event = None;
        self.pressed.clear();
        self.release = ReleaseAction::Armed;
    }

    /// Forget the retained combination
    pub fn clear_retained(&mut self) {
        self.last_combination.clear();
    }
}
