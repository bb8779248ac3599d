//! Key transitions delivered by a key source
//!
//! The hook thread and the replay tool both produce these; the tracker
//! consumes them.

use serde::{Deserialize, Serialize};

use crate::keys::KeyEvent;

/// A key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyTransition {
    /// Key went down (`WM_KEYDOWN` / `WM_SYSKEYDOWN`)
    KeyDown(KeyEvent),

    /// Key went up (`WM_KEYUP` / `WM_SYSKEYUP`)
    KeyUp(KeyEvent),
}

impl KeyTransition {
    /// The key this transition refers to
    pub fn event(&self) -> &KeyEvent {
        match self {
            KeyTransition::KeyDown(event) | KeyTransition::KeyUp(event) => event,
        }
    }
}

impl std::fmt::Display for KeyTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyTransition::KeyDown(event) => write!(f, "KEY_DOWN ({})", event.vk_code),
            KeyTransition::KeyUp(event) => write!(f, "KEY_UP ({})", event.vk_code),
        }
    }
}
