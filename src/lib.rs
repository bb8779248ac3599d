//! keycode-info: Rainmeter measure plugin for keyboard input
//!
//! Installs a process-wide low-level keyboard hook and exposes:
//! - the last pressed virtual key code as the numeric measure value
//! - the key as decimal, hex, a friendly name, or the held key combination
//!   as the string value
//! - an optional host command fired once each press cycle is released
//!
//! The hook and the refresh loop only run between the `Start` and `Stop`
//! commands.

pub mod config;
pub mod events;
pub mod hook;
pub mod host;
pub mod keys;
pub mod lifecycle;
pub mod logging;
pub mod measure;
pub mod poll;
pub mod replay;
pub mod tracker;

#[cfg(windows)]
mod plugin;

pub use config::{Config, DisplayMode};
pub use events::KeyTransition;
pub use keys::KeyEvent;
pub use measure::Measure;
pub use tracker::Tracker;
