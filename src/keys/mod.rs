//! Key event data and text rendering
//!
//! A [`KeyEvent`] is what the keyboard hook captures. The rendering rules
//! (decimal, hex, friendly name) turn it into display text, asking a
//! [`KeyNamer`] for the OS-provided key name where one is needed.

mod event;
mod names;

pub use event::KeyEvent;
pub use names::{
    format_decimal, format_friendly, format_hex, KeyNamer, NoKeyNames, SystemKeyNames,
};
