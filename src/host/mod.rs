//! Host runtime services
//!
//! The measure talks to its host through [`Host`]: reading options,
//! executing bangs, and writing to the host log. The Rainmeter
//! implementation lives in [`rainmeter`]; tests provide their own.

use crate::config::OptionSource;
use crate::logging::LogSink;

#[cfg(windows)]
pub mod rainmeter;

/// Services a measure needs from the host
pub trait Host: OptionSource + LogSink + Send + Sync {
    /// Name of the measure this host handle belongs to
    fn measure_name(&self) -> String;

    /// Execute a host command (bang)
    fn execute(&self, command: &str);
}

/// Bangs issued on every poll tick to make the host re-read the measure
pub fn refresh_bangs(measure_name: &str) -> [String; 3] {
    [
        format!("!UpdateMeasure \"{}\"", measure_name),
        "!UpdateMeter *".to_string(),
        "!Redraw".to_string(),
    ]
}
