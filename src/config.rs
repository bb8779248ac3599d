//! Measure configuration loading

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Option names as they appear in the skin
pub mod options {
    pub const SHOW_CODE: &str = "ShowCode";
    pub const HIDE_FORCE: &str = "HideForce";
    pub const ON_RELEASE_KEY_ACTION: &str = "OnReleaseKeyAction";
}

/// How the captured key is rendered by `display_string`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// OS key name with ASCII / numeric fallback (`ShowCode=0`)
    FriendlyName,
    /// Base-10 key code (`ShowCode=1`)
    #[default]
    Decimal,
    /// `0x`-prefixed hex key code (`ShowCode=3`)
    Hex,
    /// All held keys in press order (`ShowCode=4`)
    Combination,
}

impl DisplayMode {
    /// Map a host `ShowCode` value, `None` if it is not a known mode
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::FriendlyName),
            1 => Some(Self::Decimal),
            3 => Some(Self::Hex),
            4 => Some(Self::Combination),
            _ => None,
        }
    }

    /// The host `ShowCode` value for this mode
    pub fn code(self) -> i32 {
        match self {
            Self::FriendlyName => 0,
            Self::Decimal => 1,
            Self::Hex => 3,
            Self::Combination => 4,
        }
    }
}

/// Reads named options, returning the default when an option is missing
pub trait OptionSource {
    fn read_string(&self, option: &str, default: &str) -> String;

    fn read_int(&self, option: &str, default: i32) -> i32 {
        let raw = self.read_string(option, "");
        raw.trim().parse().unwrap_or(default)
    }
}

impl OptionSource for HashMap<String, String> {
    fn read_string(&self, option: &str, default: &str) -> String {
        self.get(option)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Options taken from `KEYCODEINFO_<OPTION>` environment variables
#[derive(Debug, Clone)]
pub struct EnvOptions {
    prefix: String,
}

impl EnvOptions {
    pub fn new() -> Self {
        Self::with_prefix("KEYCODEINFO_")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, option: &str) -> String {
        format!("{}{}", self.prefix, option.to_ascii_uppercase())
    }
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionSource for EnvOptions {
    fn read_string(&self, option: &str, default: &str) -> String {
        std::env::var(self.var_name(option)).unwrap_or_else(|_| default.to_string())
    }
}

/// Measure configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Rendering used by `display_string`
    pub display_mode: DisplayMode,

    /// Clear the stored key after it has been read once
    pub clear_on_read: bool,

    /// Host command executed when a press cycle is released (empty = none)
    pub on_release_action: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Decimal,
            clear_on_read: true,
            on_release_action: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from host options, falling back to defaults
    pub fn from_options(source: &impl OptionSource) -> Self {
        let defaults = Self::default();

        let show_code = source.read_int(options::SHOW_CODE, defaults.display_mode.code());
        let display_mode = DisplayMode::from_code(show_code).unwrap_or_else(|| {
            warn!(show_code, "unknown ShowCode, using decimal");
            defaults.display_mode
        });

        let clear_on_read = source.read_int(options::HIDE_FORCE, 1) == 1;
        let on_release_action = source.read_string(options::ON_RELEASE_KEY_ACTION, "");

        Self {
            display_mode,
            clear_on_read,
            on_release_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = Config::from_options(&options(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.display_mode, DisplayMode::Decimal);
        assert!(config.clear_on_read);
        assert!(config.on_release_action.is_empty());
    }

    #[test]
    fn test_reads_all_options() {
        let config = Config::from_options(&options(&[
            ("ShowCode", "4"),
            ("HideForce", "0"),
            ("OnReleaseKeyAction", "[!Log released]"),
        ]));
        assert_eq!(config.display_mode, DisplayMode::Combination);
        assert!(!config.clear_on_read);
        assert_eq!(config.on_release_action, "[!Log released]");
    }

    #[test]
    fn test_unknown_show_code_falls_back() {
        let config = Config::from_options(&options(&[("ShowCode", "2")]));
        assert_eq!(config.display_mode, DisplayMode::Decimal);

        let config = Config::from_options(&options(&[("ShowCode", "hex")]));
        assert_eq!(config.display_mode, DisplayMode::Decimal);
    }

    #[test]
    fn test_hide_force_only_one_enables() {
        let config = Config::from_options(&options(&[("HideForce", "2")]));
        assert!(!config.clear_on_read);
    }

    #[test]
    fn test_mode_codes_round_trip() {
        for mode in [
            DisplayMode::FriendlyName,
            DisplayMode::Decimal,
            DisplayMode::Hex,
            DisplayMode::Combination,
        ] {
            assert_eq!(DisplayMode::from_code(mode.code()), Some(mode));
        }
    }

    #[test]
    fn test_env_options() {
        let env = EnvOptions::with_prefix("KEYCODEINFO_TEST_ENV_");
        std::env::set_var("KEYCODEINFO_TEST_ENV_SHOWCODE", "3");
        assert_eq!(env.read_int("ShowCode", 1), 3);
        assert_eq!(env.read_string("OnReleaseKeyAction", "none"), "none");
    }
}
