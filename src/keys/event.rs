//! Captured key event

use serde::{Deserialize, Serialize};

/// A single key transition as reported by the OS hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Windows virtual key code
    pub vk_code: u32,
    /// Hardware scan code
    #[serde(default)]
    pub scan_code: u32,
    /// Extended key flag (right-hand modifiers, arrow cluster, numpad Enter)
    #[serde(default)]
    pub extended: bool,
}

impl KeyEvent {
    /// Create an event with the given codes
    pub fn new(vk_code: u32, scan_code: u32, extended: bool) -> Self {
        Self {
            vk_code,
            scan_code,
            extended,
        }
    }

    /// Create an event carrying only a virtual key code
    pub fn from_vk(vk_code: u32) -> Self {
        Self::new(vk_code, 0, false)
    }

    /// The `lParam` layout expected by `GetKeyNameTextW`
    pub fn name_lparam(&self) -> i32 {
        let mut lparam = (self.scan_code << 16) as i32;
        if self.extended {
            lparam |= 1 << 24;
        }
        lparam
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lparam() {
        assert_eq!(KeyEvent::new(0x41, 0x1E, false).name_lparam(), 0x001E_0000);
        assert_eq!(KeyEvent::new(0xA3, 0x1D, true).name_lparam(), 0x011D_0000);
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let event: KeyEvent = serde_json::from_str(r#"{"vk_code":65}"#).unwrap();
        assert_eq!(event, KeyEvent::from_vk(65));
    }
}
