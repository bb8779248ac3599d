//! Key code rendering rules

use super::KeyEvent;

/// Looks up the human-readable name of a key
pub trait KeyNamer: Send + Sync {
    /// Return the key's name, or `None` when the lookup fails
    fn key_name(&self, event: &KeyEvent) -> Option<String>;
}

/// Namer that never knows a name; rendering falls back to ASCII or digits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeyNames;

impl KeyNamer for NoKeyNames {
    fn key_name(&self, _event: &KeyEvent) -> Option<String> {
        None
    }
}

/// Namer backed by the keyboard layout of the running system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeyNames;

#[cfg(windows)]
impl KeyNamer for SystemKeyNames {
    fn key_name(&self, event: &KeyEvent) -> Option<String> {
        use windows::Win32::UI::Input::KeyboardAndMouse::GetKeyNameTextW;

        let mut buf = [0u16; 64];
        // SAFETY: the buffer is valid for its whole length for the duration of the call.
        let len = unsafe { GetKeyNameTextW(event.name_lparam(), &mut buf) };
        if len <= 0 {
            return None;
        }
        let name = String::from_utf16_lossy(&buf[..len as usize]);
        (!name.is_empty()).then_some(name)
    }
}

#[cfg(not(windows))]
impl KeyNamer for SystemKeyNames {
    fn key_name(&self, _event: &KeyEvent) -> Option<String> {
        None
    }
}

/// Base-10 digits of the key code
pub fn format_decimal(vk_code: u32) -> String {
    vk_code.to_string()
}

/// `0x` followed by at least two uppercase hex digits
pub fn format_hex(vk_code: u32) -> String {
    format!("0x{:02X}", vk_code)
}

/// OS key name, else the printable ASCII character, else the decimal code
pub fn format_friendly(event: &KeyEvent, namer: &dyn KeyNamer) -> String {
    if let Some(name) = namer.key_name(event) {
        return name;
    }
    match event.vk_code {
        code @ 32..=126 => char::from(code as u8).to_string(),
        code => format_decimal(code),
    }
}
