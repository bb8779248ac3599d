//! Rainmeter host bindings
//!
//! The host API is exported by `Rainmeter.dll`, which is always loaded in the
//! process that loads the plugin. The entry points are resolved at runtime so
//! the plugin does not need the host's import library to link. If they
//! cannot be found, option reads return defaults and commands are dropped.

#![cfg(windows)]

use std::ffi::c_void;
use std::sync::OnceLock;

use windows::core::{s, w, PCWSTR};
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};

use super::Host;
use crate::config::OptionSource;
use crate::logging::{LogLevel, LogSink};

type RmReadStringFn =
    unsafe extern "system" fn(rm: *mut c_void, option: PCWSTR, def_value: PCWSTR, replace_measures: i32) -> PCWSTR;
type RmReadFormulaFn = unsafe extern "system" fn(rm: *mut c_void, option: PCWSTR, def_value: f64) -> f64;
type RmGetFn = unsafe extern "system" fn(rm: *mut c_void, kind: i32) -> *mut c_void;
type RmExecuteFn = unsafe extern "system" fn(skin: *mut c_void, command: PCWSTR);
type RmLogFn = unsafe extern "system" fn(rm: *mut c_void, level: i32, message: PCWSTR);

/// `RmGet` selectors
const RMG_MEASURENAME: i32 = 0;
const RMG_SKIN: i32 = 1;

struct RainmeterApi {
    read_string: RmReadStringFn,
    read_formula: RmReadFormulaFn,
    get: RmGetFn,
    execute: RmExecuteFn,
    log: RmLogFn,
}

impl RainmeterApi {
    fn get() -> Option<&'static RainmeterApi> {
        static API: OnceLock<Option<RainmeterApi>> = OnceLock::new();
        API.get_or_init(Self::resolve).as_ref()
    }

    fn resolve() -> Option<RainmeterApi> {
        // SAFETY: the module handle is only used for GetProcAddress while the
        // host process (which owns Rainmeter.dll) is alive. The transmutes cast
        // FARPROC to the documented signatures of the named exports.
        unsafe {
            let module = GetModuleHandleW(w!("Rainmeter.dll")).ok()?;
            Some(RainmeterApi {
                read_string: std::mem::transmute(GetProcAddress(module, s!("RmReadString"))?),
                read_formula: std::mem::transmute(GetProcAddress(module, s!("RmReadFormula"))?),
                get: std::mem::transmute(GetProcAddress(module, s!("RmGet"))?),
                execute: std::mem::transmute(GetProcAddress(module, s!("RmExecute"))?),
                log: std::mem::transmute(GetProcAddress(module, s!("RmLog"))?),
            })
        }
    }
}

/// NUL-terminated UTF-16 copy of `text`
fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Host handle for one measure
pub struct RainmeterHost {
    rm: *mut c_void,
    skin: *mut c_void,
}

// SAFETY: the host keeps `rm` and the skin pointer valid from Initialize to
// Finalize, and its API functions may be called from worker threads.
unsafe impl Send for RainmeterHost {}
unsafe impl Sync for RainmeterHost {}

impl RainmeterHost {
    /// Wrap the `rm` pointer passed to `Initialize`
    ///
    /// # Safety
    ///
    /// `rm` must be the pointer the host passed to the plugin and must stay
    /// valid for the lifetime of the returned value.
    pub unsafe fn new(rm: *mut c_void) -> Self {
        let skin = match RainmeterApi::get() {
            Some(api) => (api.get)(rm, RMG_SKIN),
            None => std::ptr::null_mut(),
        };
        Self { rm, skin }
    }
}

impl OptionSource for RainmeterHost {
    fn read_string(&self, option: &str, default: &str) -> String {
        let Some(api) = RainmeterApi::get() else {
            return default.to_string();
        };
        let option = wide(option);
        let default_wide = wide(default);
        // SAFETY: both strings are NUL-terminated and outlive the call; the
        // returned pointer is owned by the host and copied immediately.
        unsafe {
            let value = (api.read_string)(
                self.rm,
                PCWSTR(option.as_ptr()),
                PCWSTR(default_wide.as_ptr()),
                1,
            );
            if value.is_null() {
                return default.to_string();
            }
            value.to_string().unwrap_or_else(|_| default.to_string())
        }
    }

    fn read_int(&self, option: &str, default: i32) -> i32 {
        let Some(api) = RainmeterApi::get() else {
            return default;
        };
        let option = wide(option);
        // SAFETY: the option name is NUL-terminated and outlives the call.
        let value = unsafe { (api.read_formula)(self.rm, PCWSTR(option.as_ptr()), f64::from(default)) };
        value as i32
    }
}

impl LogSink for RainmeterHost {
    fn log(&self, level: LogLevel, message: &str) {
        let Some(api) = RainmeterApi::get() else {
            return;
        };
        let message = wide(message);
        // SAFETY: the message is NUL-terminated and outlives the call.
        unsafe { (api.log)(self.rm, level as i32, PCWSTR(message.as_ptr())) };
    }
}

impl Host for RainmeterHost {
    fn measure_name(&self) -> String {
        let Some(api) = RainmeterApi::get() else {
            return String::new();
        };
        // SAFETY: RMG_MEASURENAME returns a host-owned NUL-terminated string.
        unsafe {
            let name = PCWSTR((api.get)(self.rm, RMG_MEASURENAME) as *const u16);
            if name.is_null() {
                return String::new();
            }
            name.to_string().unwrap_or_default()
        }
    }

    fn execute(&self, command: &str) {
        let Some(api) = RainmeterApi::get() else {
            return;
        };
        if self.skin.is_null() {
            return;
        }
        let command = wide(command);
        // SAFETY: the skin pointer came from RmGet and the command is NUL-terminated.
        unsafe { (api.execute)(self.skin, PCWSTR(command.as_ptr())) };
    }
}
