//! Rainmeter plugin entry points
//!
//! The host calls these with the opaque `data` pointer created in
//! `Initialize`. Panics are caught here so none unwind into the host.

#![cfg(windows)]
#![allow(non_snake_case)]

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;
use windows::core::PCWSTR;

use crate::hook::windows::LowLevelHook;
use crate::host::rainmeter::RainmeterHost;
use crate::keys::SystemKeyNames;
use crate::logging::{self, LogSink};
use crate::measure::Measure;

struct PluginMeasure {
    measure: Measure<RainmeterHost>,
    log_sink: Arc<dyn LogSink>,
    /// Backing storage for the pointer returned by `GetString`
    text: Vec<u16>,
}

fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error!("panic caught at plugin boundary");
            fallback
        }
    }
}

/// # Safety
///
/// `data` must be null or a pointer produced by `Initialize` and not yet
/// passed to `Finalize`.
unsafe fn plugin_mut<'a>(data: *mut c_void) -> Option<&'a mut PluginMeasure> {
    data.cast::<PluginMeasure>().as_mut()
}

#[no_mangle]
pub unsafe extern "C" fn Initialize(data: *mut *mut c_void, rm: *mut c_void) {
    if data.is_null() {
        return;
    }
    let plugin = guarded(None, || {
        logging::init();

        let host = Arc::new(RainmeterHost::new(rm));
        let log_sink: Arc<dyn LogSink> = host.clone();
        logging::register_sink(Arc::clone(&log_sink));

        let measure = Measure::new(host, Arc::new(LowLevelHook::new()), Arc::new(SystemKeyNames));
        Some(Box::new(PluginMeasure {
            measure,
            log_sink,
            text: vec![0],
        }))
    });

    *data = match plugin {
        Some(plugin) => Box::into_raw(plugin).cast(),
        None => std::ptr::null_mut(),
    };
}

#[no_mangle]
pub unsafe extern "C" fn Reload(data: *mut c_void, _rm: *mut c_void, _max_value: *mut f64) {
    let Some(plugin) = plugin_mut(data) else {
        return;
    };
    guarded((), || {
        logging::register_sink(Arc::clone(&plugin.log_sink));
        plugin.measure.reload();
    });
}

#[no_mangle]
pub unsafe extern "C" fn Update(data: *mut c_void) -> f64 {
    let Some(plugin) = plugin_mut(data) else {
        return 0.0;
    };
    guarded(0.0, || plugin.measure.update())
}

#[no_mangle]
pub unsafe extern "C" fn GetString(data: *mut c_void) -> *const u16 {
    let Some(plugin) = plugin_mut(data) else {
        return std::ptr::null();
    };
    let text = guarded(String::new(), || plugin.measure.get_string());
    plugin.text = text.encode_utf16().chain(std::iter::once(0)).collect();
    plugin.text.as_ptr()
}

#[no_mangle]
pub unsafe extern "C" fn ExecuteBang(data: *mut c_void, args: *const u16) {
    let Some(plugin) = plugin_mut(data) else {
        return;
    };
    let args = PCWSTR(args);
    let command = if args.is_null() {
        String::new()
    } else {
        args.to_string().unwrap_or_default()
    };
    guarded((), || plugin.measure.execute_command(&command));
}

#[no_mangle]
pub unsafe extern "C" fn Finalize(data: *mut c_void) {
    if data.is_null() {
        return;
    }
    let mut plugin = Box::from_raw(data.cast::<PluginMeasure>());
    guarded((), || plugin.measure.teardown());
    logging::unregister_sink(&plugin.log_sink);
}
