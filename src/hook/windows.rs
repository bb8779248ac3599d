//! Windows low-level keyboard hook
//!
//! Low-level hook procedures carry no user data, so the hook is a
//! process-wide singleton managed by [`SharedHook`]. Installing it spawns a
//! message-loop thread that owns `WH_KEYBOARD_LL`.
//!
//! The hook callback only copies the event into a channel and returns; a
//! dispatcher thread drains the channel and calls the sinks, so nothing slow
//! runs inside the OS callback.

#![cfg(windows)]

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, LLKHF_EXTENDED, MSG,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::shared::{HookInstaller, SharedHook};
use super::{HookError, KeySink, KeySource, SubscriptionId};
use crate::events::KeyTransition;
use crate::keys::KeyEvent;

/// Sender used by the hook callback; `None` while no hook is installed.
static EVENT_SENDER: Mutex<Option<Sender<KeyTransition>>> = Mutex::new(None);

static HOOK: OnceLock<SharedHook<Win32Installer>> = OnceLock::new();

fn shared_hook() -> &'static SharedHook<Win32Installer> {
    HOOK.get_or_init(|| SharedHook::new(Win32Installer))
}

fn event_sender() -> MutexGuard<'static, Option<Sender<KeyTransition>>> {
    EVENT_SENDER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the process-wide `WH_KEYBOARD_LL` hook
#[derive(Debug, Clone, Copy, Default)]
pub struct LowLevelHook;

impl LowLevelHook {
    pub fn new() -> Self {
        Self
    }

    /// Whether the OS hook is currently installed
    pub fn is_installed(&self) -> bool {
        shared_hook().is_installed()
    }
}

impl KeySource for LowLevelHook {
    fn subscribe(&self, sink: Arc<dyn KeySink>) -> Result<SubscriptionId, HookError> {
        shared_hook().subscribe(sink)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        shared_hook().unsubscribe(id)
    }
}

/// Installs `WH_KEYBOARD_LL` on its own message-loop thread
pub struct Win32Installer;

/// The message-loop thread that owns the hook
pub struct HookThread {
    thread_id: u32,
    handle: JoinHandle<()>,
}

impl HookInstaller for Win32Installer {
    type Handle = HookThread;

    fn install(&self, generation: u64) -> Result<HookThread, HookError> {
        let (event_tx, event_rx) = mpsc::channel::<KeyTransition>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, String>>(1);

        let handle = thread::Builder::new()
            .name("keycode-hook".to_string())
            .spawn(move || run_hook_loop(ready_tx))
            .map_err(|e| HookError::ThreadSpawn(e.to_string()))?;

        let thread_id = match ready_rx.recv() {
            Ok(Ok(thread_id)) => thread_id,
            Ok(Err(message)) => {
                let _ = handle.join();
                return Err(HookError::InstallFailed(message));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(HookError::ThreadExited);
            }
        };

        let hook = HookThread { thread_id, handle };

        if let Err(e) = thread::Builder::new()
            .name("keycode-dispatch".to_string())
            .spawn(move || dispatch(generation, event_rx))
        {
            if let Err((_, quit_error)) = self.remove(hook) {
                error!(%quit_error, "hook thread left running after dispatcher failure");
            }
            return Err(HookError::ThreadSpawn(e.to_string()));
        }

        *event_sender() = Some(event_tx);
        Ok(hook)
    }

    fn remove(&self, hook: HookThread) -> Result<(), (HookThread, HookError)> {
        // SAFETY: posting to a thread id is valid even if the thread has already exited.
        if let Err(e) = unsafe { PostThreadMessageW(hook.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            return Err((hook, HookError::RemoveFailed(e.to_string())));
        }
        if hook.handle.join().is_err() {
            error!("hook thread panicked");
        }
        // Dropping the sender ends the dispatcher once it drains.
        event_sender().take();
        Ok(())
    }
}

/// Install the hook and pump messages until `WM_QUIT`
fn run_hook_loop(ready: SyncSender<Result<u32, String>>) {
    // SAFETY: the hook is installed on this thread, which runs a message loop below.
    let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    // SAFETY: plain Win32 query with no arguments.
    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

    let mut msg = MSG::default();
    // SAFETY: standard GetMessage/DispatchMessage loop on the hook's own thread.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        if let Err(e) = UnhookWindowsHookEx(hook) {
            warn!(?e, "UnhookWindowsHookEx failed");
        }
    }
}

/// Drain transitions produced by installation `generation`
fn dispatch(generation: u64, events: Receiver<KeyTransition>) {
    debug!(generation, "key dispatcher started");
    while let Ok(transition) = events.recv() {
        shared_hook().dispatch(generation, transition);
    }
    debug!(generation, "key dispatcher stopped");
}

/// Low-level keyboard hook callback
///
/// # Safety
///
/// Called by Windows on the hook thread. It must return quickly or the OS
/// silently removes the hook.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
    let event = KeyEvent::new(
        kbs.vkCode,
        kbs.scanCode,
        kbs.flags.0 & LLKHF_EXTENDED.0 != 0,
    );

    let transition = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyTransition::KeyDown(event)),
        WM_KEYUP | WM_SYSKEYUP => Some(KeyTransition::KeyUp(event)),
        _ => None,
    };

    if let Some(transition) = transition {
        if let Some(sender) = event_sender().as_ref() {
            let _ = sender.send(transition);
        }
    }

    CallNextHookEx(None, n_code, w_param, l_param)
}
