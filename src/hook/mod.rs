//! Key event sources
//!
//! A [`KeySource`] delivers key transitions to subscribed [`KeySink`]s. On
//! Windows the source is a process-wide `WH_KEYBOARD_LL` hook managed by
//! [`shared::SharedHook`]; tests use [`mock::MockKeySource`] to inject
//! synthetic events.

use std::sync::Arc;

use crate::events::KeyTransition;
use crate::keys::KeyEvent;

pub mod mock;
pub mod shared;

#[cfg(windows)]
pub mod windows;

/// Identifier returned by [`KeySource::subscribe`]
pub type SubscriptionId = usize;

/// Receives key transitions
///
/// Called from the source's dispatch thread; implementations must not block
/// for long.
pub trait KeySink: Send + Sync {
    fn on_key_down(&self, event: KeyEvent);
    fn on_key_up(&self, event: KeyEvent);

    fn on_transition(&self, transition: KeyTransition) {
        match transition {
            KeyTransition::KeyDown(event) => self.on_key_down(event),
            KeyTransition::KeyUp(event) => self.on_key_up(event),
        }
    }
}

/// Produces key transitions for subscribed sinks
pub trait KeySource: Send + Sync {
    /// Start delivering events to `sink`
    fn subscribe(&self, sink: Arc<dyn KeySink>) -> Result<SubscriptionId, HookError>;

    /// Stop delivering events to the given subscription; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Errors from installing or removing the keyboard hook
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to install keyboard hook: {0}")]
    InstallFailed(String),

    #[error("failed to remove keyboard hook: {0}")]
    RemoveFailed(String),

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("hook thread exited before reporting its state")]
    ThreadExited,
}
