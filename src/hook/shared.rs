//! One OS hook shared by every subscriber
//!
//! The first subscription installs the hook through a [`HookInstaller`] and
//! the last unsubscription removes it. A hook that fails to come off stays
//! registered, so a later subscription never installs a second one.
//!
//! Each installation gets a new generation number. Events are tagged with
//! the generation that produced them, and events from an earlier
//! installation are dropped instead of reaching newer subscribers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, trace};

use super::{HookError, KeySink, KeySource, SubscriptionId};
use crate::events::KeyTransition;

/// Installs and removes the underlying OS hook
pub trait HookInstaller: Send + Sync {
    /// Live-hook token returned by `install`
    type Handle: Send;

    /// Install the hook; its events must be delivered to
    /// [`SharedHook::dispatch`] tagged with `generation`
    fn install(&self, generation: u64) -> Result<Self::Handle, HookError>;

    /// Remove the hook, handing the token back if it is still installed
    fn remove(&self, handle: Self::Handle) -> Result<(), (Self::Handle, HookError)>;
}

struct HookState<H> {
    sinks: BTreeMap<SubscriptionId, Arc<dyn KeySink>>,
    next_id: SubscriptionId,
    generation: u64,
    installed: Option<H>,
}

/// Reference-counted hook fanning events out to all subscribers
pub struct SharedHook<I: HookInstaller> {
    installer: I,
    state: Mutex<HookState<I::Handle>>,
}

impl<I: HookInstaller> SharedHook<I> {
    pub fn new(installer: I) -> Self {
        Self {
            installer,
            state: Mutex::new(HookState {
                sinks: BTreeMap::new(),
                next_id: 0,
                generation: 0,
                installed: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HookState<I::Handle>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    /// Whether the OS hook is currently installed
    pub fn is_installed(&self) -> bool {
        self.state().installed.is_some()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.state().sinks.len()
    }

    /// Generation of the current (or most recent) installation
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Deliver a transition produced by installation `generation`
    pub fn dispatch(&self, generation: u64, transition: KeyTransition) {
        let sinks: Vec<Arc<dyn KeySink>> = {
            let state = self.state();
            if state.installed.is_none() || state.generation != generation {
                trace!(generation, current = state.generation, "dropping stale key event");
                return;
            }
            state.sinks.values().cloned().collect()
        };
        for sink in sinks {
            sink.on_transition(transition);
        }
    }
}

impl<I: HookInstaller> KeySource for SharedHook<I> {
    fn subscribe(&self, sink: Arc<dyn KeySink>) -> Result<SubscriptionId, HookError> {
        let mut state = self.state();

        if state.installed.is_none() {
            let generation = state.generation + 1;
            let handle = self.installer.install(generation)?;
            state.generation = generation;
            state.installed = Some(handle);
            info!(generation, "keyboard hook installed");
        } else {
            debug!("keyboard hook already installed");
        }

        state.next_id += 1;
        let id = state.next_id;
        state.sinks.insert(id, sink);
        debug!(id, subscribers = state.sinks.len(), "key sink subscribed");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state();
        if state.sinks.remove(&id).is_none() {
            return;
        }
        debug!(id, subscribers = state.sinks.len(), "key sink unsubscribed");

        if !state.sinks.is_empty() {
            return;
        }
        let Some(handle) = state.installed.take() else {
            return;
        };
        match self.installer.remove(handle) {
            Ok(()) => info!("keyboard hook removed"),
            Err((handle, e)) => {
                error!(%e, "failed to remove keyboard hook; keeping it registered");
                state.installed = Some(handle);
            }
        }
    }
}
