//! Mock key source for tests
//!
//! Delivers injected events synchronously to every subscribed sink.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{HookError, KeySink, KeySource, SubscriptionId};
use crate::events::KeyTransition;
use crate::keys::KeyEvent;

/// A [`KeySource`] that lets tests inject key events
#[derive(Default)]
pub struct MockKeySource {
    sinks: Mutex<BTreeMap<SubscriptionId, Arc<dyn KeySink>>>,
    next_id: AtomicUsize,
    subscribe_calls: AtomicUsize,
    fail_install: bool,
}

impl MockKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose subscriptions always fail, as if the OS refused the hook
    pub fn failing() -> Self {
        Self {
            fail_install: true,
            ..Self::default()
        }
    }

    /// Deliver a transition to every subscriber
    pub fn inject(&self, transition: KeyTransition) {
        let sinks: Vec<Arc<dyn KeySink>> = self
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for sink in sinks {
            sink.on_transition(transition);
        }
    }

    pub fn press(&self, vk_code: u32) {
        self.inject(KeyTransition::KeyDown(KeyEvent::from_vk(vk_code)));
    }

    pub fn release(&self, vk_code: u32) {
        self.inject(KeyTransition::KeyUp(KeyEvent::from_vk(vk_code)));
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of times `subscribe` has been called
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

impl KeySource for MockKeySource {
    fn subscribe(&self, sink: Arc<dyn KeySink>) -> Result<SubscriptionId, HookError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_install {
            return Err(HookError::InstallFailed("mock refused hook".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sink);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        downs: AtomicUsize,
        ups: AtomicUsize,
    }

    impl KeySink for CountingSink {
        fn on_key_down(&self, _event: KeyEvent) {
            self.downs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_key_up(&self, _event: KeyEvent) {
            self.ups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_delivers_to_subscribers() {
        let source = MockKeySource::new();
        let sink = Arc::new(CountingSink::default());
        let id = source.subscribe(sink.clone()).unwrap();

        source.press(0x41);
        source.release(0x41);
        assert_eq!(sink.downs.load(Ordering::SeqCst), 1);
        assert_eq!(sink.ups.load(Ordering::SeqCst), 1);

        source.unsubscribe(id);
        source.press(0x41);
        assert_eq!(sink.downs.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_failing_source() {
        let source = MockKeySource::failing();
        let result = source.subscribe(Arc::new(CountingSink::default()));
        assert!(matches!(result, Err(HookError::InstallFailed(_))));
        assert_eq!(source.subscribe_calls(), 1);
        assert_eq!(source.subscriber_count(), 0);
    }
}
