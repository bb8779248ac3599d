//! Host adapter
//!
//! A [`Measure`] is what the host creates for each skin measure. It turns
//! host lifecycle calls into tracker operations and owns the key source
//! subscription and the refresh poll loop. Neither is started on reload;
//! only the `Start` and `Stop` commands control them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::hook::{KeySink, KeySource, SubscriptionId};
use crate::host::{refresh_bangs, Host};
use crate::keys::{KeyEvent, KeyNamer};
use crate::poll::PollLoop;
use crate::tracker::{self, SharedTracker, Tracker};

/// Commands accepted by [`Measure::execute_command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Install the hook and start refreshing
    Start,
    /// Remove the hook and stop refreshing
    Stop,
}

impl Command {
    /// Parse a command, ignoring case
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("start") {
            Some(Self::Start)
        } else if text.eq_ignore_ascii_case("stop") {
            Some(Self::Stop)
        } else {
            None
        }
    }
}

/// Feeds key events into a tracker and executes release actions
///
/// `active` is cleared before the sink is unsubscribed. Events still in
/// flight after that are ignored.
struct TrackerSink<H> {
    tracker: SharedTracker,
    host: Arc<H>,
    active: Arc<AtomicBool>,
}

impl<H: Host> TrackerSink<H> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl<H: Host> KeySink for TrackerSink<H> {
    fn on_key_down(&self, event: KeyEvent) {
        if self.is_active() {
            tracker::lock(&self.tracker).on_key_down(event);
        }
    }

    fn on_key_up(&self, event: KeyEvent) {
        if !self.is_active() {
            return;
        }
        // Release the lock before calling into the host.
        let action = tracker::lock(&self.tracker).on_key_up(event);
        if let Some(action) = action {
            if self.is_active() {
                self.host.execute(&action);
            }
        }
    }
}

/// A live key source subscription
struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
}

/// One host measure instance
pub struct Measure<H: Host + 'static> {
    host: Arc<H>,
    source: Arc<dyn KeySource>,
    tracker: SharedTracker,
    subscription: Option<Subscription>,
    poll: PollLoop,
    /// Cleared when polling stops; refresh ticks check it before each bang
    alive: Arc<AtomicBool>,
}

impl<H: Host + 'static> Measure<H> {
    /// Create a measure in the stopped state with default configuration
    pub fn new(host: Arc<H>, source: Arc<dyn KeySource>, namer: Arc<dyn KeyNamer>) -> Self {
        Self::with_poll_loop(host, source, namer, PollLoop::default())
    }

    /// Create a measure using a custom poll loop
    pub fn with_poll_loop(
        host: Arc<H>,
        source: Arc<dyn KeySource>,
        namer: Arc<dyn KeyNamer>,
        poll: PollLoop,
    ) -> Self {
        let tracker = Tracker::new(Config::default(), namer);
        Self {
            host,
            source,
            tracker: Arc::new(std::sync::Mutex::new(tracker)),
            subscription: None,
            poll,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Re-read options and reset key state; the hook and poll loop are untouched
    pub fn reload(&mut self) {
        let config = Config::from_options(self.host.as_ref());
        tracker::lock(&self.tracker).reset(config);
        debug!("plugin reloaded in stopped state");
    }

    /// Numeric measure value: the last key code
    pub fn update(&self) -> f64 {
        tracker::lock(&self.tracker).numeric_value()
    }

    /// String measure value, rendered per the display mode
    pub fn get_string(&self) -> String {
        tracker::lock(&self.tracker).display_string()
    }

    /// Handle a host command; unknown commands are logged and ignored
    pub fn execute_command(&mut self, text: &str) {
        if text.trim().is_empty() {
            debug!("no command provided");
            return;
        }

        match Command::parse(text) {
            Some(Command::Start) => self.start(),
            Some(Command::Stop) => self.stop(),
            None => warn!(command = text, "unknown command"),
        }
    }

    /// Subscribe to key events and start the refresh loop, each if not running
    pub fn start(&mut self) {
        if self.subscription.is_none() {
            let active = Arc::new(AtomicBool::new(true));
            let sink = Arc::new(TrackerSink {
                tracker: Arc::clone(&self.tracker),
                host: Arc::clone(&self.host),
                active: Arc::clone(&active),
            });
            match self.source.subscribe(sink) {
                Ok(id) => {
                    self.subscription = Some(Subscription { id, active });
                    info!("keyboard hook started via command");
                }
                Err(e) => {
                    error!(%e, "keyboard hook failed; continuing without key capture");
                }
            }
        } else {
            debug!("keyboard hook already running");
        }

        let measure_name = self.host.measure_name();
        debug!(%measure_name, "measure name");

        let host = Arc::clone(&self.host);
        let alive = Arc::clone(&self.alive);
        let bangs = refresh_bangs(&measure_name);
        match self.poll.start(move || {
            for bang in &bangs {
                if !alive.load(Ordering::SeqCst) {
                    return;
                }
                host.execute(bang);
            }
        }) {
            Ok(true) => debug!("update timer started"),
            Ok(false) => debug!("update timer already running"),
            Err(e) => error!(%e, "failed to start update timer"),
        }
    }

    /// Unsubscribe from key events and stop the refresh loop, each if running
    pub fn stop(&mut self) {
        if self.unsubscribe() {
            info!("keyboard hook stopped via command");
        } else {
            debug!("keyboard hook is not running");
        }

        if self.stop_polling() {
            debug!("update timer stopped");
        }
    }

    /// Release everything the measure holds, regardless of state
    pub fn teardown(&mut self) {
        if self.unsubscribe() {
            debug!("keyboard hook removed on unload");
        }
        if self.stop_polling() {
            debug!("update timer stopped on unload");
        }
        tracker::lock(&self.tracker).clear_retained();
    }

    fn stop_polling(&mut self) -> bool {
        // In-flight ticks keep the retired flag; a later start gets a fresh one.
        let retired = std::mem::replace(&mut self.alive, Arc::new(AtomicBool::new(true)));
        retired.store(false, Ordering::SeqCst);
        self.poll.stop()
    }

    fn unsubscribe(&mut self) -> bool {
        let Some(subscription) = self.subscription.take() else {
            return false;
        };
        subscription.active.store(false, Ordering::SeqCst);
        self.source.unsubscribe(subscription.id);
        true
    }

    /// Whether this measure is subscribed to key events
    pub fn is_hooked(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether the refresh loop is running
    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    /// The host this measure talks to
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }
}

impl<H: Host + 'static> Drop for Measure<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::config::OptionSource;
    use crate::hook::mock::MockKeySource;
    use crate::keys::NoKeyNames;
    use crate::logging::{LogLevel, LogSink};

    #[derive(Default)]
    struct TestHost {
        options: HashMap<String, String>,
        executed: Mutex<Vec<String>>,
    }

    impl OptionSource for TestHost {
        fn read_string(&self, option: &str, default: &str) -> String {
            self.options.read_string(option, default)
        }
    }

    impl LogSink for TestHost {
        fn log(&self, _level: LogLevel, _message: &str) {}
    }

    impl Host for TestHost {
        fn measure_name(&self) -> String {
            "Measure".to_string()
        }

        fn execute(&self, command: &str) {
            self.executed.lock().unwrap().push(command.to_string());
        }
    }

    fn host_with_action(action: &str) -> Arc<TestHost> {
        let mut options = HashMap::new();
        options.insert("OnReleaseKeyAction".to_string(), action.to_string());
        Arc::new(TestHost {
            options,
            executed: Mutex::new(Vec::new()),
        })
    }

    fn tracker_for(host: &Arc<TestHost>) -> SharedTracker {
        let config = Config::from_options(host.as_ref());
        Arc::new(std::sync::Mutex::new(Tracker::new(config, Arc::new(NoKeyNames))))
    }

    #[test]
    fn test_inactive_sink_ignores_late_events() {
        let host = host_with_action("!Redraw");
        let tracker = tracker_for(&host);
        let active = Arc::new(AtomicBool::new(true));
        let sink = TrackerSink {
            tracker: Arc::clone(&tracker),
            host: Arc::clone(&host),
            active: Arc::clone(&active),
        };

        sink.on_key_down(KeyEvent::from_vk(0x41));
        active.store(false, Ordering::SeqCst);
        sink.on_key_up(KeyEvent::from_vk(0x41));
        sink.on_key_down(KeyEvent::from_vk(0x42));

        assert!(host.executed.lock().unwrap().is_empty());
        assert_eq!(tracker::lock(&tracker).numeric_value(), 65.0);
    }

    #[test]
    fn test_stop_deactivates_retained_sink() {
        let host = host_with_action("!Redraw");
        let source = Arc::new(MockKeySource::new());
        let mut measure = Measure::with_poll_loop(
            Arc::clone(&host),
            source.clone(),
            Arc::new(NoKeyNames),
            PollLoop::new(std::time::Duration::from_secs(3600)),
        );
        measure.reload();
        measure.start();

        let active = match &measure.subscription {
            Some(subscription) => Arc::clone(&subscription.active),
            None => panic!("measure did not subscribe"),
        };
        measure.stop();

        assert!(!active.load(Ordering::SeqCst));
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("Start"), Some(Command::Start));
        assert_eq!(Command::parse("START"), Some(Command::Start));
        assert_eq!(Command::parse("stop"), Some(Command::Stop));
        assert_eq!(Command::parse(" Stop "), Some(Command::Stop));
        assert_eq!(Command::parse("Restart"), None);
        assert_eq!(Command::parse(""), None);
    }
}
