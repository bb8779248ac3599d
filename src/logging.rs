//! Logging setup
//!
//! Diagnostics are emitted with `tracing`. Inside the plugin there is no
//! console, so [`HostLogLayer`] forwards every event to the host's log
//! window through a registered [`LogSink`].
//!
//! Every live measure registers its host as a sink. Lines go to the most
//! recently registered one; unregistering it falls back to the next, so
//! unloading one measure does not silence the others.

use std::fmt::{self, Write as _};
use std::sync::{Arc, Once, PoisonError, RwLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Prefix on every forwarded message
pub const LOG_PREFIX: &str = "KeyCodeInfo.dll: ";

/// Environment variable holding the plugin's log filter
pub const LOG_ENV: &str = "KEYCODEINFO_LOG";

/// Host log levels (values match the host's `LOG_*` constants)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LogLevel {
    Error = 1,
    Warning = 2,
    Notice = 3,
    Debug = 4,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warning,
            Level::INFO => LogLevel::Notice,
            _ => LogLevel::Debug,
        }
    }
}

/// Destination for forwarded log lines
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Registered sinks, most recent last
pub struct SinkStack {
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
}

impl SinkStack {
    pub const fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Make `sink` the active sink; a sink already present moves to the top
    pub fn register(&self, sink: Arc<dyn LogSink>) {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        sinks.retain(|registered| !Arc::ptr_eq(registered, &sink));
        sinks.push(sink);
    }

    /// Drop `sink`; the previous registration becomes active again
    pub fn unregister(&self, sink: &Arc<dyn LogSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !Arc::ptr_eq(registered, sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn log(&self, level: LogLevel, message: &str) {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = sinks.last() {
            sink.log(level, message);
        }
    }
}

impl Default for SinkStack {
    fn default() -> Self {
        Self::new()
    }
}

static HOST_SINKS: SinkStack = SinkStack::new();

/// Route forwarded log lines to `sink` until it is unregistered
pub fn register_sink(sink: Arc<dyn LogSink>) {
    HOST_SINKS.register(sink);
}

/// Stop forwarding to `sink`; other registered sinks keep receiving lines
pub fn unregister_sink(sink: &Arc<dyn LogSink>) {
    HOST_SINKS.unregister(sink);
}

/// Install the process-wide subscriber once
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(HostLogLayer::global())
            .try_init();
    });
}

/// `tracing` layer that forwards events to a [`LogSink`]
pub struct HostLogLayer {
    target: Target,
}

enum Target {
    Global,
    Stack(Arc<SinkStack>),
    Fixed(Arc<dyn LogSink>),
}

impl HostLogLayer {
    /// Forward to the sinks registered with [`register_sink`]
    pub fn global() -> Self {
        Self {
            target: Target::Global,
        }
    }

    /// Forward to the top of a caller-owned stack
    pub fn with_stack(stack: Arc<SinkStack>) -> Self {
        Self {
            target: Target::Stack(stack),
        }
    }

    /// Forward to a fixed sink
    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self {
            target: Target::Fixed(sink),
        }
    }

    fn forward(&self, level: LogLevel, message: &str) {
        match &self.target {
            Target::Global => HOST_SINKS.log(level, message),
            Target::Stack(stack) => stack.log(level, message),
            Target::Fixed(sink) => sink.log(level, message),
        }
    }
}

impl<S: Subscriber> Layer<S> for HostLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = format!("{}{}", LOG_PREFIX, visitor.finish());
        self.forward(LogLevel::from(*event.metadata().level()), &message);
    }
}

/// Flattens an event into `message key=value ...`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(LogLevel, String)>>,
    }

    impl LogSink for RecordingSink {
        fn log(&self, level: LogLevel, message: &str) {
            self.lines.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from(Level::ERROR), LogLevel::Error);
        assert_eq!(LogLevel::from(Level::WARN), LogLevel::Warning);
        assert_eq!(LogLevel::from(Level::INFO), LogLevel::Notice);
        assert_eq!(LogLevel::from(Level::TRACE), LogLevel::Debug);
        assert_eq!(LogLevel::Debug as i32, 4);
    }

    #[test]
    fn test_layer_forwards_with_prefix_and_fields() {
        let sink = Arc::new(RecordingSink::default());
        let subscriber =
            tracing_subscriber::registry().with(HostLogLayer::with_sink(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(command = "Jump", "unknown command");
            tracing::info!("keyboard hook installed");
        });

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, LogLevel::Warning);
        assert_eq!(lines[0].1, "KeyCodeInfo.dll: unknown command command=Jump");
        assert_eq!(lines[1].0, LogLevel::Notice);
        assert_eq!(lines[1].1, "KeyCodeInfo.dll: keyboard hook installed");
    }

    fn line_count(sink: &RecordingSink) -> usize {
        sink.lines.lock().unwrap().len()
    }

    #[test]
    fn test_unloading_one_measure_keeps_the_other_logging() {
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        let first_dyn: Arc<dyn LogSink> = first.clone();
        let second_dyn: Arc<dyn LogSink> = second.clone();

        let stack = Arc::new(SinkStack::new());
        stack.register(first_dyn.clone());
        stack.register(second_dyn.clone());
        let subscriber =
            tracing_subscriber::registry().with(HostLogLayer::with_stack(stack.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("both loaded");
            stack.unregister(&second_dyn);
            tracing::info!("second unloaded");
            stack.unregister(&first_dyn);
            tracing::info!("all unloaded");
        });

        assert_eq!(line_count(&second), 1);
        assert_eq!(line_count(&first), 1);
        assert_eq!(
            first.lines.lock().unwrap()[0].1,
            "KeyCodeInfo.dll: second unloaded"
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn test_register_again_moves_sink_to_top() {
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        let first_dyn: Arc<dyn LogSink> = first.clone();
        let second_dyn: Arc<dyn LogSink> = second.clone();

        let stack = SinkStack::new();
        stack.register(first_dyn.clone());
        stack.register(second_dyn);
        stack.register(first_dyn.clone());
        assert_eq!(stack.len(), 2);

        stack.log(LogLevel::Notice, "reloaded");
        assert_eq!(line_count(&first), 1);
        assert_eq!(line_count(&second), 0);

        stack.unregister(&first_dyn);
        stack.log(LogLevel::Notice, "after unload");
        assert_eq!(line_count(&second), 1);
    }
}
