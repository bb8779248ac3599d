//! Fixed-interval poll loop
//!
//! Runs a tick callback on a dedicated thread driven by a current-thread
//! tokio runtime. The callback only asks the host to refresh; it never
//! touches key-tracking state.
//!
//! Stopping never waits for the ticker thread. A tick may be blocked inside
//! a host call that needs the very thread issuing the stop, so the thread
//! is signalled and detached; it exits after any in-flight tick returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

/// Interval between host refresh requests
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Start/stop handle for the refresh ticker
pub struct PollLoop {
    interval: Duration,
    running: Option<Running>,
}

struct Running {
    stop_tx: oneshot::Sender<()>,
    /// Cleared on stop; checked before every tick
    active: Arc<AtomicBool>,
}

impl PollLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: None,
        }
    }

    /// Whether the ticker thread is active
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start ticking; returns `Ok(false)` if the loop is already running
    ///
    /// The first tick happens one interval after start.
    pub fn start<F>(&mut self, tick: F) -> std::io::Result<bool>
    where
        F: Fn() + Send + 'static,
    {
        if self.running.is_some() {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let active = Arc::new(AtomicBool::new(true));
        let interval = self.interval;

        let ticker_active = Arc::clone(&active);
        thread::Builder::new()
            .name("keycode-poll".to_string())
            .spawn(move || run_ticker(interval, stop_rx, ticker_active, tick))?;

        self.running = Some(Running { stop_tx, active });
        debug!(interval_ms = interval.as_millis() as u64, "poll loop started");
        Ok(true)
    }

    /// Stop ticking without waiting for the thread; returns `false` if not running
    ///
    /// No new tick starts after this returns. A tick already running is
    /// allowed to finish on its own.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };

        running.active.store(false, Ordering::SeqCst);
        let _ = running.stop_tx.send(());
        debug!("poll loop stopped");
        true
    }
}

impl Default for PollLoop {
    fn default() -> Self {
        Self::new(POLL_INTERVAL)
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_ticker<F>(
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    active: Arc<AtomicBool>,
    tick: F,
) where
    F: Fn(),
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to build poll loop runtime");
            return;
        }
    };

    runtime.block_on(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    if !active.load(Ordering::SeqCst) {
                        break;
                    }
                    tick();
                }
            }
        }
    });
    debug!("poll loop thread exited");
}
