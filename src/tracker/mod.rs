//! Keyboard event tracker
//!
//! One tracker per measure. It is shared between the key dispatch thread
//! and the host's poll calls, so it always sits behind a mutex.

mod machine;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use machine::{ReleaseAction, Tracker};

/// Tracker shared between the dispatcher and host poll calls
pub type SharedTracker = Arc<Mutex<Tracker>>;

/// Lock the tracker, recovering from a poisoned mutex
///
/// Every tracker operation leaves the state consistent, so a panic in another
/// holder does not invalidate it.
pub fn lock(tracker: &Mutex<Tracker>) -> MutexGuard<'_, Tracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}
