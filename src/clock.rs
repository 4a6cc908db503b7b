//! Monotonic time source, zeroed at runtime start.
//!
//! Every event timestamp in this crate is a [`Duration`] drawn from a
//! [`RelativeClock`] rather than wall-clock time, so that tests can run a
//! clock at a different pace than real time without touching call sites.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::registry::Service;

/// Monotonic, relative time source.
///
/// `start()` records a baseline instant; `now()` returns the elapsed time
/// since that baseline. Calling `now()` before `start()` is a programmer
/// error: it panics in every build, since there is no sensible duration to
/// return.
#[derive(Debug)]
pub struct RelativeClock {
    start: RwLock<Option<Instant>>,
    started: AtomicBool,
}

impl Default for RelativeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RelativeClock {
    /// Construct an unstarted clock. Construction never starts the clock;
    /// call [`RelativeClock::start`] once, during runtime bring-up.
    pub fn new() -> Self {
        Self {
            start: RwLock::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Record the baseline instant. All subsequent `now()` calls return time
    /// relative to this point. Calling this more than once re-zeros the
    /// clock; callers should call it exactly once, at startup.
    pub fn start(&self) {
        *self.start.write().expect("clock lock poisoned") = Some(Instant::now());
        self.started.store(true, Ordering::Release);
    }

    /// Whether [`RelativeClock::start`] has been called yet.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Elapsed time since [`RelativeClock::start`]. Panics if the clock has
    /// not been started yet (§7 "clock misuse").
    #[track_caller]
    pub fn now(&self) -> Duration {
        self.try_now().unwrap_or_else(|e| e.panic())
    }

    /// Fallible form of [`RelativeClock::now`], for callers that want to
    /// handle clock misuse themselves instead of panicking.
    pub fn try_now(&self) -> Result<Duration, CoreError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(CoreError::ClockMisuse);
        }
        let guard = self.start.read().expect("clock lock poisoned");
        Ok(guard.expect("started implies start is set").elapsed())
    }
}

impl Service for RelativeClock {}
