//! A stoppable worker thread with cooperative sleep and best-effort
//! scheduling controls.
//!
//! Construction never starts the thread: the hooks a derived plugin wants to
//! run live on that plugin, so the plugin must finish constructing itself
//! (in particular, build any state its `body` closes over) before the loop
//! can safely begin. `start()` is the explicit second phase that launches
//! it; `stop()` is the mirrored teardown that must run before the owner's
//! own destructor logic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

const SLEEP_CHUNK: Duration = Duration::from_millis(10);

/// A worker thread that runs `on_start`, then `body` repeatedly while not
/// stopped, then `on_stop`, and can be asked to stop cooperatively from any
/// other thread.
pub struct ManagedThread {
    stop: Arc<AtomicBool>,
    iterations: Arc<AtomicUsize>,
    tid: Arc<TidCell>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ManagedThread {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedThread {
    /// Construct an unstarted thread. Does not spawn anything.
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            iterations: Arc::new(AtomicUsize::new(0)),
            tid: Arc::new(TidCell::new()),
            handle: Mutex::new(None),
        }
    }

    /// Launch the thread. `on_start` runs once before the loop; `body` runs
    /// repeatedly while [`ManagedThread::should_stop`] is false; `on_stop`
    /// runs once after the loop exits. Calling this a second time before
    /// [`ManagedThread::stop`] panics, since exactly one worker owns the
    /// stop flag and iteration counter.
    pub fn start<Body, OnStart, OnStop>(&self, mut body: Body, mut on_start: OnStart, mut on_stop: OnStop)
    where
        Body: FnMut(&ManagedThreadHandle) + Send + 'static,
        OnStart: FnMut() + Send + 'static,
        OnStop: FnMut() + Send + 'static,
    {
        let mut handle_slot = self.handle.lock().expect("managed thread lock poisoned");
        assert!(handle_slot.is_none(), "ManagedThread::start called twice");

        let stop = Arc::clone(&self.stop);
        let iterations = Arc::clone(&self.iterations);
        let tid = Arc::clone(&self.tid);

        let join_handle = std::thread::spawn(move || {
            tid.set(current_tid());

            on_start();

            let ctl = ManagedThreadHandle {
                stop: Arc::clone(&stop),
            };
            while !stop.load(Ordering::Acquire) {
                body(&ctl);
                iterations.fetch_add(1, Ordering::Relaxed);
            }

            on_stop();
        });

        *handle_slot = Some(join_handle);
    }

    /// Whether a stop has been requested. Cheap to call from the worker's
    /// own `body`/`sleep` or from any other thread.
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Request a stop and join the worker thread. Idempotent: calling this
    /// more than once, or before `start`, is a no-op beyond the first call.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        let handle = self.handle.lock().expect("managed thread lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Number of completed `body` calls so far.
    pub fn iterations(&self) -> usize {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Block until the worker thread has recorded its OS thread id, then
    /// return it. Only meaningful on unix targets; returns `None` elsewhere
    /// or if the thread was never started.
    pub fn tid(&self) -> Option<i32> {
        self.tid.get()
    }

    /// Best-effort: bind the worker thread to the given set of CPU cores.
    /// Must have been started. Reports failure rather than swallowing it.
    #[cfg(all(unix, feature = "utils"))]
    pub fn set_cpu_affinity(&self, cpus: impl IntoIterator<Item = usize>) -> nix::Result<()> {
        let tid = self.tid.get().expect("set_cpu_affinity called before thread started");
        let mut cpu_set = nix::sched::CpuSet::new();
        for cpu in cpus {
            cpu_set.set(cpu)?;
        }
        nix::sched::sched_setaffinity(nix::unistd::Pid::from_raw(tid), &cpu_set)
    }

    /// Best-effort: set the worker thread's real-time scheduling priority
    /// (`SCHED_FIFO`). Requires elevated privileges on most systems; reports
    /// failure rather than swallowing it.
    ///
    /// `nix::sched` does not wrap `sched_setscheduler`, so this calls
    /// through `libc` directly, same as the rest of this crate's affinity
    /// and tid plumbing.
    #[cfg(all(unix, feature = "utils"))]
    pub fn set_priority(&self, priority: i32) -> std::io::Result<()> {
        let tid = self.tid.get().expect("set_priority called before thread started");
        let param = libc::sched_param { sched_priority: priority };
        // SAFETY: `tid` was obtained from `current_tid()` on this process's
        // own worker thread; `param` is a valid, fully initialized value.
        let ret = unsafe { libc::sched_setscheduler(tid, libc::SCHED_FIFO, &param) };
        if ret != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle passed into the `body` closure so it can cooperatively sleep
/// without capturing the owning [`ManagedThread`] by reference.
#[derive(Clone)]
pub struct ManagedThreadHandle {
    stop: Arc<AtomicBool>,
}

impl ManagedThreadHandle {
    /// Whether a stop has been requested.
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Request a stop from within the worker's own `body`. The loop notices
    /// this on its next iteration check and exits after `body` returns;
    /// unlike [`ManagedThread::stop`], this never joins (the thread cannot
    /// join itself).
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Cooperative sleep: wakes early if a stop is requested. Implemented as
    /// repeated short sleeps so a stop is noticed within one chunk, with a
    /// final precise sleep for the remainder. Returns whether the sleep ran
    /// to completion (`false` means it was cut short by a stop request).
    pub fn sleep(&self, duration: Duration) -> bool {
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return true;
            }
            let remaining = duration - elapsed;
            if remaining <= SLEEP_CHUNK {
                if self.should_stop() {
                    return false;
                }
                std::thread::sleep(remaining);
                return true;
            }
            if self.should_stop() {
                return false;
            }
            std::thread::sleep(SLEEP_CHUNK);
        }
    }
}

#[cfg(unix)]
fn current_tid() -> i32 {
    // SAFETY: gettid has no preconditions and always succeeds.
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

#[cfg(not(unix))]
fn current_tid() -> i32 {
    0
}

struct TidCell {
    value: Mutex<Option<i32>>,
    ready: Condvar,
}

impl TidCell {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn set(&self, tid: i32) {
        *self.value.lock().expect("tid lock poisoned") = Some(tid);
        self.ready.notify_all();
    }

    fn get(&self) -> Option<i32> {
        self.value.lock().expect("tid lock poisoned").to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    #[test]
    fn runs_body_until_stopped() {
        let thread = ManagedThread::new();
        let count = Arc::new(StdAtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        thread.start(
            move |ctl| {
                count_clone.fetch_add(1, Ordering::Relaxed);
                ctl.sleep(Duration::from_millis(1));
            },
            || {},
            || {},
        );
        std::thread::sleep(Duration::from_millis(50));
        thread.stop();
        assert!(count.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn on_start_and_on_stop_run_exactly_once() {
        let thread = ManagedThread::new();
        let starts = Arc::new(StdAtomicUsize::new(0));
        let stops = Arc::new(StdAtomicUsize::new(0));
        let (s1, s2) = (Arc::clone(&starts), Arc::clone(&stops));
        thread.start(
            |ctl| {
                ctl.sleep(Duration::from_millis(1));
            },
            move || {
                s1.fetch_add(1, Ordering::Relaxed);
            },
            move || {
                s2.fetch_add(1, Ordering::Relaxed);
            },
        );
        std::thread::sleep(Duration::from_millis(20));
        thread.stop();
        assert_eq!(starts.load(Ordering::Relaxed), 1);
        assert_eq!(stops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sleep_returns_early_on_stop() {
        let thread = Arc::new(ManagedThread::new());
        let t2 = Arc::clone(&thread);
        thread.start(
            |ctl| {
                ctl.sleep(Duration::from_secs(10));
            },
            || {},
            || {},
        );
        std::thread::sleep(Duration::from_millis(20));
        let started = std::time::Instant::now();
        t2.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
