//! A plugin base that runs `should_skip` / `one_iteration` on a
//! [`ManagedThread`] until stopped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::thread::managed::ManagedThread;

/// What the loop should do on this pass, returned by [`Threadloop::should_skip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOption {
    /// Call `one_iteration` now.
    Run,
    /// Give up a scheduling quantum and try again later.
    SkipAndYield,
    /// Try again immediately (busy-wait).
    SkipAndSpin,
    /// Request termination.
    Stop,
}

/// The logic a threadloop plugin supplies. Runs entirely on the loop's own
/// worker thread, so implementors do not need `Sync`.
pub trait Threadloop: Send {
    /// Gate `one_iteration`. Defaults to always running.
    fn should_skip(&mut self) -> SkipOption {
        SkipOption::Run
    }

    /// One pass of the plugin's work. Called in rapid succession.
    fn one_iteration(&mut self);

    /// One-time setup performed on the worker thread before the first
    /// `should_skip` call, for state that must be constructed there (e.g.
    /// thread-affine resources).
    fn thread_setup(&mut self) {}
}

/// Owns the [`ManagedThread`] running a [`Threadloop`]'s logic, plus the
/// iteration and skip counters named in this component's per-iteration log
/// records.
///
/// The source increments its iteration counter twice on the `run` path
/// (once unconditionally at the top of the loop, once again after
/// `_p_one_iteration`); this is treated as a bug in the source rather than
/// reproduced. Here `iteration_count` increments exactly once per completed
/// `one_iteration` call.
pub struct ThreadloopHandle {
    thread: ManagedThread,
    iteration_count: Arc<AtomicUsize>,
    skip_count: Arc<AtomicUsize>,
}

impl ThreadloopHandle {
    /// Construct and start a worker thread running `logic` until stopped.
    pub fn start<T>(mut logic: T) -> Self
    where
        T: Threadloop + 'static,
    {
        let thread = ManagedThread::new();
        let iteration_count = Arc::new(AtomicUsize::new(0));
        let skip_count = Arc::new(AtomicUsize::new(0));
        let iteration_count_body = Arc::clone(&iteration_count);
        let skip_count_body = Arc::clone(&skip_count);

        let mut first_time = true;
        thread.start(
            move |ctl| {
                if first_time {
                    logic.thread_setup();
                    first_time = false;
                }
                match logic.should_skip() {
                    SkipOption::Run => {
                        logic.one_iteration();
                        iteration_count_body.fetch_add(1, Ordering::Relaxed);
                        skip_count_body.store(0, Ordering::Relaxed);
                    }
                    SkipOption::SkipAndSpin => {
                        skip_count_body.fetch_add(1, Ordering::Relaxed);
                    }
                    SkipOption::SkipAndYield => {
                        skip_count_body.fetch_add(1, Ordering::Relaxed);
                        std::thread::yield_now();
                    }
                    SkipOption::Stop => ctl.request_stop(),
                }
            },
            || {},
            || {},
        );

        Self {
            thread,
            iteration_count,
            skip_count,
        }
    }

    /// Request a stop and join the worker thread.
    pub fn stop(&self) {
        self.thread.stop();
    }

    /// Number of completed `one_iteration` calls so far.
    pub fn iteration_count(&self) -> usize {
        self.iteration_count.load(Ordering::Relaxed)
    }

    /// Number of consecutive skips since the last completed iteration.
    pub fn skip_count(&self) -> usize {
        self.skip_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::time::Duration;

    struct CountToThree {
        count: Arc<StdAtomicUsize>,
    }

    impl Threadloop for CountToThree {
        fn should_skip(&mut self) -> SkipOption {
            if self.count.load(Ordering::Relaxed) >= 3 {
                SkipOption::SkipAndYield
            } else {
                SkipOption::Run
            }
        }

        fn one_iteration(&mut self) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn runs_until_gated_by_should_skip() {
        let count = Arc::new(StdAtomicUsize::new(0));
        let handle = ThreadloopHandle::start(CountToThree { count: Arc::clone(&count) });
        std::thread::sleep(Duration::from_millis(50));
        handle.stop();
        assert_eq!(count.load(Ordering::Relaxed), 3);
        assert_eq!(handle.iteration_count(), 3);
    }

    struct Stopper {
        iterations: Arc<StdAtomicUsize>,
    }

    impl Threadloop for Stopper {
        fn should_skip(&mut self) -> SkipOption {
            if self.iterations.load(Ordering::Relaxed) >= 2 {
                SkipOption::Stop
            } else {
                SkipOption::Run
            }
        }

        fn one_iteration(&mut self) {
            self.iterations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn stop_option_leads_to_no_further_iterations_after_join() {
        let iterations = Arc::new(StdAtomicUsize::new(0));
        let handle = ThreadloopHandle::start(Stopper {
            iterations: Arc::clone(&iterations),
        });
        std::thread::sleep(Duration::from_millis(100));
        handle.stop();
        let final_count = iterations.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(iterations.load(Ordering::Relaxed), final_count);
    }
}
