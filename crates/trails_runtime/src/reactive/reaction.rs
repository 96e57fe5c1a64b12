//! Side effects that re-run when the cells they read change.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::tracking::{Dependent, TrackedSource, TrackingScope};

#[derive(Default)]
struct RunState {
    running: bool,
    rerun: bool,
}

struct ReactionInner {
    this: Weak<ReactionInner>,
    body: Mutex<Box<dyn FnMut() + Send>>,
    sources: Mutex<Vec<TrackedSource>>,
    run_state: Mutex<RunState>,
    stopped: AtomicBool,
    runs: AtomicU64,
}

impl ReactionInner {
    fn run(&self) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        {
            let mut state = self.run_state.lock();
            if state.running {
                // A read cell changed while the body runs; go again afterwards.
                state.rerun = true;
                return;
            }
            state.running = true;
        }
        let _guard = RunGuard {
            state: &self.run_state,
        };

        loop {
            let dependent: Weak<dyn Dependent> = self.this.clone();
            let scope = TrackingScope::enter(dependent);
            {
                let mut body = self.body.lock();
                (*body)();
            }
            let sources = scope.finish();
            self.runs.fetch_add(1, Ordering::Relaxed);

            // Dropping the previous subscriptions unsubscribes from cells no longer read.
            let previous = core::mem::replace(&mut *self.sources.lock(), sources);
            drop(previous);

            let mut state = self.run_state.lock();
            if state.rerun && !self.stopped.load(Ordering::Acquire) {
                state.rerun = false;
                continue;
            }
            state.running = false;
            state.rerun = false;
            break;
        }

        if self.stopped.load(Ordering::Acquire) {
            self.sources.lock().clear();
        }
    }
}

/// Resets the run state if the body unwinds, so later changes run it again.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            *self.state.lock() = RunState::default();
        }
    }
}

impl Dependent for ReactionInner {
    fn notify(&self) {
        self.run();
    }
}

/// A tracked side effect.
///
/// The body runs once on creation. Every cell it reads through
/// [`ObservableCell::read()`](super::ObservableCell::read) becomes a
/// dependency; when one of them changes, the body runs again and its
/// dependencies are re-collected. Dropping the reaction (or calling
/// [`stop()`](Self::stop)) unsubscribes it.
///
/// A change observed while the body is running schedules one more run after
/// the current one instead of nesting.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use trails_runtime::reactive::{ObservableCell, Reaction};
///
/// let name = ObservableCell::new(String::from("world"));
/// let greeting = Arc::new(Mutex::new(String::new()));
///
/// let source = name.clone();
/// let target = Arc::clone(&greeting);
/// let _reaction = Reaction::new(move || {
///     *target.lock() = format!("hello {}", source.read());
/// });
/// assert_eq!(*greeting.lock(), "hello world");
///
/// name.write("trails".into());
/// assert_eq!(*greeting.lock(), "hello trails");
/// ```
pub struct Reaction {
    inner: Arc<ReactionInner>,
}

impl Reaction {
    /// Creates the reaction and runs `body` once.
    pub fn new(body: impl FnMut() + Send + 'static) -> Self {
        let inner = Arc::new_cyclic(|this| ReactionInner {
            this: this.clone(),
            body: Mutex::new(Box::new(body)),
            sources: Mutex::new(Vec::new()),
            run_state: Mutex::new(RunState::default()),
            stopped: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        });
        inner.run();
        Self { inner }
    }

    /// Returns how many times the body ran.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::Relaxed)
    }

    /// Returns the number of distinct cells read by the last run.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }

    /// Stops reacting and releases all subscriptions.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        let sources = core::mem::take(&mut *self.inner.sources.lock());
        drop(sources);
    }

    /// Returns `true` once [`stop()`](Self::stop) was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("runs", &self.run_count())
            .field("dependencies", &self.dependency_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ObservableCell, untracked};

    #[test]
    fn runs_once_on_creation() {
        let reaction = Reaction::new(|| {});
        assert_eq!(reaction.run_count(), 1);
        assert_eq!(reaction.dependency_count(), 0);
    }

    #[test]
    fn reruns_on_change_only() {
        let cell = ObservableCell::new(1);
        let source = cell.clone();
        let reaction = Reaction::new(move || {
            let _ = source.read();
        });

        cell.write(1);
        assert_eq!(reaction.run_count(), 1);
        cell.write(2);
        assert_eq!(reaction.run_count(), 2);
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let cell = ObservableCell::new(0);
        let source = cell.clone();
        let reaction = Reaction::new(move || {
            let _ = source.read();
            let _ = source.read();
        });

        assert_eq!(reaction.dependency_count(), 1);
        assert_eq!(cell.subscriber_count(), 1);
        cell.write(3);
        assert_eq!(reaction.run_count(), 2);
    }

    #[test]
    fn dependencies_follow_the_last_run() {
        let flag = ObservableCell::new(true);
        let a = ObservableCell::new(0);
        let b = ObservableCell::new(0);

        let (f, ra, rb) = (flag.clone(), a.clone(), b.clone());
        let reaction = Reaction::new(move || {
            if f.read() {
                let _ = ra.read();
            } else {
                let _ = rb.read();
            }
        });
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        flag.write(false);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        a.write(10);
        assert_eq!(reaction.run_count(), 2);
        b.write(10);
        assert_eq!(reaction.run_count(), 3);
    }

    #[test]
    fn untracked_reads_are_ignored() {
        let cell = ObservableCell::new(0);
        let source = cell.clone();
        let reaction = Reaction::new(move || {
            let _ = untracked(|| source.read());
        });

        cell.write(1);
        assert_eq!(reaction.run_count(), 1);
        assert_eq!(reaction.dependency_count(), 0);
    }

    #[test]
    fn drop_unsubscribes() {
        let cell = ObservableCell::new(0);
        let source = cell.clone();
        let reaction = Reaction::new(move || {
            let _ = source.read();
        });
        assert_eq!(cell.subscriber_count(), 1);

        drop(reaction);
        assert_eq!(cell.subscriber_count(), 0);
        cell.write(1);
    }

    #[test]
    fn self_write_settles() {
        let cell = ObservableCell::new(0);
        let source = cell.clone();
        let reaction = Reaction::new(move || {
            let value = source.read();
            if value < 3 {
                source.write(value + 1);
            }
        });

        assert_eq!(cell.read_untracked(), 3);
        assert_eq!(reaction.run_count(), 4);
    }

    #[test]
    fn panicking_body_does_not_wedge_the_reaction() {
        let cell = ObservableCell::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (source, sink) = (cell.clone(), Arc::clone(&seen));
        let reaction = Reaction::new(move || {
            let value = source.read();
            assert!(value != 1, "boom");
            sink.lock().push(value);
        });

        let writer = cell.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.write(1)));
        assert!(result.is_err());

        cell.write(2);
        assert_eq!(*seen.lock(), [0, 2]);
        assert_eq!(reaction.run_count(), 2);
        assert_eq!(cell.subscriber_count(), 1);
    }
}
