//! Thread-local dependency tracking.
//!
//! A tracked computation runs inside a [`TrackingScope`]. Every
//! [`ObservableCell`](super::ObservableCell) read while the scope is the
//! innermost one subscribes the computation to that cell. Scopes nest with
//! strict push/pop discipline; the guard pops its frame when dropped, so a
//! panicking computation cannot leave a stale frame behind.

use core::cell::RefCell;
use core::marker::PhantomData;
use std::rc::Rc;
use std::sync::Weak;

use super::cell::Subscription;

/// Something that re-runs when a cell it read changes.
pub(crate) trait Dependent: Send + Sync {
    /// Called synchronously from a cell's notification pass.
    fn notify(&self);
}

/// A subscription created by a tracked read, keyed by the source cell.
pub(crate) struct TrackedSource {
    pub(crate) source: usize,
    #[expect(dead_code, reason = "dropping it unsubscribes from the source")]
    pub(crate) subscription: Subscription,
}

struct Frame {
    dependent: Weak<dyn Dependent>,
    sources: RefCell<Vec<TrackedSource>>,
}

thread_local! {
    /// `None` entries suspend tracking (see [`untracked`]).
    static SCOPES: RefCell<Vec<Option<Rc<Frame>>>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for an active tracking frame.
///
/// Not `Send`: a scope belongs to the thread that entered it.
pub struct TrackingScope {
    frame: Option<Rc<Frame>>,
    popped: bool,
    _not_send: PhantomData<*const ()>,
}

impl TrackingScope {
    /// Enters a frame recording reads on behalf of `dependent`.
    pub(crate) fn enter(dependent: Weak<dyn Dependent>) -> Self {
        let frame = Rc::new(Frame {
            dependent,
            sources: RefCell::new(Vec::new()),
        });
        SCOPES.with(|scopes| scopes.borrow_mut().push(Some(Rc::clone(&frame))));
        Self {
            frame: Some(frame),
            popped: false,
            _not_send: PhantomData,
        }
    }

    /// Enters a frame that suspends tracking until dropped.
    #[must_use]
    pub fn suspend() -> Self {
        SCOPES.with(|scopes| scopes.borrow_mut().push(None));
        Self {
            frame: None,
            popped: false,
            _not_send: PhantomData,
        }
    }

    /// Leaves the frame and returns the subscriptions collected in it.
    pub(crate) fn finish(mut self) -> Vec<TrackedSource> {
        self.pop();
        self.frame
            .take()
            .map(|frame| frame.sources.take())
            .unwrap_or_default()
    }

    fn pop(&mut self) {
        if !self.popped {
            self.popped = true;
            SCOPES.with(|scopes| {
                scopes.borrow_mut().pop();
            });
        }
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        self.pop();
    }
}

/// Returns `true` if a read right now would be tracked.
#[must_use]
pub fn is_tracking() -> bool {
    SCOPES.with(|scopes| matches!(scopes.borrow().last(), Some(Some(_))))
}

/// Runs `f` without recording any reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _scope = TrackingScope::suspend();
    f()
}

/// Records a read of `source` in the innermost frame.
///
/// `subscribe` is only called the first time a frame sees `source`.
pub(crate) fn record_read(
    source: usize,
    subscribe: impl FnOnce(Weak<dyn Dependent>) -> Subscription,
) {
    let frame = SCOPES.with(|scopes| scopes.borrow().last().cloned().flatten());
    let Some(frame) = frame else {
        return;
    };

    if frame.sources.borrow().iter().any(|s| s.source == source) {
        return;
    }
    let subscription = subscribe(frame.dependent.clone());
    frame.sources.borrow_mut().push(TrackedSource {
        source,
        subscription,
    });
}
