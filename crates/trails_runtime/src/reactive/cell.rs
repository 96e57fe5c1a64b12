//! The observable cell.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::tracking::{self, Dependent};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A pending change. Returns `true` if it changed the value.
type Mutation<T> = Box<dyn FnOnce(&mut T) -> bool + Send>;

struct Subscriber<T> {
    id: u64,
    callback: Callback<T>,
}

struct CellState<T> {
    value: T,
    version: u64,
}

/// Queue-and-drain state of the notification pass.
struct PassState<T> {
    notifying: bool,
    queue: VecDeque<Mutation<T>>,
}

struct CellInner<T> {
    state: Mutex<CellState<T>>,
    subscribers: Mutex<Vec<Subscriber<T>>>,
    pass: Mutex<PassState<T>>,
    next_id: AtomicU64,
}

/// Type-erased subscriber removal, so [`Subscription`] is not generic.
trait SubscriberList: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

impl<T: Send + 'static> SubscriberList for CellInner<T> {
    fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().retain(|s| s.id != id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a cell subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    source: Weak<dyn SubscriberList>,
    id: u64,
}

impl Subscription {
    /// Unsubscribes explicitly. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ObservableCell
// ─────────────────────────────────────────────────────────────────────────────

/// A single reactive value.
///
/// Clones share the same value and subscribers.
///
/// # Notification
///
/// A [`write()`](Self::write) that changes the value notifies every subscriber
/// registered at that moment exactly once, in subscription order, before it
/// returns. Writing an equal value does nothing. A write issued from inside a
/// notification pass of the same cell is queued; the running pass applies it
/// once the current round of callbacks finished and starts a fresh round.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use trails_runtime::reactive::ObservableCell;
///
/// let cell = ObservableCell::new(1);
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&seen);
/// let _subscription = cell.subscribe(move |value: &i32| {
///     counter.store(*value as usize, Ordering::SeqCst);
/// });
///
/// cell.write(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// assert_eq!(cell.read(), 5);
/// ```
pub struct ObservableCell<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> ObservableCell<T> {
    /// Creates a cell holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                state: Mutex::new(CellState { value, version: 0 }),
                subscribers: Mutex::new(Vec::new()),
                pass: Mutex::new(PassState {
                    notifying: false,
                    queue: VecDeque::new(),
                }),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the current value, registering the enclosing tracked
    /// computation (if any) as a dependent.
    #[must_use]
    pub fn read(&self) -> T {
        self.track();
        self.read_untracked()
    }

    /// Returns the current value without registering a dependent.
    #[must_use]
    pub fn read_untracked(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Returns how many writes changed the value so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.state.lock().version
    }

    /// Replaces the value.
    pub fn write(&self, value: T) {
        self.apply(Box::new(move |current: &mut T| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        }));
    }

    /// Mutates the value in place. Notifies only if the result differs.
    ///
    /// `f` runs while the value is locked and must not access this cell.
    pub fn update(&self, f: impl FnOnce(&mut T) + Send + 'static) {
        self.apply(Box::new(move |current: &mut T| {
            let before = current.clone();
            f(current);
            *current != before
        }));
    }

    /// Registers `callback`, called with the new value after each change.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        let source = Arc::downgrade(&self.inner);
        let source: Weak<dyn SubscriberList> = source;
        Subscription { source, id }
    }

    /// Returns the number of live subscriptions, tracked reads included.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn track(&self) {
        let source = Arc::as_ptr(&self.inner).cast::<()>() as usize;
        tracking::record_read(source, |dependent| self.subscribe_dependent(dependent));
    }

    fn subscribe_dependent(&self, dependent: Weak<dyn Dependent>) -> Subscription {
        self.subscribe(move |_: &T| {
            if let Some(dependent) = dependent.upgrade() {
                dependent.notify();
            }
        })
    }

    fn apply(&self, mutation: Mutation<T>) {
        {
            let mut pass = self.inner.pass.lock();
            pass.queue.push_back(mutation);
            if pass.notifying {
                // The active pass drains the queue.
                return;
            }
            pass.notifying = true;
        }

        let _guard = PassGuard {
            pass: &self.inner.pass,
        };

        loop {
            let next = {
                let mut pass = self.inner.pass.lock();
                let next = pass.queue.pop_front();
                if next.is_none() {
                    pass.notifying = false;
                }
                next
            };
            let Some(mutation) = next else {
                break;
            };

            let value = {
                let mut state = self.inner.state.lock();
                if !mutation(&mut state.value) {
                    continue;
                }
                state.version += 1;
                state.value.clone()
            };

            // Snapshot: subscribers added or removed by callbacks take effect next pass.
            let callbacks: Vec<Callback<T>> = self
                .inner
                .subscribers
                .lock()
                .iter()
                .map(|s| Arc::clone(&s.callback))
                .collect();

            for callback in callbacks {
                callback(&value);
            }
        }
    }
}

impl<T: Clone + PartialEq + Send + Default + 'static> Default for ObservableCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + Send + fmt::Debug + 'static> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCell")
            .field("value", &self.read_untracked())
            .field("version", &self.version())
            .finish()
    }
}

/// Resets the pass state if a callback panics, so later writes still notify.
struct PassGuard<'a, T> {
    pass: &'a Mutex<PassState<T>>,
}

impl<T> Drop for PassGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut pass = self.pass.lock();
            pass.notifying = false;
            pass.queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&i32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move |_: &i32| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn equal_write_is_a_noop() {
        let cell = ObservableCell::new(1);
        let (count, callback) = counter();
        let _sub = cell.subscribe(callback);

        cell.write(2);
        cell.write(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn update_notifies_only_on_change() {
        let cell = ObservableCell::new(vec![1, 2]);
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        let _sub = cell.subscribe(move |_: &Vec<i32>| {
            handle.fetch_add(1, Ordering::SeqCst);
        });

        cell.update(|v| v.push(3));
        cell.update(|v| v.sort());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.read(), vec![1, 2, 3]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let cell = ObservableCell::new(0);
        let (count, callback) = counter();
        let sub = cell.subscribe(callback);
        assert_eq!(cell.subscriber_count(), 1);

        cell.write(1);
        drop(sub);
        cell.write(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn subscription_outliving_cell_is_harmless() {
        let cell = ObservableCell::new(0);
        let (_count, callback) = counter();
        let sub = cell.subscribe(callback);
        drop(cell);
        sub.unsubscribe();
    }

    #[test]
    fn clones_share_state() {
        let a = ObservableCell::new(String::from("x"));
        let b = a.clone();
        b.write("y".into());
        assert_eq!(a.read(), "y");
    }

    #[test]
    fn panicking_subscriber_does_not_wedge_the_cell() {
        let cell = ObservableCell::new(0);
        let _boom = cell.subscribe(|value: &i32| {
            assert!(*value != 1, "boom");
        });

        let writer = cell.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.write(1)));
        assert!(result.is_err());

        let (count, callback) = counter();
        let _sub = cell.subscribe(callback);
        cell.write(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
