//! Reactive state for services.
//!
//! An [`ObservableCell`] holds one value and notifies subscribers
//! synchronously when a write changes it. A [`Reaction`] is a side effect
//! that records which cells it reads and re-runs when any of them changes.
//!
//! Services expose state by handing out cells (or clones of their values);
//! consumers either [`subscribe`](ObservableCell::subscribe) explicitly or read
//! inside a reaction.
//!
//! ```
//! use trails_runtime::reactive::{ObservableCell, Reaction};
//!
//! let count = ObservableCell::new(0_u32);
//! let doubled = ObservableCell::new(0_u32);
//!
//! let (source, target) = (count.clone(), doubled.clone());
//! let _mirror = Reaction::new(move || target.write(source.read() * 2));
//!
//! count.write(21);
//! assert_eq!(doubled.read(), 42);
//! ```

mod cell;
mod reaction;
mod tracking;

pub use cell::{ObservableCell, Subscription};
pub use reaction::Reaction;
pub use tracking::{TrackingScope, is_tracking, untracked};
