//! A modular application runtime: packages declare services, a container
//! wires them, and observable cells keep them in sync.
//!
//! ```
//! use trails::prelude::*;
//!
//! let container = Application::new()
//!     .add_packages(CorePackages.build().disable::<TracingPackage>())
//!     .start()?;
//! assert!(!container.is_empty());
//! # Ok::<(), ContainerError>(())
//! ```

pub use trails_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use trails_internal::prelude::*;
}
