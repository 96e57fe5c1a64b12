//! # Trails Internal Library
//!
//! Re-exports the core Trails crates for convenience.

/// Layer 1: Service registry, container and reactive cells.
pub use trails_runtime;

/// Layer 2: Infrastructure packages.
#[cfg(feature = "core_packages")]
pub use trails_core_packages;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use trails_runtime::prelude::*;

    #[cfg(feature = "core_packages")]
    pub use trails_core_packages::{
        AuthPackage, AuthPlugin, AuthService, AuthState, CorePackages, NotificationLevel,
        NotificationOptions, Notifier, NotifierPackage, SessionInfo, TracingPackage,
    };
}
