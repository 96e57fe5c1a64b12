//! Core infrastructure packages for Trails.
//!
//! This crate provides packages most Trails applications need:
//!
//! - [`TracingPackage`] - Logging and observability via the `tracing` crate
//! - [`NotifierPackage`] - User notifications held in an observable cell
//! - [`AuthPackage`] - Authentication state on top of a pluggable mechanism
//! - [`CorePackages`] - Bundle of tracing and notifier
//!
//! # Example
//!
//! ```
//! use trails_core_packages::{CorePackages, NotifierInterface, TracingConfig};
//! use trails_runtime::application::Application;
//! use trails_runtime::package::PackageGroup;
//!
//! let container = Application::new()
//!     .add_packages(CorePackages.build())
//!     .start()?;
//!
//! assert!(container.resolve::<NotifierInterface>().is_ok());
//! assert!(container.get_as::<TracingConfig>(TracingConfig::INTERFACE).is_ok());
//! # Ok::<(), trails_runtime::error::ContainerError>(())
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`trails_runtime`): registry, container and reactive state
//! - **Layer 2** (`trails_core_packages`): infrastructure packages (this crate)

mod auth;
mod notifier;
mod tracing_package;

pub use auth::{
    AuthError, AuthPackage, AuthPlugin, AuthPluginInterface, AuthService, AuthServiceInterface,
    AuthState, SessionInfo,
};
pub use notifier::{
    Notification, NotificationLevel, NotificationOptions, NotificationService, Notifier,
    NotifierInterface, NotifierPackage,
};
pub use tracing_package::{TracingConfig, TracingFormat, TracingPackage};

use trails_runtime::package::{PackageGroup, PackageGroupBuilder};

/// Default packages for most applications.
///
/// Includes:
/// - [`TracingPackage`] - Logging and observability
/// - [`NotifierPackage`] - User notifications
///
/// [`AuthPackage`] is not included: it needs an `authentication.AuthPlugin`
/// from the application.
///
/// # Customization
///
/// ```ignore
/// Application::new()
///     .add_packages(CorePackages.build().disable::<TracingPackage>())
///     .start()?;
/// ```
pub struct CorePackages;

impl PackageGroup for CorePackages {
    fn build(self) -> PackageGroupBuilder {
        PackageGroupBuilder::new()
            .add(TracingPackage::default())
            .add(NotifierPackage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_packages_builds() {
        let builder = CorePackages.build();
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.names(), ["tracing", "notifier"]);
    }

    #[test]
    fn core_packages_without_tracing() {
        let builder = CorePackages.build().disable::<TracingPackage>();
        assert_eq!(builder.names(), ["notifier"]);
    }
}
