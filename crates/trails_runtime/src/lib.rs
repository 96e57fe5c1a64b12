//! The service runtime of Trails (Layer 1).
//!
//! `trails_runtime` provides the primitives applications are assembled from:
//!
//! - [`service`] - Service trait, identifiers, instances and typed views
//! - [`manifest`] - Declarative service and package manifests
//! - [`registry`] - Service registration and container construction
//! - [`graph`] - Dependency graph resolution and ordering
//! - [`container`] - Lookup of constructed services and teardown
//! - [`package`] - Packages contributing services and properties
//! - [`application`] - Application assembly and startup
//! - [`reactive`] - Observable cells and reactions
//!
//! # Architecture
//!
//! - **Layer 1** (`trails_runtime`): registry, container and reactive state (this crate)
//! - **Layer 2** (`trails_core_packages`): infrastructure packages built on it
//!
//! # Example
//!
//! ```
//! use trails_runtime::prelude::*;
//!
//! struct Logger;
//! impl Service for Logger {}
//!
//! struct Http {
//!     logger: std::sync::Arc<Logger>,
//! }
//! impl Service for Http {}
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register([
//!     ServiceDescriptor::new("HttpImpl", |options| {
//!         Ok(Http { logger: options.references.get_as::<Logger>("logger")? })
//!     })
//!     .provides("http.Client")
//!     .reference("logger", "core.Logger"),
//!     ServiceDescriptor::new("LoggerImpl", |_| Ok(Logger)).provides("core.Logger"),
//! ])?;
//!
//! let container = registry.build()?;
//! let order: Vec<&str> = container
//!     .construction_order()
//!     .into_iter()
//!     .map(ServiceId::as_str)
//!     .collect();
//! assert_eq!(order, ["LoggerImpl", "HttpImpl"]);
//! # Ok::<(), ContainerError>(())
//! ```

/// Application assembly and startup.
pub mod application;

/// Lookup of constructed services and teardown.
pub mod container;

/// Error types.
pub mod error;

/// Dependency graph resolution and ordering.
pub mod graph;

/// Declarative manifests.
pub mod manifest;

/// Factory inputs: resolved references and properties.
pub mod options;

/// Packages contributing services.
pub mod package;

/// Package properties.
pub mod properties;

/// Observable cells and reactions.
pub mod reactive;

/// Service registration.
pub mod registry;

/// Services and handles.
pub mod service;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::application::*;
    pub use crate::container::*;
    pub use crate::error::*;
    pub use crate::graph::*;
    pub use crate::manifest::*;
    pub use crate::options::*;
    pub use crate::package::*;
    pub use crate::properties::*;
    pub use crate::reactive::*;
    pub use crate::registry::*;
    pub use crate::service::*;
}
