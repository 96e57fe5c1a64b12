//! Packages: the unit of composition of an application.
//!
//! A package contributes service descriptors to the [`ServiceRegistry`] and
//! declares the properties its services accept. Applications are assembled by
//! adding packages to an [`Application`].
//!
//! # Example
//!
//! ```
//! use trails_runtime::application::Application;
//! use trails_runtime::error::ContainerError;
//! use trails_runtime::package::Package;
//! use trails_runtime::properties::Properties;
//! use trails_runtime::registry::{ServiceDescriptor, ServiceRegistry};
//! use trails_runtime::service::Service;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//! impl Service for Greeter {}
//!
//! struct GreeterPackage;
//!
//! impl Package for GreeterPackage {
//!     fn name(&self) -> &str {
//!         "greeter"
//!     }
//!
//!     fn properties(&self) -> Properties {
//!         Properties::new().with("greeting", "hello")
//!     }
//!
//!     fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError> {
//!         registry.register([ServiceDescriptor::new("greeter.GreeterImpl", |options| {
//!             Ok(Greeter {
//!                 greeting: options.properties.get("greeting")?,
//!             })
//!         })
//!         .provides("greeter.Greeter")])?;
//!         Ok(())
//!     }
//! }
//!
//! let container = Application::new().add_packages(GreeterPackage).start()?;
//! let greeter = container.get_as::<Greeter>("greeter.Greeter")?;
//! assert_eq!(greeter.greeting, "hello");
//! # Ok::<(), ContainerError>(())
//! ```

mod manifest_package;

pub use manifest_package::ManifestPackage;

use core::any::TypeId;

use crate::application::Application;
use crate::container::Container;
use crate::error::ContainerError;
use crate::properties::Properties;
use crate::registry::ServiceRegistry;

// ─────────────────────────────────────────────────────────────────────────────
// PackageId
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of a package type.
///
/// Used by [`PackageGroupBuilder`] to address packages by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PackageId {
    /// Creates a `PackageId` for the given package type.
    #[must_use]
    pub fn of<P: Package>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Package Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A set of services and their configurable properties.
///
/// Packages go through two phases during [`Application::start()`]:
///
/// 1. **Build Phase** - `build()` registers descriptors, in the order the
///    packages were added
/// 2. **Ready Phase** - `ready()` runs once every service is constructed
///
/// Package names must be unique within an application.
pub trait Package: Send + Sync + 'static {
    /// Registers the package's services.
    ///
    /// Descriptors registered here are attributed to this package and receive
    /// its (customized) properties.
    ///
    /// # Errors
    ///
    /// Registration errors are propagated and abort the start.
    fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError>;

    /// Called after the container is constructed.
    ///
    /// # Errors
    ///
    /// An error disposes the container and aborts the start.
    fn ready(&self, _container: &Container) -> Result<(), ContainerError> {
        Ok(())
    }

    /// Returns the package name, used for properties and diagnostics.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Declares the properties the package's services accept, with defaults.
    ///
    /// Only declared keys can be customized by the application.
    fn properties(&self) -> Properties {
        Properties::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Packages Trait (for add_packages polymorphism)
// ─────────────────────────────────────────────────────────────────────────────

/// Types that can be added to an [`Application`]: single packages or a
/// [`PackageGroupBuilder`].
pub trait Packages {
    /// Adds these packages to the application.
    fn add_to_application(self, app: &mut Application);
}

impl<P: Package> Packages for P {
    fn add_to_application(self, app: &mut Application) {
        app.add_package_boxed(BoxedPackage {
            id: PackageId::of::<P>(),
            package: Box::new(self),
        });
    }
}

impl Packages for PackageGroupBuilder {
    fn add_to_application(self, app: &mut Application) {
        for boxed in self.packages {
            app.add_package_boxed(boxed);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PackageGroup
// ─────────────────────────────────────────────────────────────────────────────

/// A bundle of packages added together.
///
/// ```ignore
/// pub struct CorePackages;
///
/// impl PackageGroup for CorePackages {
///     fn build(self) -> PackageGroupBuilder {
///         PackageGroupBuilder::new()
///             .add(TracingPackage::default())
///             .add(NotifierPackage)
///     }
/// }
///
/// Application::new()
///     .add_packages(CorePackages.build().disable::<TracingPackage>())
///     .start()?;
/// ```
pub trait PackageGroup {
    /// Returns the packages in this group.
    fn build(self) -> PackageGroupBuilder;
}

/// A boxed package with its captured [`PackageId`].
pub(crate) struct BoxedPackage {
    pub(crate) id: PackageId,
    pub(crate) package: Box<dyn Package>,
}

/// Builder for customizing package groups.
#[derive(Default)]
pub struct PackageGroupBuilder {
    packages: Vec<BoxedPackage>,
}

impl PackageGroupBuilder {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a package to the end of the group.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Package>(mut self, package: P) -> Self {
        self.packages.push(boxed(package));
        self
    }

    /// Adds a package before `Target`, or at the beginning if `Target` is absent.
    #[must_use]
    pub fn add_before<P: Package, Target: Package>(mut self, package: P) -> Self {
        let position = self.position_of::<Target>().unwrap_or(0);
        self.packages.insert(position, boxed(package));
        self
    }

    /// Adds a package after `Target`, or at the end if `Target` is absent.
    #[must_use]
    pub fn add_after<P: Package, Target: Package>(mut self, package: P) -> Self {
        let position = self
            .position_of::<Target>()
            .map_or(self.packages.len(), |i| i + 1);
        self.packages.insert(position, boxed(package));
        self
    }

    /// Removes every package of type `P`. No-op if there is none.
    #[must_use]
    pub fn disable<P: Package>(mut self) -> Self {
        let id = PackageId::of::<P>();
        self.packages.retain(|p| p.id != id);
        self
    }

    /// Returns `true` if the group contains a package of type `P`.
    #[must_use]
    pub fn contains<P: Package>(&self) -> bool {
        self.position_of::<P>().is_some()
    }

    /// Returns the package names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.package.name()).collect()
    }

    /// Returns the number of packages in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if the group contains no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn position_of<P: Package>(&self) -> Option<usize> {
        let id = PackageId::of::<P>();
        self.packages.iter().position(|p| p.id == id)
    }
}

fn boxed<P: Package>(package: P) -> BoxedPackage {
    BoxedPackage {
        id: PackageId::of::<P>(),
        package: Box::new(package),
    }
}
