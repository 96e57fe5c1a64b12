//! Application assembly and startup.
//!
//! An [`Application`] is a list of packages plus application-level property
//! overrides. [`start()`](Application::start) runs the package lifecycle and
//! returns the constructed [`Container`]:
//!
//! 1. **Validation** - package names must be unique
//! 2. **Build Phase** - each package's properties are customized and its
//!    services registered, in the order the packages were added
//! 3. **Construction** - the registry resolves, orders and constructs services
//! 4. **Ready Phase** - `Package::ready()` runs in package order
//!
//! ```
//! use serde_json::json;
//! use trails_runtime::application::Application;
//! use trails_runtime::package::ManifestPackage;
//! use trails_runtime::service::Service;
//!
//! struct Banner(String);
//! impl Service for Banner {}
//!
//! let package = ManifestPackage::from_json(
//!     r#"{
//!         "name": "banner",
//!         "services": { "banner.BannerImpl": { "provides": "banner.Banner" } },
//!         "properties": { "text": "default" }
//!     }"#,
//! )?
//! .with_factory("banner.BannerImpl", |options| {
//!     Ok(Banner(options.properties.get("text")?))
//! });
//!
//! let container = Application::new()
//!     .add_packages(package)
//!     .with_properties("banner", json!({ "text": "custom" }).as_object().cloned().unwrap_or_default())
//!     .start()?;
//!
//! assert_eq!(container.get_as::<Banner>("banner.Banner")?.0, "custom");
//! # Ok::<(), trails_runtime::error::ContainerError>(())
//! ```

use hashbrown::HashSet;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::container::Container;
use crate::error::ContainerError;
use crate::package::{BoxedPackage, Package, PackageId, Packages};
use crate::registry::ServiceRegistry;

/// Property overrides for one package.
pub type PropertyOverrides = Map<String, Value>;

/// The set of packages making up an application.
#[derive(Default)]
pub struct Application {
    /// Packages in the order they were added.
    packages: Vec<BoxedPackage>,

    /// Package name → property overrides.
    overrides: IndexMap<String, PropertyOverrides>,
}

impl Application {
    /// Creates an application without packages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a package or a [`PackageGroupBuilder`](crate::package::PackageGroupBuilder).
    #[must_use]
    pub fn add_packages<P: Packages>(mut self, packages: P) -> Self {
        packages.add_to_application(&mut self);
        self
    }

    pub(crate) fn add_package_boxed(&mut self, package: BoxedPackage) {
        tracing::debug!(package = package.package.name(), "package added");
        self.packages.push(package);
    }

    /// Returns true if a package of type `P` was added.
    #[must_use]
    pub fn has_package<P: Package>(&self) -> bool {
        let id = PackageId::of::<P>();
        self.packages.iter().any(|p| p.id == id)
    }

    /// Returns the package names in the order they were added.
    #[must_use]
    pub fn package_names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.package.name()).collect()
    }

    /// Overrides properties of the package named `package`.
    ///
    /// Calling this again for the same package merges the overrides, later
    /// values winning. Keys are validated by [`start()`](Self::start).
    #[must_use]
    pub fn with_properties(mut self, package: impl Into<String>, properties: PropertyOverrides) -> Self {
        self.overrides
            .entry(package.into())
            .or_default()
            .extend(properties);
        self
    }

    /// Reads overrides from a JSON object of the form
    /// `{ "<package>": { "<property>": <value> } }`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Manifest`] if the document is malformed.
    pub fn properties_from_json(self, json: &str) -> Result<Self, ContainerError> {
        let parsed: IndexMap<String, PropertyOverrides> = serde_json::from_str(json)?;
        Ok(parsed
            .into_iter()
            .fold(self, |app, (package, properties)| {
                app.with_properties(package, properties)
            }))
    }

    /// Builds every package and constructs the container.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::DuplicatePackage`] if two packages share a name
    /// - [`ContainerError::UnknownProperty`] if an override names a property
    ///   the package does not declare
    /// - any error of a package's `build()` or `ready()`
    /// - any error of [`ServiceRegistry::build()`]
    pub fn start(self) -> Result<Container, ContainerError> {
        let mut names: HashSet<&str> = HashSet::with_capacity(self.packages.len());
        for boxed in &self.packages {
            let name = boxed.package.name();
            if !names.insert(name) {
                return Err(ContainerError::DuplicatePackage(name.to_owned()));
            }
        }
        for package in self.overrides.keys() {
            if !names.contains(package.as_str()) {
                tracing::warn!(package = %package, "properties configured for unknown package");
            }
        }

        tracing::info!(packages = self.packages.len(), "starting application");

        let mut registry = ServiceRegistry::new();
        for boxed in &self.packages {
            let name = boxed.package.name();
            let mut properties = boxed.package.properties();
            if let Some(overrides) = self.overrides.get(name) {
                properties.customize(name, overrides)?;
            }
            registry.set_package_properties(name, properties);

            registry.enter_package(name);
            let built = boxed.package.build(&mut registry);
            registry.leave_package();
            built?;

            tracing::debug!(package = name, "package built");
        }

        let mut container = registry.build()?;

        for boxed in &self.packages {
            if let Err(error) = boxed.package.ready(&container) {
                tracing::error!(package = boxed.package.name(), %error, "package failed to get ready");
                if let Err(teardown) = container.dispose() {
                    tracing::warn!(%teardown, "teardown after failed start reported errors");
                }
                return Err(error);
            }
        }

        Ok(container)
    }
}

impl core::fmt::Debug for Application {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Application")
            .field("packages", &self.package_names())
            .field("overrides", &self.overrides)
            .finish()
    }
}
