//! Packages declared by a JSON manifest.

use std::sync::Arc;

use hashbrown::HashMap;

use super::Package;
use crate::error::{ContainerError, ServiceError};
use crate::manifest::PackageManifest;
use crate::options::ServiceOptions;
use crate::properties::Properties;
use crate::registry::{ServiceDescriptor, ServiceFactory, ServiceRegistry};
use crate::service::{Service, ServiceInstance};

/// A package whose services are declared in a [`PackageManifest`] and whose
/// factories are bound in code.
///
/// # Example
///
/// ```
/// use trails_runtime::application::Application;
/// use trails_runtime::package::ManifestPackage;
/// use trails_runtime::service::Service;
///
/// struct Clock;
/// impl Service for Clock {}
///
/// let package = ManifestPackage::from_json(
///     r#"{ "name": "clock", "services": { "clock.ClockImpl": { "provides": "clock.Clock" } } }"#,
/// )?
/// .with_factory("clock.ClockImpl", |_| Ok(Clock));
///
/// let container = Application::new().add_packages(package).start()?;
/// assert!(container.get_as::<Clock>("clock.Clock").is_ok());
/// # Ok::<(), trails_runtime::error::ContainerError>(())
/// ```
pub struct ManifestPackage {
    manifest: PackageManifest,
    factories: HashMap<String, ServiceFactory>,
}

impl ManifestPackage {
    /// Wraps an already parsed manifest.
    #[must_use]
    pub fn new(manifest: PackageManifest) -> Self {
        Self {
            manifest,
            factories: HashMap::new(),
        }
    }

    /// Parses the manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Manifest`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, ContainerError> {
        Ok(Self::new(PackageManifest::from_json(json)?))
    }

    /// Binds a factory returning a plain service value to a declared service.
    #[must_use]
    pub fn with_factory<S, F>(self, service: impl Into<String>, factory: F) -> Self
    where
        S: Service,
        F: Fn(ServiceOptions) -> Result<S, ServiceError> + Send + Sync + 'static,
    {
        self.with_instance_factory(service, move |options| {
            factory(options).map(ServiceInstance::new)
        })
    }

    /// Binds a factory returning a [`ServiceInstance`] (with views) to a declared service.
    #[must_use]
    pub fn with_instance_factory<F>(mut self, service: impl Into<String>, factory: F) -> Self
    where
        F: Fn(ServiceOptions) -> Result<ServiceInstance, ServiceError> + Send + Sync + 'static,
    {
        self.factories.insert(service.into(), Arc::new(factory));
        self
    }

    /// Returns the underlying manifest.
    #[must_use]
    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }
}

impl Package for ManifestPackage {
    fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError> {
        let mut descriptors = Vec::with_capacity(self.manifest.services.len());
        for (id, service) in &self.manifest.services {
            let factory =
                self.factories
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ContainerError::MissingFactory {
                        package: self.manifest.name.clone(),
                        service: id.clone(),
                    })?;
            descriptors.push(ServiceDescriptor::from_manifest(
                id.as_str(),
                service,
                factory,
            ));
        }

        for bound in self.factories.keys() {
            if !self.manifest.services.contains_key(bound) {
                tracing::warn!(
                    package = %self.manifest.name,
                    service = %bound,
                    "factory bound to a service the manifest does not declare"
                );
            }
        }

        registry.register(descriptors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn properties(&self) -> Properties {
        Properties::from(self.manifest.properties.clone())
    }
}

impl core::fmt::Debug for ManifestPackage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManifestPackage")
            .field("manifest", &self.manifest)
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
