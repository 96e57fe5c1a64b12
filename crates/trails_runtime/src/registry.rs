//! Service registration and container construction.
//!
//! The [`ServiceRegistry`] collects [`ServiceDescriptor`]s, rejects conflicting
//! registrations up front, and turns them into a [`Container`] in
//! [`build()`](ServiceRegistry::build):
//!
//! 1. **Resolution** - every reference is matched against the providers
//! 2. **Ordering** - a depth-first topological sort, failing on cycles
//! 3. **Construction** - factories run in order, each receiving a frozen
//!    snapshot of its already constructed references
//!
//! # Example
//!
//! ```
//! use trails_runtime::manifest::ReferenceSpec;
//! use trails_runtime::registry::{ServiceDescriptor, ServiceRegistry};
//! use trails_runtime::service::Service;
//! use std::sync::Arc;
//!
//! struct Store;
//! impl Service for Store {}
//!
//! struct Api { store: Arc<Store> }
//! impl Service for Api {}
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register([
//!     ServiceDescriptor::new("StoreImpl", |_| Ok(Store)).provides("data.Store"),
//!     ServiceDescriptor::new("ApiImpl", |options| {
//!         Ok(Api { store: options.references.get_as::<Store>("store")? })
//!     })
//!     .provides("api.Api")
//!     .reference("store", ReferenceSpec::single("data.Store")),
//! ])?;
//!
//! let container = registry.build()?;
//! let api = container.get_as::<Api>("api.Api")?;
//! # Ok::<(), trails_runtime::error::ContainerError>(())
//! ```

use core::fmt;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

use crate::container::{Container, teardown};
use crate::error::{ContainerError, ServiceError};
use crate::graph::{DependencyGraph, ResolvedReference};
use crate::manifest::{ProvidedInterface, ReferenceSpec, ServiceManifest};
use crate::options::{Injected, References, ServiceOptions};
use crate::properties::Properties;
use crate::service::{Service, ServiceId, ServiceInstance, ServiceRef};

/// Factory producing a service instance from its options.
pub type ServiceFactory =
    Arc<dyn Fn(ServiceOptions) -> Result<ServiceInstance, ServiceError> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// ServiceDescriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Declaration of a service: identity, provided interfaces, references and factory.
#[derive(Clone)]
pub struct ServiceDescriptor {
    id: ServiceId,
    package: Option<String>,
    provides: Vec<ProvidedInterface>,
    references: IndexMap<String, ReferenceSpec>,
    factory: ServiceFactory,
}

impl ServiceDescriptor {
    /// Creates a descriptor whose factory returns a plain service value.
    pub fn new<S, F>(id: impl Into<ServiceId>, factory: F) -> Self
    where
        S: Service,
        F: Fn(ServiceOptions) -> Result<S, ServiceError> + Send + Sync + 'static,
    {
        Self::with_factory(
            id,
            Arc::new(move |options| factory(options).map(ServiceInstance::new)),
        )
    }

    /// Creates a descriptor from a factory returning a [`ServiceInstance`].
    ///
    /// Use this when the service exposes typed views.
    #[must_use]
    pub fn with_factory(id: impl Into<ServiceId>, factory: ServiceFactory) -> Self {
        Self {
            id: id.into(),
            package: None,
            provides: Vec::new(),
            references: IndexMap::new(),
            factory,
        }
    }

    /// Creates a descriptor from a manifest entry.
    #[must_use]
    pub fn from_manifest(
        id: impl Into<ServiceId>,
        manifest: &ServiceManifest,
        factory: ServiceFactory,
    ) -> Self {
        Self {
            provides: manifest.provides.clone(),
            references: manifest.references.clone(),
            ..Self::with_factory(id, factory)
        }
    }

    /// Declares an unqualified provided interface.
    #[must_use]
    pub fn provides(mut self, interface: impl Into<String>) -> Self {
        self.provides.push(ProvidedInterface::new(interface));
        self
    }

    /// Declares a provided interface under a qualifier.
    #[must_use]
    pub fn provides_qualified(
        mut self,
        interface: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Self {
        self.provides
            .push(ProvidedInterface::qualified(interface, qualifier));
        self
    }

    /// Declares a reference. A second reference with the same name replaces the first.
    #[must_use]
    pub fn reference(mut self, name: impl Into<String>, spec: impl Into<ReferenceSpec>) -> Self {
        self.references.insert(name.into(), spec.into());
        self
    }

    /// Sets the package the service belongs to.
    ///
    /// Packages registered through an [`Application`](crate::application::Application)
    /// get this assigned automatically.
    #[must_use]
    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Returns the service identifier.
    #[must_use]
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Returns the owning package, if assigned.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Returns the provided interfaces.
    #[must_use]
    pub fn provided(&self) -> &[ProvidedInterface] {
        &self.provides
    }

    /// Returns the declared references, in declaration order.
    #[must_use]
    pub fn references(&self) -> &IndexMap<String, ReferenceSpec> {
        &self.references
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("package", &self.package)
            .field("provides", &self.provides)
            .field("references", &self.references)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider lookup
// ─────────────────────────────────────────────────────────────────────────────

/// A service registered for an interface.
#[derive(Debug, Clone)]
pub(crate) struct Provider {
    pub(crate) qualifier: Option<String>,
    /// Registration index of the providing service.
    pub(crate) service: usize,
}

/// Why a provider lookup did not yield exactly one service.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LookupMiss {
    NotFound,
    /// Registration indices of every candidate.
    Ambiguous(Vec<usize>),
}

/// Picks one provider out of `providers` (registration order).
///
/// With a qualifier, only the provider registered under it matches. Without
/// one, a lone provider always matches; otherwise the unqualified provider is
/// the default, and its absence makes the lookup ambiguous.
pub(crate) fn select_provider(
    providers: &[Provider],
    qualifier: Option<&str>,
) -> Result<usize, LookupMiss> {
    if let Some(qualifier) = qualifier {
        return providers
            .iter()
            .find(|p| p.qualifier.as_deref() == Some(qualifier))
            .map(|p| p.service)
            .ok_or(LookupMiss::NotFound);
    }

    match providers {
        [] => Err(LookupMiss::NotFound),
        [only] => Ok(only.service),
        _ => {
            let mut defaults = providers.iter().filter(|p| p.qualifier.is_none());
            match (defaults.next(), defaults.next()) {
                (Some(default), None) => Ok(default.service),
                _ => Err(LookupMiss::Ambiguous(
                    providers.iter().map(|p| p.service).collect(),
                )),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Collects service descriptors and builds them into a [`Container`].
#[derive(Default)]
pub struct ServiceRegistry {
    /// Descriptors in registration order.
    descriptors: Vec<ServiceDescriptor>,

    /// Registered identifiers (for duplicate detection).
    service_ids: HashSet<ServiceId>,

    /// Interface name → providers in registration order.
    providers: HashMap<String, Vec<Provider>>,

    /// Properties handed to the factories of each package's services.
    package_properties: HashMap<String, Properties>,

    /// Package whose `build()` is currently registering services.
    current_package: Option<String>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a batch of descriptors.
    ///
    /// The batch is validated as a whole before anything is recorded: on
    /// error the registry is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::DuplicateService`] if an identifier is already taken
    /// - [`ContainerError::DuplicateInterface`] if an interface is already
    ///   provided under the same qualifier (or both unqualified)
    pub fn register(
        &mut self,
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
    ) -> Result<&mut Self, ContainerError> {
        let batch: Vec<ServiceDescriptor> = descriptors
            .into_iter()
            .map(|descriptor| match (&descriptor.package, &self.current_package) {
                (None, Some(package)) => descriptor.in_package(package.clone()),
                _ => descriptor,
            })
            .collect();

        self.validate(&batch)?;

        for descriptor in batch {
            let index = self.descriptors.len();
            for provided in &descriptor.provides {
                let providers = self.providers.entry(provided.name.clone()).or_default();
                if !providers
                    .iter()
                    .any(|p| p.service == index && p.qualifier == provided.qualifier)
                {
                    providers.push(Provider {
                        qualifier: provided.qualifier.clone(),
                        service: index,
                    });
                }
            }

            tracing::debug!(
                service = %descriptor.id,
                package = descriptor.package.as_deref().unwrap_or("-"),
                provides = descriptor.provides.len(),
                references = descriptor.references.len(),
                "registered service"
            );
            self.service_ids.insert(descriptor.id.clone());
            self.descriptors.push(descriptor);
        }
        Ok(self)
    }

    fn validate(&self, batch: &[ServiceDescriptor]) -> Result<(), ContainerError> {
        let mut staged_ids: HashSet<&ServiceId> = HashSet::new();
        let mut staged: HashMap<(&str, Option<&str>), &ServiceId> = HashMap::new();

        for descriptor in batch {
            if self.service_ids.contains(&descriptor.id) || !staged_ids.insert(&descriptor.id) {
                return Err(ContainerError::DuplicateService(descriptor.id.clone()));
            }

            for provided in &descriptor.provides {
                let key = (provided.name.as_str(), provided.qualifier.as_deref());
                let existing = self
                    .provider_of(key.0, key.1)
                    .or_else(|| staged.get(&key).copied());

                match existing {
                    Some(existing) if existing != &descriptor.id => {
                        return Err(ContainerError::DuplicateInterface {
                            interface: provided.name.clone(),
                            qualifier: provided.qualifier.clone(),
                            existing: existing.clone(),
                            service: descriptor.id.clone(),
                        });
                    }
                    _ => {
                        staged.insert(key, &descriptor.id);
                    }
                }
            }
        }
        Ok(())
    }

    fn provider_of(&self, interface: &str, qualifier: Option<&str>) -> Option<&ServiceId> {
        self.providers
            .get(interface)?
            .iter()
            .find(|p| p.qualifier.as_deref() == qualifier)
            .map(|p| &self.descriptors[p.service].id)
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Returns `true` if a service with this identifier was registered.
    #[must_use]
    pub fn contains_service(&self, id: &ServiceId) -> bool {
        self.service_ids.contains(id)
    }

    /// Returns the descriptors in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Returns the services providing `interface`, in registration order.
    #[must_use]
    pub fn providers_of(&self, interface: &str) -> Vec<&ServiceId> {
        self.providers
            .get(interface)
            .map(|providers| {
                providers
                    .iter()
                    .map(|p| &self.descriptors[p.service].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets the properties passed to the services of `package`.
    pub fn set_package_properties(&mut self, package: impl Into<String>, properties: Properties) {
        self.package_properties.insert(package.into(), properties);
    }

    /// Returns the properties of `package`, if any were set.
    #[must_use]
    pub fn package_properties(&self, package: &str) -> Option<&Properties> {
        self.package_properties.get(package)
    }

    /// Marks subsequent registrations as belonging to `package`.
    pub(crate) fn enter_package(&mut self, package: &str) {
        self.current_package = Some(package.to_owned());
    }

    pub(crate) fn leave_package(&mut self) {
        self.current_package = None;
    }

    /// Resolves references and returns the dependency graph without
    /// constructing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::UnresolvedReference`] or
    /// [`ContainerError::AmbiguousInterface`] if a reference cannot be satisfied.
    pub fn dependency_graph(&self) -> Result<DependencyGraph, ContainerError> {
        DependencyGraph::resolve(&self.descriptors, &self.providers)
    }

    /// Constructs every registered service.
    ///
    /// If a factory fails, the services constructed so far are torn down in
    /// reverse order before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::UnresolvedReference`] / [`ContainerError::AmbiguousInterface`]
    ///   if a reference cannot be satisfied
    /// - [`ContainerError::CyclicDependency`] if the graph has a cycle
    /// - [`ContainerError::Construction`] if a factory fails
    pub fn build(self) -> Result<Container, ContainerError> {
        let graph = self.dependency_graph()?;
        let order = graph.topological_order()?;

        tracing::info!(services = order.len(), "constructing services");

        // Registration index → position in `services` (construction order).
        let mut position = vec![usize::MAX; self.descriptors.len()];
        let mut services: Vec<ServiceRef> = Vec::with_capacity(order.len());

        for &node in &order {
            let descriptor = &self.descriptors[node];
            let references = snapshot_references(graph.references_of(node), &services, &position);
            let properties = descriptor
                .package
                .as_deref()
                .and_then(|package| self.package_properties.get(package))
                .cloned()
                .unwrap_or_default();

            tracing::debug!(service = %descriptor.id, "constructing service");

            match (descriptor.factory)(ServiceOptions {
                references,
                properties,
            }) {
                Ok(instance) => {
                    position[node] = services.len();
                    services.push(ServiceRef::new(descriptor.id.clone(), instance));
                }
                Err(source) => {
                    tracing::error!(
                        service = %descriptor.id,
                        error = %source,
                        "service construction failed, tearing down {} constructed service(s)",
                        services.len()
                    );
                    // Failures here are logged by `teardown`; the construction error wins.
                    let _ = teardown(&services);
                    return Err(ContainerError::Construction {
                        service: descriptor.id.clone(),
                        source,
                    });
                }
            }
        }

        Ok(Container::new(services, position, self.providers))
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("descriptors", &self.descriptors)
            .field("current_package", &self.current_package)
            .finish_non_exhaustive()
    }
}

/// Builds the frozen reference snapshot for one service.
///
/// Every target precedes the service in construction order, so its position is set.
fn snapshot_references(
    references: &[(String, ResolvedReference)],
    services: &[ServiceRef],
    position: &[usize],
) -> References {
    let entries = references
        .iter()
        .map(|(name, reference)| {
            let injected = match reference {
                ResolvedReference::Single(target) => {
                    Injected::Single(services[position[*target]].clone())
                }
                ResolvedReference::All(targets) => Injected::All(
                    targets
                        .iter()
                        .map(|target| services[position[*target]].clone())
                        .collect(),
                ),
            };
            (name.clone(), injected)
        })
        .collect();
    References::new(entries)
}
