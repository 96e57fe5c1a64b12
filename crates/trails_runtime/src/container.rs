//! The container of constructed services.
//!
//! A [`Container`] is produced by [`ServiceRegistry::build()`](crate::registry::ServiceRegistry::build)
//! and owns every service instance until it is disposed. Lookups are keyed by
//! interface name:
//!
//! | Method | Result |
//! |--------|--------|
//! | [`get()`](Container::get) | the single (or qualified) implementation |
//! | [`get_all()`](Container::get_all) | every implementation, possibly none |
//! | [`get_as()`](Container::get_as) | the implementation as a concrete type |
//! | [`get_view()`](Container::get_view) | a typed view such as `Arc<dyn Trait>` |
//! | [`resolve()`](Container::resolve) | the view declared by an [`Interface`] marker |

use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::{ContainerError, TeardownError, TeardownFailure};
use crate::registry::{LookupMiss, Provider, select_provider};
use crate::service::{Interface, Service, ServiceId, ServiceRef};

/// Options for [`Container::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Restricts the lookup to the implementation registered under this qualifier.
    pub qualifier: Option<String>,
}

impl LookupOptions {
    /// Looks up the implementation registered under `qualifier`.
    #[must_use]
    pub fn qualified(qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
        }
    }
}

/// Owner of every constructed service.
pub struct Container {
    /// Services in construction order.
    services: Vec<ServiceRef>,

    /// Registration index → position in `services`.
    position: Vec<usize>,

    /// Interface name → providers in registration order.
    providers: HashMap<String, Vec<Provider>>,

    /// Set once `dispose()` ran.
    disposed: bool,
}

impl Container {
    pub(crate) fn new(
        services: Vec<ServiceRef>,
        position: Vec<usize>,
        providers: HashMap<String, Vec<Provider>>,
    ) -> Self {
        tracing::info!(services = services.len(), "container ready");
        Self {
            services,
            position,
            providers,
            disposed: false,
        }
    }

    /// Returns the implementation of `interface`.
    ///
    /// Without a qualifier, a lone implementation is returned; among several,
    /// the unqualified one is the default.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::NotFound`] if nothing matches
    /// - [`ContainerError::AmbiguousInterface`] if no qualifier was given and
    ///   there is no default implementation
    /// - [`ContainerError::Disposed`] after disposal
    pub fn get(
        &self,
        interface: &str,
        options: LookupOptions,
    ) -> Result<ServiceRef, ContainerError> {
        self.ensure_live()?;
        let providers = self.providers_for(interface);

        match select_provider(providers, options.qualifier.as_deref()) {
            Ok(index) => Ok(self.by_index(index).clone()),
            Err(LookupMiss::NotFound) => Err(ContainerError::NotFound {
                interface: interface.to_owned(),
                qualifier: options.qualifier,
            }),
            Err(LookupMiss::Ambiguous(candidates)) => Err(ContainerError::AmbiguousInterface {
                interface: interface.to_owned(),
                candidates: candidates
                    .into_iter()
                    .map(|index| self.by_index(index).id().clone())
                    .collect(),
            }),
        }
    }

    /// Shorthand for [`get()`](Self::get) with a qualifier.
    ///
    /// # Errors
    ///
    /// See [`get()`](Self::get).
    pub fn get_qualified(
        &self,
        interface: &str,
        qualifier: &str,
    ) -> Result<ServiceRef, ContainerError> {
        self.get(interface, LookupOptions::qualified(qualifier))
    }

    /// Returns every implementation of `interface` in registration order.
    ///
    /// Includes qualified and unqualified implementations. A service providing
    /// the interface under several qualifiers appears once.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Disposed`] after disposal; an interface without
    /// implementations yields an empty list.
    pub fn get_all(&self, interface: &str) -> Result<Vec<ServiceRef>, ContainerError> {
        self.ensure_live()?;
        let mut result: Vec<ServiceRef> = Vec::new();
        for provider in self.providers_for(interface) {
            let service = self.by_index(provider.service);
            if !result.iter().any(|s| s.ptr_eq(service)) {
                result.push(service.clone());
            }
        }
        Ok(result)
    }

    /// Returns the default implementation of `interface` as its concrete type.
    ///
    /// # Errors
    ///
    /// See [`get()`](Self::get) and [`ServiceRef::downcast`].
    pub fn get_as<T: Service>(&self, interface: &str) -> Result<Arc<T>, ContainerError> {
        self.get(interface, LookupOptions::default())?
            .downcast::<T>()
    }

    /// Returns a typed view of the default implementation of `interface`.
    ///
    /// # Errors
    ///
    /// See [`get()`](Self::get) and [`ServiceRef::view`].
    pub fn get_view<V: ?Sized + Send + Sync + 'static>(
        &self,
        interface: &str,
    ) -> Result<Arc<V>, ContainerError> {
        self.get(interface, LookupOptions::default())?.view::<V>()
    }

    /// Returns the API handle of the interface described by `I`.
    ///
    /// # Errors
    ///
    /// See [`get()`](Self::get) and [`ServiceRef::view`].
    pub fn resolve<I: Interface>(&self) -> Result<Arc<I::Api>, ContainerError> {
        self.get_view::<I::Api>(I::NAME)
    }

    /// Returns every implementation of the interface described by `I` as API handles.
    ///
    /// # Errors
    ///
    /// See [`get_all()`](Self::get_all) and [`ServiceRef::view`].
    pub fn resolve_all<I: Interface>(&self) -> Result<Vec<Arc<I::Api>>, ContainerError> {
        self.get_all(I::NAME)?
            .iter()
            .map(ServiceRef::view::<I::Api>)
            .collect()
    }

    /// Returns a service by identifier.
    #[must_use]
    pub fn service(&self, id: &ServiceId) -> Option<&ServiceRef> {
        if self.disposed {
            return None;
        }
        self.services.iter().find(|s| s.id() == id)
    }

    /// Returns the service identifiers in construction order.
    #[must_use]
    pub fn construction_order(&self) -> Vec<&ServiceId> {
        self.services.iter().map(ServiceRef::id).collect()
    }

    /// Returns the number of services owned by the container.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if the container owns no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Returns `true` once [`dispose()`](Self::dispose) ran.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Tears down every service in reverse construction order.
    ///
    /// Each service gets its [`destroy()`](Service::destroy) call regardless of
    /// earlier failures. Calling this again is a no-op. Dropping an undisposed
    /// container disposes it.
    ///
    /// # Errors
    ///
    /// Returns a [`TeardownError`] listing every failed hook.
    pub fn dispose(&mut self) -> Result<(), TeardownError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        tracing::info!(services = self.services.len(), "disposing container");
        let failures = teardown(&self.services);
        self.services.clear();
        self.providers.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError::new(failures))
        }
    }

    fn ensure_live(&self) -> Result<(), ContainerError> {
        if self.disposed {
            Err(ContainerError::Disposed)
        } else {
            Ok(())
        }
    }

    fn providers_for(&self, interface: &str) -> &[Provider] {
        self.providers
            .get(interface)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn by_index(&self, registration_index: usize) -> &ServiceRef {
        &self.services[self.position[registration_index]]
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            tracing::warn!(%error, "container dropped with teardown failures");
        }
    }
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.construction_order())
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Runs every teardown hook in reverse order of `services`, collecting failures.
pub(crate) fn teardown(services: &[ServiceRef]) -> Vec<TeardownFailure> {
    let mut failures = Vec::new();
    for service in services.iter().rev() {
        tracing::debug!(service = %service.id(), "destroying service");
        if let Err(error) = service.destroy() {
            tracing::warn!(service = %service.id(), %error, "service teardown failed");
            failures.push(TeardownFailure {
                service: service.id().clone(),
                error,
            });
        }
    }
    failures
}
