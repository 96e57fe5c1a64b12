//! Inputs handed to a service factory.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::ContainerError;
use crate::properties::Properties;
use crate::service::{Service, ServiceRef};

/// A resolved reference.
#[derive(Debug, Clone)]
pub enum Injected {
    /// A single or qualified reference.
    Single(ServiceRef),
    /// An `all` reference, in registration order.
    All(Vec<ServiceRef>),
}

/// Frozen snapshot of a service's resolved references.
///
/// Every entry points at a fully constructed instance.
#[derive(Debug, Clone, Default)]
pub struct References {
    entries: HashMap<String, Injected>,
}

impl References {
    pub(crate) fn new(entries: HashMap<String, Injected>) -> Self {
        Self { entries }
    }

    /// Returns the service injected for a single or qualified reference.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::UnknownReference`] if `name` was not declared
    /// or was declared with `all`.
    pub fn get(&self, name: &str) -> Result<&ServiceRef, ContainerError> {
        match self.entries.get(name) {
            Some(Injected::Single(service)) => Ok(service),
            _ => Err(ContainerError::UnknownReference(name.to_owned())),
        }
    }

    /// Returns the services injected for an `all` reference.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::UnknownReference`] if `name` was not declared
    /// with `all`.
    pub fn get_all(&self, name: &str) -> Result<&[ServiceRef], ContainerError> {
        match self.entries.get(name) {
            Some(Injected::All(services)) => Ok(services),
            _ => Err(ContainerError::UnknownReference(name.to_owned())),
        }
    }

    /// Returns a single reference as its concrete type.
    ///
    /// # Errors
    ///
    /// See [`get()`](Self::get) and [`ServiceRef::downcast`].
    pub fn get_as<T: Service>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        self.get(name)?.downcast::<T>()
    }

    /// Returns a typed view of a single reference.
    ///
    /// # Errors
    ///
    /// See [`get()`](Self::get) and [`ServiceRef::view`].
    pub fn get_view<V: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<V>, ContainerError> {
        self.get(name)?.view::<V>()
    }

    /// Returns typed views of every service injected for an `all` reference.
    ///
    /// # Errors
    ///
    /// See [`get_all()`](Self::get_all) and [`ServiceRef::view`].
    pub fn get_all_views<V: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Vec<Arc<V>>, ContainerError> {
        self.get_all(name)?.iter().map(ServiceRef::view::<V>).collect()
    }

    /// Returns `true` if `name` was declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of declared references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the service declares no references.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything a factory receives: references and package properties.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Resolved references, keyed by local reference name.
    pub references: References,
    /// Properties of the package that declared the service.
    pub properties: Properties,
}
