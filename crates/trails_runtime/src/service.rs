//! Service trait, identifiers and handles.
//!
//! A service is any `Send + Sync + 'static` type implementing [`Service`].
//! Factories wrap their service in a [`ServiceInstance`], optionally attaching
//! typed *views* (`Arc<dyn Trait>` handles) so consumers can reach a capability
//! trait without knowing the concrete type. The container hands out
//! [`ServiceRef`] handles to constructed instances.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trails_runtime::service::{Service, ServiceInstance};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Service for English {}
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! let service = Arc::new(English);
//! let instance = ServiceInstance::from_arc(Arc::clone(&service))
//!     .with_view::<dyn Greeter>(service);
//! assert_eq!(instance.view::<dyn Greeter>().unwrap().greet(), "hello");
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use hashbrown::HashMap;

use crate::error::{ContainerError, ServiceError};

// ─────────────────────────────────────────────────────────────────────────────
// ServiceId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier of a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(String);

impl ServiceId {
    /// Creates a new service identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A long-lived object constructed once by the container.
///
/// The only lifecycle hook is [`destroy()`](Self::destroy), invoked once when
/// the container is disposed, in reverse construction order.
pub trait Service: DowncastSync {
    /// Releases resources held by the service.
    ///
    /// # Errors
    ///
    /// Failures are collected by the container and reported together in a
    /// [`TeardownError`](crate::error::TeardownError); they never prevent other
    /// services from being torn down.
    fn destroy(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

impl_downcast!(sync Service);

/// Marker binding an interface name to the capability trait it exposes.
///
/// Lets callers ask the container for a typed handle instead of a raw
/// [`ServiceRef`]. Implementations must register the matching view via
/// [`ServiceInstance::with_view`].
///
/// ```
/// use trails_runtime::service::Interface;
///
/// pub trait HttpClient: Send + Sync {
///     fn fetch(&self, url: &str) -> String;
/// }
///
/// pub struct HttpService;
///
/// impl Interface for HttpService {
///     const NAME: &'static str = "http.HttpService";
///     type Api = dyn HttpClient;
/// }
/// ```
pub trait Interface: 'static {
    /// The flat `"<package>.<InterfaceName>"` registry key.
    const NAME: &'static str;

    /// The capability trait (or type) consumers receive.
    type Api: ?Sized + Send + Sync + 'static;
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceInstance
// ─────────────────────────────────────────────────────────────────────────────

/// Type-erased view storage. Each entry holds an `Arc<V>` keyed by `TypeId::of::<V>()`.
type BoxedView = Box<dyn Any + Send + Sync>;

/// A live service produced by a factory, plus its typed views.
pub struct ServiceInstance {
    service: Arc<dyn Service>,
    type_name: &'static str,
    views: HashMap<TypeId, BoxedView>,
}

impl ServiceInstance {
    /// Wraps a service value.
    #[must_use]
    pub fn new<S: Service>(service: S) -> Self {
        Self::from_arc(Arc::new(service))
    }

    /// Wraps an already shared service.
    #[must_use]
    pub fn from_arc<S: Service>(service: Arc<S>) -> Self {
        Self {
            service,
            type_name: core::any::type_name::<S>(),
            views: HashMap::new(),
        }
    }

    /// Attaches a typed view, typically the service coerced to a trait object.
    ///
    /// A second view of the same type replaces the first.
    #[must_use]
    pub fn with_view<V: ?Sized + Send + Sync + 'static>(mut self, view: Arc<V>) -> Self {
        self.views.insert(TypeId::of::<V>(), Box::new(view));
        self
    }

    /// Returns the view registered for `V`, if any.
    #[must_use]
    pub fn view<V: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<V>> {
        self.views
            .get(&TypeId::of::<V>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<V>>())
            .cloned()
    }

    /// Returns the type name of the wrapped service.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type_name", &self.type_name)
            .field("views", &self.views.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceRef
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable handle to a constructed service.
#[derive(Clone)]
pub struct ServiceRef {
    id: ServiceId,
    instance: Arc<ServiceInstance>,
}

impl ServiceRef {
    pub(crate) fn new(id: ServiceId, instance: ServiceInstance) -> Self {
        Self {
            id,
            instance: Arc::new(instance),
        }
    }

    /// Returns the identifier of the service.
    #[must_use]
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Returns the type name of the concrete service.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.instance.type_name
    }

    /// Returns the service as a trait object.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn Service> {
        &self.instance.service
    }

    /// Returns the service as its concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::TypeMismatch`] if the service is not a `T`.
    pub fn downcast<T: Service>(&self) -> Result<Arc<T>, ContainerError> {
        Arc::clone(&self.instance.service)
            .downcast_arc::<T>()
            .map_err(|_| self.mismatch::<T>())
    }

    /// Returns the view registered for `V`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::TypeMismatch`] if the factory did not attach
    /// a view of that type.
    pub fn view<V: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<V>, ContainerError> {
        self.instance.view::<V>().ok_or_else(|| self.mismatch::<V>())
    }

    /// Returns `true` if both handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &ServiceRef) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }

    pub(crate) fn destroy(&self) -> Result<(), ServiceError> {
        self.instance.service.destroy()
    }

    fn mismatch<V: ?Sized>(&self) -> ContainerError {
        ContainerError::TypeMismatch {
            service: self.id.clone(),
            expected: core::any::type_name::<V>(),
        }
    }
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRef")
            .field("id", &self.id)
            .field("type_name", &self.instance.type_name)
            .finish()
    }
}
