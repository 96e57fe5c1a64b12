//! Error types for registration, resolution, lookup and teardown.
//!
//! Every failure the container reports is a configuration or programming
//! error: nothing here is retried. Lookup errors are returned to the caller
//! as-is and are expected to be handled there (e.g. by rendering a fallback).

use crate::service::ServiceId;

/// Error returned by service factories and teardown hooks.
pub type ServiceError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Errors raised while registering, building or querying a [`Container`](crate::container::Container).
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Two services provide the same interface under the same qualifier.
    #[error(
        "interface '{interface}'{} is provided by both '{existing}' and '{service}'",
        qualifier_suffix(.qualifier.as_deref())
    )]
    DuplicateInterface {
        /// The contested interface name.
        interface: String,
        /// The qualifier both services used (`None` for the default implementation).
        qualifier: Option<String>,
        /// The service registered first.
        existing: ServiceId,
        /// The service whose registration was rejected.
        service: ServiceId,
    },

    /// A service identifier was registered twice.
    #[error("service '{0}' was registered twice")]
    DuplicateService(ServiceId),

    /// Two packages share the same name.
    #[error("package '{0}' was added twice")]
    DuplicatePackage(String),

    /// The dependency graph contains a cycle.
    ///
    /// The path starts and ends with the first repeated service.
    #[error("cyclic dependency between services: {}", join_ids(.cycle, " -> "))]
    CyclicDependency {
        /// Services along the cycle, in traversal order.
        cycle: Vec<ServiceId>,
    },

    /// A single or qualified reference has no matching provider.
    #[error(
        "service '{service}' references '{interface}'{} as '{reference}', but no registered service provides it",
        qualifier_suffix(.qualifier.as_deref())
    )]
    UnresolvedReference {
        /// The service declaring the reference.
        service: ServiceId,
        /// The local reference name.
        reference: String,
        /// The referenced interface.
        interface: String,
        /// The requested qualifier, if any.
        qualifier: Option<String>,
    },

    /// An unqualified lookup matched several implementations and none is the default.
    #[error(
        "interface '{interface}' has multiple implementations ({}); specify a qualifier",
        join_ids(.candidates, ", ")
    )]
    AmbiguousInterface {
        /// The requested interface.
        interface: String,
        /// Services providing the interface.
        candidates: Vec<ServiceId>,
    },

    /// No implementation matches the lookup.
    #[error("no implementation of '{interface}'{} was found", qualifier_suffix(.qualifier.as_deref()))]
    NotFound {
        /// The requested interface.
        interface: String,
        /// The requested qualifier, if any.
        qualifier: Option<String>,
    },

    /// The service exists but does not have the requested type or view.
    #[error("service '{service}' cannot be used as '{expected}'")]
    TypeMismatch {
        /// The service that was found.
        service: ServiceId,
        /// The requested Rust type.
        expected: &'static str,
    },

    /// A service factory failed.
    #[error("failed to construct service '{service}': {source}")]
    Construction {
        /// The service whose factory failed.
        service: ServiceId,
        /// The factory's error.
        #[source]
        source: ServiceError,
    },

    /// A manifest declares a service that has no factory bound to it.
    #[error("service '{service}' in package '{package}' has no factory")]
    MissingFactory {
        /// The package declaring the service.
        package: String,
        /// The service identifier from the manifest.
        service: String,
    },

    /// Application configuration names a property the package does not declare.
    #[error("package '{package}' has no property named '{property}'")]
    UnknownProperty {
        /// The package being configured.
        package: String,
        /// The unknown property key.
        property: String,
    },

    /// A property was requested but is not set.
    #[error("property '{0}' is not defined")]
    MissingProperty(String),

    /// A property value could not be converted to the requested type.
    #[error("invalid value for property '{property}': {source}")]
    InvalidProperty {
        /// The property key.
        property: String,
        /// The conversion error.
        #[source]
        source: serde_json::Error,
    },

    /// A factory asked for a reference name that was not declared.
    #[error("reference '{0}' was not declared or has a different cardinality")]
    UnknownReference(String),

    /// The container was already disposed.
    #[error("the container has been disposed")]
    Disposed,

    /// A manifest or configuration document failed to parse.
    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// A teardown hook failure for a single service.
#[derive(Debug)]
pub struct TeardownFailure {
    /// The service whose hook failed.
    pub service: ServiceId,
    /// The hook's error.
    pub error: ServiceError,
}

/// Aggregate of every teardown failure raised during disposal.
///
/// Disposal never stops at the first failure, so this error may carry
/// several entries, in teardown order.
#[derive(Debug, thiserror::Error)]
#[error("{} service(s) failed to tear down: {}", .failures.len(), describe_failures(.failures))]
pub struct TeardownError {
    failures: Vec<TeardownFailure>,
}

impl TeardownError {
    pub(crate) fn new(failures: Vec<TeardownFailure>) -> Self {
        Self { failures }
    }

    /// Returns the individual failures in teardown order.
    #[must_use]
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Consumes the error, returning the individual failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<TeardownFailure> {
        self.failures
    }
}

fn qualifier_suffix(qualifier: Option<&str>) -> String {
    qualifier
        .map(|q| format!(" (qualifier '{q}')"))
        .unwrap_or_default()
}

fn join_ids(ids: &[ServiceId], separator: &str) -> String {
    ids.iter()
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

fn describe_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("'{}': {}", f.service, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
