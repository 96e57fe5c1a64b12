//! Declarative service manifests.
//!
//! A manifest describes what a service provides and what it references, in
//! the same shape package build configurations use:
//!
//! ```json
//! {
//!   "name": "map",
//!   "services": {
//!     "MapRegistryImpl": {
//!       "provides": "map.MapRegistry",
//!       "references": {
//!         "http": "http.HttpService",
//!         "layers": { "name": "map.LayerFactory", "all": true },
//!         "osm": { "name": "map.TileProvider", "qualifier": "osm" }
//!       }
//!     }
//!   },
//!   "properties": { "zoom": 4 }
//! }
//! ```
//!
//! `provides` accepts a single string or a list whose entries are strings or
//! `{ "name", "qualifier" }` objects. A reference is either an interface name
//! or `{ "name", "all"?, "qualifier"? }`; combining `all` with `qualifier` is
//! rejected.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ContainerError;

// ─────────────────────────────────────────────────────────────────────────────
// ProvidedInterface
// ─────────────────────────────────────────────────────────────────────────────

/// An interface a service implements, optionally under a qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ProvidedRepr")]
pub struct ProvidedInterface {
    /// The interface name.
    pub name: String,
    /// Distinguishes this implementation from others of the same interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl ProvidedInterface {
    /// Creates an unqualified provided interface.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifier: None,
        }
    }

    /// Creates a qualified provided interface.
    #[must_use]
    pub fn qualified(name: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifier: Some(qualifier.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProvidedRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        qualifier: Option<String>,
    },
}

impl From<ProvidedRepr> for ProvidedInterface {
    fn from(repr: ProvidedRepr) -> Self {
        match repr {
            ProvidedRepr::Name(name) => Self::new(name),
            ProvidedRepr::Full { name, qualifier } => Self { name, qualifier },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReferenceSpec
// ─────────────────────────────────────────────────────────────────────────────

/// How a service looks up one of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ReferenceRepr", into = "ReferenceRepr")]
pub enum ReferenceSpec {
    /// Exactly one implementation of the interface.
    Single {
        /// The referenced interface.
        interface: String,
    },
    /// Every implementation, in registration order. May be empty.
    All {
        /// The referenced interface.
        interface: String,
    },
    /// The implementation registered under `qualifier`.
    Qualified {
        /// The referenced interface.
        interface: String,
        /// The required qualifier.
        qualifier: String,
    },
}

impl ReferenceSpec {
    /// References the single implementation of `interface`.
    #[must_use]
    pub fn single(interface: impl Into<String>) -> Self {
        Self::Single {
            interface: interface.into(),
        }
    }

    /// References every implementation of `interface`.
    #[must_use]
    pub fn all(interface: impl Into<String>) -> Self {
        Self::All {
            interface: interface.into(),
        }
    }

    /// References the implementation of `interface` registered under `qualifier`.
    #[must_use]
    pub fn qualified(interface: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self::Qualified {
            interface: interface.into(),
            qualifier: qualifier.into(),
        }
    }

    /// Returns the referenced interface name.
    #[must_use]
    pub fn interface(&self) -> &str {
        match self {
            Self::Single { interface }
            | Self::All { interface }
            | Self::Qualified { interface, .. } => interface,
        }
    }

    /// Returns the required qualifier, if any.
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            Self::Qualified { qualifier, .. } => Some(qualifier),
            Self::Single { .. } | Self::All { .. } => None,
        }
    }
}

impl From<&str> for ReferenceSpec {
    fn from(interface: &str) -> Self {
        Self::single(interface)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ReferenceRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "core::ops::Not::not")]
        all: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualifier: Option<String>,
    },
}

impl TryFrom<ReferenceRepr> for ReferenceSpec {
    type Error = String;

    fn try_from(repr: ReferenceRepr) -> Result<Self, Self::Error> {
        match repr {
            ReferenceRepr::Name(interface) => Ok(Self::Single { interface }),
            ReferenceRepr::Full {
                name,
                all: true,
                qualifier: Some(qualifier),
            } => Err(format!(
                "reference to '{name}' cannot combine `all` with qualifier '{qualifier}'"
            )),
            ReferenceRepr::Full {
                name, all: true, ..
            } => Ok(Self::All { interface: name }),
            ReferenceRepr::Full {
                name,
                qualifier: Some(qualifier),
                ..
            } => Ok(Self::Qualified {
                interface: name,
                qualifier,
            }),
            ReferenceRepr::Full { name, .. } => Ok(Self::Single { interface: name }),
        }
    }
}

impl From<ReferenceSpec> for ReferenceRepr {
    fn from(spec: ReferenceSpec) -> Self {
        match spec {
            ReferenceSpec::Single { interface } => Self::Name(interface),
            ReferenceSpec::All { interface } => Self::Full {
                name: interface,
                all: true,
                qualifier: None,
            },
            ReferenceSpec::Qualified {
                interface,
                qualifier,
            } => Self::Full {
                name: interface,
                all: false,
                qualifier: Some(qualifier),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifests
// ─────────────────────────────────────────────────────────────────────────────

/// Declaration of a single service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceManifest {
    /// Interfaces the service implements.
    #[serde(default, deserialize_with = "one_or_many")]
    pub provides: Vec<ProvidedInterface>,
    /// Local reference name to lookup specification, in declaration order.
    #[serde(default)]
    pub references: IndexMap<String, ReferenceSpec>,
}

/// Declaration of a package: its services and default properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// The package name, used as the key for property customization.
    pub name: String,
    /// Services by identifier, in declaration order.
    #[serde(default)]
    pub services: IndexMap<String, ServiceManifest>,
    /// Default property values.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl PackageManifest {
    /// Parses a package manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Manifest`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, ContainerError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}
