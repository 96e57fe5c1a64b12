//! Package properties.
//!
//! Packages declare default property values; the application may override
//! them per package. Only declared keys can be overridden, so a typo in the
//! application configuration fails at startup instead of being ignored.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ContainerError;

/// Property values passed to every service factory of a package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: Map<String, Value>,
}

impl Properties {
    /// Creates an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a property value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the raw JSON value of a property.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns a property converted to `T`.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::MissingProperty`] if the key is not set
    /// - [`ContainerError::InvalidProperty`] if the value does not convert
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContainerError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ContainerError::MissingProperty(key.to_owned()))?;
        T::deserialize(value).map_err(|source| ContainerError::InvalidProperty {
            property: key.to_owned(),
            source,
        })
    }

    /// Returns `true` if the key is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the property keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no properties are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies application-level overrides for `package`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::UnknownProperty`] for a key the package does
    /// not declare. No override is applied in that case.
    pub fn customize(
        &mut self,
        package: &str,
        overrides: &Map<String, Value>,
    ) -> Result<(), ContainerError> {
        if let Some(unknown) = overrides.keys().find(|key| !self.values.contains_key(*key)) {
            return Err(ContainerError::UnknownProperty {
                package: package.to_owned(),
                property: unknown.clone(),
            });
        }
        for (key, value) in overrides {
            self.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_access() {
        let props = Properties::new().with("zoom", 4).with("title", "Map");
        assert_eq!(props.get::<u32>("zoom").unwrap(), 4);
        assert_eq!(props.get::<String>("title").unwrap(), "Map");
    }

    #[test]
    fn missing_and_invalid() {
        let props = Properties::new().with("zoom", "far");
        assert!(matches!(
            props.get::<u32>("center"),
            Err(ContainerError::MissingProperty(key)) if key == "center"
        ));
        assert!(matches!(
            props.get::<u32>("zoom"),
            Err(ContainerError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn customize_overrides_declared_keys() {
        let mut props = Properties::new().with("zoom", 4).with("title", "Map");
        let overrides = json!({ "zoom": 9 });
        props
            .customize("map", overrides.as_object().unwrap())
            .unwrap();

        assert_eq!(props.get::<u32>("zoom").unwrap(), 9);
        assert_eq!(props.get::<String>("title").unwrap(), "Map");
    }

    #[test]
    fn customize_rejects_unknown_keys() {
        let mut props = Properties::new().with("zoom", 4);
        let overrides = json!({ "zoom": 9, "zom": 1 });
        let err = props
            .customize("map", overrides.as_object().unwrap())
            .unwrap_err();

        assert!(matches!(
            err,
            ContainerError::UnknownProperty { ref package, ref property }
                if package == "map" && property == "zom"
        ));
        // Nothing applied
        assert_eq!(props.get::<u32>("zoom").unwrap(), 4);
    }
}
