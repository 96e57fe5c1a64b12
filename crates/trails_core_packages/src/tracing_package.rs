//! Tracing and observability package.
//!
//! Provides [`TracingPackage`] which configures the `tracing` subscriber and
//! exposes the configuration as a service.
//!
//! # Lifecycle
//!
//! - **`build()`** registers the [`TracingConfig`] service, built from the
//!   package properties so applications can override the level or format.
//! - **`ready()`** installs the subscriber from the constructed config. If a
//!   global subscriber is already set, installation is skipped.
//!
//! # Properties
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `level` | `"info"` | Maximum log level |
//! | `format` | `"pretty"` | `"pretty"`, `"compact"` or `"json"` |
//! | `env_filter` | `null` | Target-specific filter, e.g. `"trails_runtime=debug"` |
//! | `span_events` | `false` | Log span enter/exit |
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use trails_core_packages::{TracingConfig, TracingFormat, TracingPackage};
//! use trails_runtime::application::Application;
//! use tracing::Level;
//!
//! let container = Application::new()
//!     .add_packages(TracingPackage::default().with_format(TracingFormat::Compact))
//!     .with_properties("tracing", json!({ "level": "debug" }).as_object().cloned().unwrap_or_default())
//!     .start()?;
//!
//! let config = container.get_as::<TracingConfig>(TracingConfig::INTERFACE)?;
//! assert_eq!(config.level, Level::DEBUG);
//! assert_eq!(config.format, TracingFormat::Compact);
//! # Ok::<(), trails_runtime::error::ContainerError>(())
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trails_runtime::container::Container;
use trails_runtime::error::{ContainerError, ServiceError};
use trails_runtime::options::ServiceOptions;
use trails_runtime::package::Package;
use trails_runtime::properties::Properties;
use trails_runtime::registry::{ServiceDescriptor, ServiceRegistry};
use trails_runtime::service::Service;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig Service
// ─────────────────────────────────────────────────────────────────────────────

/// The effective tracing configuration.
///
/// Services can reference [`TracingConfig::INTERFACE`] to adapt their logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// The configured log level.
    pub level: Level,
    /// The configured output format.
    pub format: TracingFormat,
    /// Target-specific filter overriding `level`.
    pub env_filter: Option<String>,
    /// Whether span enter/exit events are logged.
    pub span_events: bool,
}

impl TracingConfig {
    /// Interface name under which the config is provided.
    pub const INTERFACE: &'static str = "trails.TracingConfig";

    fn from_properties(properties: &Properties) -> Result<Self, ServiceError> {
        let level: String = properties.get("level")?;
        Ok(Self {
            level: level.parse()?,
            format: properties.get("format")?,
            env_filter: properties.get("env_filter")?,
            span_events: properties.get("span_events")?,
        })
    }

    /// Installs a global subscriber for this configuration.
    ///
    /// Returns `false` if a global subscriber was already installed.
    pub fn install(&self) -> bool {
        let env_filter = match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        };

        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = match self.format {
            TracingFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init(),
        };
        installed.is_ok()
    }
}

impl Service for TracingConfig {
    fn destroy(&self) -> Result<(), ServiceError> {
        tracing::info!("tracing shutting down");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingPackage
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing and logging package.
///
/// # Services Provided
///
/// | Interface | Service | Description |
/// |-----------|---------|-------------|
/// | `trails.TracingConfig` | [`TracingConfig`] | Effective configuration |
///
/// # Configuration Options
///
/// Builder settings become the default properties; application overrides win.
///
/// ```
/// use trails_core_packages::{TracingFormat, TracingPackage};
/// use tracing::Level;
///
/// // Development: pretty output with debug level and span events
/// let dev = TracingPackage::default()
///     .with_level(Level::DEBUG)
///     .with_span_events(true);
///
/// // Production: JSON output for log aggregation
/// let prod = TracingPackage::default()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("trails_runtime=info,my_app=debug");
/// ```
#[derive(Debug, Clone)]
pub struct TracingPackage {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingPackage {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPackage {
    /// Creates a `TracingPackage` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a target-specific filter, e.g. `"trails_runtime=debug,my_app=info"`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }
}

impl Package for TracingPackage {
    fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError> {
        registry.register([ServiceDescriptor::new(
            "trails.TracingConfigImpl",
            |options: ServiceOptions| TracingConfig::from_properties(&options.properties),
        )
        .provides(TracingConfig::INTERFACE)])?;
        Ok(())
    }

    fn ready(&self, container: &Container) -> Result<(), ContainerError> {
        let config = container.get_as::<TracingConfig>(TracingConfig::INTERFACE)?;
        if !config.install() {
            tracing::debug!("global subscriber already installed, keeping it");
        }
        tracing::info!(
            level = %config.level,
            format = ?config.format,
            "TracingPackage initialized"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }

    fn properties(&self) -> Properties {
        Properties::new()
            .with("level", self.level.as_str().to_ascii_lowercase())
            .with("format", serde_json::to_value(self.format).unwrap_or_default())
            .with("env_filter", self.env_filter.clone())
            .with("span_events", self.span_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trails_runtime::application::Application;

    #[test]
    fn tracing_format_default_is_pretty() {
        assert_eq!(TracingFormat::default(), TracingFormat::Pretty);
    }

    #[test]
    fn tracing_format_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TracingFormat::Json).unwrap(), json!("json"));
    }

    #[test]
    fn builder_values_become_default_properties() {
        let package = TracingPackage::new()
            .with_level(Level::DEBUG)
            .with_format(TracingFormat::Json)
            .with_env_filter("trails_runtime=debug")
            .with_span_events(true);
        let properties = package.properties();

        assert_eq!(properties.get::<String>("level").unwrap(), "debug");
        assert_eq!(properties.get::<TracingFormat>("format").unwrap(), TracingFormat::Json);
        assert_eq!(
            properties.get::<Option<String>>("env_filter").unwrap().as_deref(),
            Some("trails_runtime=debug")
        );
        assert!(properties.get::<bool>("span_events").unwrap());
    }

    #[test]
    fn config_service_reflects_overrides() {
        let container = Application::new()
            .add_packages(TracingPackage::default())
            .with_properties(
                "tracing",
                json!({ "level": "warn", "format": "compact" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .start()
            .unwrap();

        let config = container
            .get_as::<TracingConfig>(TracingConfig::INTERFACE)
            .unwrap();
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter, None);
    }

    #[test]
    fn invalid_level_fails_construction() {
        let err = Application::new()
            .add_packages(TracingPackage::default())
            .with_properties(
                "tracing",
                json!({ "level": "loud" }).as_object().cloned().unwrap(),
            )
            .start()
            .unwrap_err();
        assert!(matches!(err, ContainerError::Construction { .. }));
    }
}
