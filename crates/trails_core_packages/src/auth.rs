//! Authentication.
//!
//! The [`AuthService`] is the application-facing entry point; the actual
//! mechanism (OIDC, a session cookie, a fixed demo user) lives in an
//! [`AuthPlugin`] registered by another package under
//! `authentication.AuthPlugin`. The service mirrors the plugin's state cell
//! into its own cell through a [`Reaction`], so consumers only ever depend on
//! `authentication.AuthService`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trails_runtime::error::{ContainerError, ServiceError};
use trails_runtime::manifest::ReferenceSpec;
use trails_runtime::options::ServiceOptions;
use trails_runtime::package::Package;
use trails_runtime::reactive::{ObservableCell, Reaction};
use trails_runtime::registry::{ServiceDescriptor, ServiceRegistry};
use trails_runtime::service::{Interface, Service, ServiceInstance};

/// Information about an authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Stable identifier of the user.
    pub user_id: String,
    /// Name suitable for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Mechanism-specific attributes (claims, roles, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl SessionInfo {
    /// Creates a session for `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Authentication state of the application.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthState {
    /// The mechanism has not decided yet (e.g. a session check is running).
    #[default]
    Pending,
    /// No user is logged in.
    NotAuthenticated,
    /// A user is logged in.
    Authenticated(SessionInfo),
}

impl AuthState {
    /// Returns the session if authenticated.
    #[must_use]
    pub fn session(&self) -> Option<&SessionInfo> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Pending | Self::NotAuthenticated => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::NotAuthenticated => "not-authenticated",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// Errors reported by [`AuthService::logout`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// There is no session to end.
    #[error("cannot log out: no user is authenticated")]
    NotAuthenticated,

    /// The authentication mechanism failed.
    #[error("authentication plugin failed: {0}")]
    Plugin(#[source] ServiceError),
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// An authentication mechanism.
pub trait AuthPlugin: Send + Sync {
    /// Returns the mechanism's state cell.
    fn auth_state(&self) -> ObservableCell<AuthState>;

    /// Ends the current session.
    ///
    /// # Errors
    ///
    /// Mechanism-specific failure.
    fn logout(&self) -> Result<(), ServiceError>;
}

/// Marker for the `authentication.AuthPlugin` interface.
pub struct AuthPluginInterface;

impl Interface for AuthPluginInterface {
    const NAME: &'static str = "authentication.AuthPlugin";
    type Api = dyn AuthPlugin;
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthService
// ─────────────────────────────────────────────────────────────────────────────

/// Marker for the `authentication.AuthService` interface.
pub struct AuthServiceInterface;

impl Interface for AuthServiceInterface {
    const NAME: &'static str = "authentication.AuthService";
    type Api = AuthService;
}

/// Application-facing authentication state.
pub struct AuthService {
    state: ObservableCell<AuthState>,
    plugin: Arc<dyn AuthPlugin>,
    mirror: Reaction,
}

impl AuthService {
    /// Creates the service on top of `plugin`.
    #[must_use]
    pub fn new(plugin: Arc<dyn AuthPlugin>) -> Self {
        let source = plugin.auth_state();
        let state = ObservableCell::new(source.read_untracked());

        let target = state.clone();
        let mirror = Reaction::new(move || {
            let next = source.read();
            let previous = target.read_untracked();
            if previous != next {
                tracing::debug!(from = previous.kind(), to = next.kind(), "auth state changed");
            }
            target.write(next);
        });

        Self {
            state,
            plugin,
            mirror,
        }
    }

    /// Returns the observable authentication state.
    #[must_use]
    pub fn auth_state(&self) -> ObservableCell<AuthState> {
        self.state.clone()
    }

    /// Returns the current authentication state (tracked).
    #[must_use]
    pub fn get_auth_state(&self) -> AuthState {
        self.state.read()
    }

    /// Returns the current session, if a user is authenticated (tracked).
    #[must_use]
    pub fn get_session_info(&self) -> Option<SessionInfo> {
        self.state.read().session().cloned()
    }

    /// Ends the current session through the plugin.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] if no user is logged in
    /// - [`AuthError::Plugin`] if the mechanism fails
    pub fn logout(&self) -> Result<(), AuthError> {
        let current = self.state.read_untracked();
        let Some(session) = current.session() else {
            return Err(AuthError::NotAuthenticated);
        };
        tracing::info!(user = %session.user_id, "logging out");
        self.plugin.logout().map_err(AuthError::Plugin)
    }

    fn from_options(options: &ServiceOptions) -> Result<Self, ServiceError> {
        let plugin = options.references.get_view::<dyn AuthPlugin>("plugin")?;
        Ok(Self::new(plugin))
    }
}

impl Service for AuthService {
    fn destroy(&self) -> Result<(), ServiceError> {
        self.mirror.stop();
        Ok(())
    }
}

impl core::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService")
            .field("state", &self.state.read_untracked())
            .finish_non_exhaustive()
    }
}

/// Registers [`AuthService`] as `authentication.AuthService`.
///
/// The application must also register exactly one `authentication.AuthPlugin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPackage;

impl Package for AuthPackage {
    fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError> {
        registry.register([ServiceDescriptor::with_factory(
            "authentication.AuthServiceImpl",
            Arc::new(|options: ServiceOptions| -> Result<ServiceInstance, ServiceError> {
                let service = Arc::new(AuthService::from_options(&options)?);
                Ok(ServiceInstance::from_arc(Arc::clone(&service)).with_view::<AuthService>(service))
            }),
        )
        .provides(AuthServiceInterface::NAME)
        .reference("plugin", ReferenceSpec::single(AuthPluginInterface::NAME))])?;
        Ok(())
    }

    fn name(&self) -> &str {
        "authentication"
    }
}
