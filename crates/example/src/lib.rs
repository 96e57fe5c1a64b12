//! Example application assembled from Trails packages.
//!
//! The application combines the core packages with two local ones:
//!
//! - `demo-login`: an [`AuthPlugin`] that logs in a fixed user on request
//! - `greeter`: a manifest-declared service that welcomes every user who logs
//!   in through the notifier
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌───────────────┐
//! │  DemoLogin   │───▶│  AuthService   │───▶│    Greeter    │
//! │ (AuthPlugin) │    │ (mirror state) │    │  (Reaction)   │
//! └──────────────┘    └────────────────┘    └───────┬───────┘
//!                                                   ▼
//!                                           ┌───────────────┐
//!                                           │   Notifier    │
//!                                           └───────────────┘
//! ```

use std::sync::Arc;

use trails_core_packages::{
    AuthPackage, AuthPlugin, AuthPluginInterface, AuthService, AuthState, CorePackages,
    NotificationLevel, NotificationOptions, Notifier, SessionInfo,
};
use trails_runtime::application::Application;
use trails_runtime::error::{ContainerError, ServiceError};
use trails_runtime::options::ServiceOptions;
use trails_runtime::package::{ManifestPackage, Package, PackageGroup};
use trails_runtime::reactive::{ObservableCell, Reaction, untracked};
use trails_runtime::registry::{ServiceDescriptor, ServiceRegistry};
use trails_runtime::service::{Interface, Service, ServiceInstance};

/// Manifest of the `greeter` package.
pub const GREETER_MANIFEST: &str = r#"{
    "name": "greeter",
    "services": {
        "greeter.GreeterImpl": {
            "provides": "greeter.Greeter",
            "references": {
                "auth": "authentication.AuthService",
                "notifier": "notifier.NotificationService"
            }
        }
    },
    "properties": { "greeting": "Welcome" }
}"#;

// ─────────────────────────────────────────────────────────────────────────────
// DemoLogin
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication mechanism with a single hard-coded account.
#[derive(Debug)]
pub struct DemoLogin {
    state: ObservableCell<AuthState>,
}

impl DemoLogin {
    /// Creates a logged-out mechanism.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ObservableCell::new(AuthState::NotAuthenticated),
        }
    }

    /// Logs in `user_id`.
    pub fn login(&self, user_id: &str, display_name: &str) {
        tracing::debug!(user_id, "demo login");
        self.state.write(AuthState::Authenticated(
            SessionInfo::new(user_id).with_display_name(display_name),
        ));
    }
}

impl Default for DemoLogin {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthPlugin for DemoLogin {
    fn auth_state(&self) -> ObservableCell<AuthState> {
        self.state.clone()
    }

    fn logout(&self) -> Result<(), ServiceError> {
        self.state.write(AuthState::NotAuthenticated);
        Ok(())
    }
}

impl Service for DemoLogin {}

/// Provides [`DemoLogin`] as `authentication.AuthPlugin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoLoginPackage;

impl Package for DemoLoginPackage {
    fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError> {
        registry.register([ServiceDescriptor::with_factory(
            "demo.DemoLogin",
            Arc::new(|_: ServiceOptions| -> Result<ServiceInstance, ServiceError> {
                let login = Arc::new(DemoLogin::new());
                Ok(ServiceInstance::from_arc(Arc::clone(&login)).with_view::<dyn AuthPlugin>(login))
            }),
        )
        .provides(AuthPluginInterface::NAME)])?;
        Ok(())
    }

    fn name(&self) -> &str {
        "demo-login"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Greeter
// ─────────────────────────────────────────────────────────────────────────────

/// Emits a notification whenever a user logs in.
pub struct Greeter {
    greeted: ObservableCell<u32>,
    reaction: Reaction,
}

impl Greeter {
    fn from_options(options: &ServiceOptions) -> Result<Self, ServiceError> {
        let greeting: String = options.properties.get("greeting")?;
        let auth = options.references.get_as::<AuthService>("auth")?;
        let notifier = options.references.get_view::<dyn Notifier>("notifier")?;

        let state = auth.auth_state();
        let greeted = ObservableCell::new(0);
        let counter = greeted.clone();
        let reaction = Reaction::new(move || {
            let AuthState::Authenticated(session) = state.read() else {
                return;
            };
            let name = session.display_name.unwrap_or(session.user_id);
            untracked(|| {
                notifier.notify(
                    NotificationOptions::new(format!("{greeting}, {name}!"))
                        .with_level(NotificationLevel::Success)
                        .with_title("Logged in"),
                );
                counter.update(|n| *n += 1);
            });
        });

        Ok(Self { greeted, reaction })
    }

    /// Number of users greeted so far.
    #[must_use]
    pub fn greeted(&self) -> u32 {
        self.greeted.read_untracked()
    }
}

impl Service for Greeter {
    fn destroy(&self) -> Result<(), ServiceError> {
        self.reaction.stop();
        tracing::info!(greeted = self.greeted(), "greeter stopped");
        Ok(())
    }
}

/// Builds the `greeter` package from [`GREETER_MANIFEST`].
///
/// # Errors
///
/// Returns [`ContainerError::Manifest`] if the manifest does not parse.
pub fn greeter_package() -> Result<ManifestPackage, ContainerError> {
    Ok(ManifestPackage::from_json(GREETER_MANIFEST)?
        .with_factory("greeter.GreeterImpl", |options| Greeter::from_options(&options)))
}

/// The demo application: core packages, authentication through [`DemoLogin`] and the greeter.
///
/// # Errors
///
/// Returns an error if the greeter manifest does not parse.
pub fn demo_application() -> Result<Application, ContainerError> {
    Ok(Application::new()
        .add_packages(CorePackages.build())
        .add_packages(AuthPackage)
        .add_packages(DemoLoginPackage)
        .add_packages(greeter_package()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trails_core_packages::{NotifierInterface, TracingPackage};

    fn start() -> trails_runtime::container::Container {
        Application::new()
            .add_packages(CorePackages.build().disable::<TracingPackage>())
            .add_packages(AuthPackage)
            .add_packages(DemoLoginPackage)
            .add_packages(greeter_package().unwrap())
            .start()
            .unwrap()
    }

    #[test]
    fn greets_each_login() {
        let container = start();
        let login = container.get_as::<DemoLogin>(AuthPluginInterface::NAME).unwrap();
        let greeter = container.get_as::<Greeter>("greeter.Greeter").unwrap();
        let notifier = container.resolve::<NotifierInterface>().unwrap();

        login.login("ada", "Ada");
        login.logout().unwrap();
        login.login("bob", "Bob");

        let messages: Vec<_> = notifier
            .notifications()
            .read()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, ["Welcome, Ada!", "Welcome, Bob!"]);
        assert_eq!(greeter.greeted(), 2);
    }

    #[test]
    fn greeting_is_configurable() {
        let container = Application::new()
            .add_packages(CorePackages.build().disable::<TracingPackage>())
            .add_packages(AuthPackage)
            .add_packages(DemoLoginPackage)
            .add_packages(greeter_package().unwrap())
            .properties_from_json(r#"{ "greeter": { "greeting": "Hello" } }"#)
            .unwrap()
            .start()
            .unwrap();

        let login = container.get_as::<DemoLogin>(AuthPluginInterface::NAME).unwrap();
        login.login("ada", "Ada");

        let notifier = container.resolve::<NotifierInterface>().unwrap();
        assert_eq!(notifier.notifications().read()[0].message, "Hello, Ada!");
    }

    #[test]
    fn greeter_is_built_last() {
        let container = start();
        let order = container.construction_order();
        assert_eq!(
            order.last().map(|id| id.as_str()),
            Some("greeter.GreeterImpl")
        );
    }
}
