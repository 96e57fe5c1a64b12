//! Example Trails application.
//!
//! Starts the demo application, logs a user in and out, and shuts down.
//!
//! # Usage
//!
//! ```bash
//! trails-demo [user_id] [display_name]
//! ```
//!
//! Set `TRAILS_LOG` (for example in a `.env` file) to a filter such as
//! `trails_runtime=debug` to see the container at work.

use example::{DemoLogin, demo_application};
use trails_core_packages::{AuthPluginInterface, AuthServiceInterface, NotifierInterface};
use trails_runtime::service::Interface;

fn main() {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args().skip(1);
    let user_id = args.next().unwrap_or_else(|| "ada".to_owned());
    let display_name = args.next().unwrap_or_else(|| "Ada Lovelace".to_owned());

    let mut application = match demo_application() {
        Ok(application) => application,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Ok(filter) = std::env::var("TRAILS_LOG") {
        let mut overrides = serde_json::Map::new();
        overrides.insert("env_filter".to_owned(), filter.into());
        application = application.with_properties("tracing", overrides);
    }

    let mut container = match application.start() {
        Ok(container) => container,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let run = || -> Result<(), Box<dyn core::error::Error>> {
        let login = container.get_as::<DemoLogin>(AuthPluginInterface::NAME)?;
        let auth = container.resolve::<AuthServiceInterface>()?;
        let notifier = container.resolve::<NotifierInterface>()?;

        login.login(&user_id, &display_name);
        for notification in notifier.notifications().read() {
            tracing::info!(
                id = notification.id,
                level = ?notification.level,
                "{}",
                notification.message
            );
        }

        auth.logout()?;
        tracing::info!(state = ?auth.get_auth_state(), "session ended");
        Ok(())
    };
    if let Err(e) = run() {
        tracing::error!("{e}");
    }

    if let Err(e) = container.dispose() {
        for failure in e.failures() {
            tracing::error!(service = %failure.service, "{}", failure.error);
        }
    }
}
