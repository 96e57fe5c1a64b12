//! User notifications.
//!
//! [`NotificationService`] keeps the list of active notifications in an
//! [`ObservableCell`], so a rendering layer can subscribe to it (or read it
//! inside a [`Reaction`](trails_runtime::reactive::Reaction)) and redraw
//! whenever a notification is added or dismissed.
//!
//! ```
//! use trails_core_packages::{NotificationLevel, NotificationOptions, NotifierInterface, NotifierPackage};
//! use trails_runtime::application::Application;
//!
//! let container = Application::new().add_packages(NotifierPackage).start()?;
//! let notifier = container.resolve::<NotifierInterface>()?;
//!
//! notifier.notify(NotificationOptions::new("Saved").with_level(NotificationLevel::Success));
//! assert_eq!(notifier.notifications().read().len(), 1);
//! # Ok::<(), trails_runtime::error::ContainerError>(())
//! ```

use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trails_runtime::error::{ContainerError, ServiceError};
use trails_runtime::options::ServiceOptions;
use trails_runtime::package::Package;
use trails_runtime::properties::Properties;
use trails_runtime::reactive::ObservableCell;
use trails_runtime::registry::{ServiceDescriptor, ServiceRegistry};
use trails_runtime::service::{Interface, Service, ServiceInstance};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Neutral information (default).
    #[default]
    Info,
    /// A completed operation.
    Success,
    /// Something needs attention.
    Warning,
    /// An operation failed.
    Error,
}

/// Input of [`Notifier::notify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    /// Severity.
    pub level: NotificationLevel,
    /// Optional heading.
    pub title: Option<String>,
    /// The message body.
    pub message: String,
    /// How long a rendering layer should keep the notification visible.
    pub display_duration: Option<Duration>,
}

impl NotificationOptions {
    /// Creates an info notification with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_level(mut self, level: NotificationLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the heading.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the display duration.
    #[must_use]
    pub fn with_display_duration(mut self, duration: Duration) -> Self {
        self.display_duration = Some(duration);
        self
    }
}

/// An active notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Identifier returned by [`Notifier::notify`].
    pub id: u64,
    /// Severity.
    pub level: NotificationLevel,
    /// Optional heading.
    pub title: Option<String>,
    /// The message body.
    pub message: String,
    /// How long the notification should stay visible.
    pub display_duration: Option<Duration>,
}

/// Capability of emitting user notifications.
pub trait Notifier: Send + Sync {
    /// Emits a notification and returns its identifier.
    fn notify(&self, options: NotificationOptions) -> u64;

    /// Removes the notification with `id`. Returns `false` if it is not active.
    fn dismiss(&self, id: u64) -> bool;

    /// Removes every active notification.
    fn clear_all(&self);

    /// Returns the observable list of active notifications, oldest first.
    fn notifications(&self) -> ObservableCell<Vec<Notification>>;
}

/// Marker for the `notifier.NotificationService` interface.
pub struct NotifierInterface;

impl Interface for NotifierInterface {
    const NAME: &'static str = "notifier.NotificationService";
    type Api = dyn Notifier;
}

/// The default [`Notifier`].
///
/// Keeps at most `max_notifications` entries; the oldest is dropped first.
/// The list is edited under the service's own lock and each result is
/// published to the observable cell, so `notifications()` is a read-only view:
/// edits go through the [`Notifier`] methods.
#[derive(Debug)]
pub struct NotificationService {
    entries: Mutex<Entries>,
    notifications: ObservableCell<Vec<Notification>>,
    published: Arc<AtomicU64>,
    next_id: AtomicU64,
    max_notifications: NonZeroUsize,
}

#[derive(Debug, Default)]
struct Entries {
    list: Vec<Notification>,
    revision: u64,
}

impl NotificationService {
    /// Creates a service keeping at most `max_notifications` entries.
    #[must_use]
    pub fn new(max_notifications: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            notifications: ObservableCell::new(Vec::new()),
            published: Arc::new(AtomicU64::new(0)),
            next_id: AtomicU64::new(1),
            max_notifications,
        }
    }

    fn from_options(options: &ServiceOptions) -> Result<Self, ServiceError> {
        // Deserializing into `NonZeroUsize` rejects a configured 0.
        Ok(Self::new(options.properties.get("max_notifications")?))
    }

    /// Applies `edit` to the list and publishes the result.
    fn edit<R>(&self, edit: impl FnOnce(&mut Vec<Notification>) -> R) -> R {
        let (result, snapshot, revision) = {
            let mut entries = self.entries.lock();
            let result = edit(&mut entries.list);
            entries.revision += 1;
            (result, entries.list.clone(), entries.revision)
        };

        // Publications from different threads may reach the cell out of order;
        // only a newer revision replaces the value.
        let published = Arc::clone(&self.published);
        self.notifications.update(move |current| {
            if published.fetch_max(revision, Ordering::AcqRel) < revision {
                *current = snapshot;
            }
        });
        result
    }
}

impl Notifier for NotificationService {
    fn notify(&self, options: NotificationOptions) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match options.level {
            NotificationLevel::Error => {
                tracing::error!(id, title = ?options.title, "{}", options.message);
            }
            NotificationLevel::Warning => {
                tracing::warn!(id, title = ?options.title, "{}", options.message);
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(id, title = ?options.title, "{}", options.message);
            }
        }

        let notification = Notification {
            id,
            level: options.level,
            title: options.title,
            message: options.message,
            display_duration: options.display_duration,
        };
        let max = self.max_notifications.get();
        self.edit(move |list| {
            list.push(notification);
            if list.len() > max {
                let excess = list.len() - max;
                list.drain(..excess);
            }
        });
        id
    }

    fn dismiss(&self, id: u64) -> bool {
        self.edit(|list| {
            let before = list.len();
            list.retain(|n| n.id != id);
            list.len() != before
        })
    }

    fn clear_all(&self) {
        self.edit(Vec::clear);
    }

    fn notifications(&self) -> ObservableCell<Vec<Notification>> {
        self.notifications.clone()
    }
}

impl Service for NotificationService {
    fn destroy(&self) -> Result<(), ServiceError> {
        self.clear_all();
        Ok(())
    }
}

/// Registers [`NotificationService`] as `notifier.NotificationService`.
///
/// # Properties
///
/// | Key | Default | Description |
/// |-----|---------|-------------|
/// | `max_notifications` | `50` | Upper bound of active notifications, at least 1 |
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifierPackage;

impl Package for NotifierPackage {
    fn build(&self, registry: &mut ServiceRegistry) -> Result<(), ContainerError> {
        registry.register([ServiceDescriptor::with_factory(
            "notifier.NotificationServiceImpl",
            Arc::new(|options: ServiceOptions| -> Result<ServiceInstance, ServiceError> {
                let service = Arc::new(NotificationService::from_options(&options)?);
                Ok(ServiceInstance::from_arc(Arc::clone(&service)).with_view::<dyn Notifier>(service))
            }),
        )
        .provides(NotifierInterface::NAME)])?;
        Ok(())
    }

    fn name(&self) -> &str {
        "notifier"
    }

    fn properties(&self) -> Properties {
        Properties::new().with("max_notifications", 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(max: usize) -> NotificationService {
        NotificationService::new(NonZeroUsize::new(max).unwrap())
    }

    #[test]
    fn notify_assigns_increasing_ids() {
        let service = service(10);
        let first = service.notify(NotificationOptions::new("a"));
        let second = service.notify(NotificationOptions::new("b").with_title("B"));

        assert!(second > first);
        let list = service.notifications().read();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].title.as_deref(), Some("B"));
    }

    #[test]
    fn oldest_entries_are_dropped() {
        let service = service(2);
        for message in ["a", "b", "c"] {
            service.notify(NotificationOptions::new(message));
        }
        let messages: Vec<_> = service
            .notifications()
            .read()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, ["b", "c"]);
    }

    #[test]
    fn dismiss_and_clear() {
        let service = service(10);
        let id = service.notify(NotificationOptions::new("a"));
        service.notify(NotificationOptions::new("b"));

        assert!(service.dismiss(id));
        assert!(!service.dismiss(id));
        assert_eq!(service.notifications().read().len(), 1);

        service.clear_all();
        assert!(service.notifications().read().is_empty());
    }

    #[test]
    fn clearing_an_empty_list_does_not_notify() {
        let service = service(10);
        let cell = service.notifications();
        service.clear_all();
        assert_eq!(cell.version(), 0);
    }

    #[test]
    fn dismiss_reports_only_what_it_removed() {
        let service = service(10);
        let id = service.notify(NotificationOptions::new("a"));

        service.clear_all();
        assert!(!service.dismiss(id));
        assert_eq!(service.notifications().version(), 2);
    }

    #[test]
    fn concurrent_dismissals_each_win_once() {
        let service = Arc::new(service(100));
        let ids: Vec<u64> = (0..50)
            .map(|i| service.notify(NotificationOptions::new(format!("n{i}"))))
            .collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                let ids = ids.clone();
                std::thread::spawn(move || ids.into_iter().filter(|&id| service.dismiss(id)).count())
            })
            .collect();
        let removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(removed, 50);
        assert!(service.notifications().read().is_empty());
    }
}
