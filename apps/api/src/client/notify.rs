use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

/// A user-facing message about the outcome of a workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn success(title: &str, description: Option<String>) -> Self {
        Self::new(NotificationKind::Success, title, description)
    }

    pub fn warning(title: &str, description: Option<String>) -> Self {
        Self::new(NotificationKind::Warning, title, description)
    }

    pub fn error(title: &str, description: Option<String>) -> Self {
        Self::new(NotificationKind::Error, title, description)
    }

    fn new(kind: NotificationKind, title: &str, description: Option<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description,
        }
    }
}

/// Port through which the workflow reports outcomes. Rendering (toasts, log
/// lines, a status bar) is up to the implementation.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

/// Writes notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let description = notification.description.as_deref().unwrap_or("");
        match notification.kind {
            NotificationKind::Success => info!("{}. {description}", notification.title),
            NotificationKind::Warning => warn!("{}. {description}", notification.title),
            NotificationKind::Error => error!("{}. {description}", notification.title),
        }
    }
}

/// Keeps every notification in order, for embedding UIs that drain them later.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries().pop()
    }

    pub fn titles(&self) -> Vec<String> {
        self.entries().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}
