//! User-facing notifications.
//!
//! The context reports session and admin-lookup failures, and sign-out
//! results, through a [`Notifier`]. A UI injects one that raises toasts;
//! [`LogNotifier`] only writes to the log.

use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    /// An operation the user asked for succeeded.
    Success,
    /// Something failed and the user should know.
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Notification {
    /// Creates a success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// Creates an error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Shows `notification` to the user.
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification);
    }
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                tracing::info!(message = %notification.message, "notification");
            }
            NotificationLevel::Error => {
                tracing::warn!(message = %notification.message, "notification");
            }
        }
    }
}
