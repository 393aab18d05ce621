//! Notification dispatch.
//!
//! The engine hands fired reminders to a [`Notifier`] it was constructed
//! with. Delivery is best-effort: a failing notifier is logged and the
//! reminder still counts as fired.

use std::sync::{Mutex, PoisonError};

use chrono::NaiveDateTime;

use crate::error::NotifyError;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, fire_at: NaiveDateTime) -> Result<(), NotifyError>;
}

/// Writes notifications to the log at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, body: &str, fire_at: NaiveDateTime) -> Result<(), NotifyError> {
        tracing::info!(%fire_at, title, body, "reminder");
        Ok(())
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub fire_at: NaiveDateTime,
}

/// Keeps every notification in memory, for tests and for frontends that
/// drain and display them on their own schedule.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str, fire_at: NaiveDateTime) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notification {
                title: title.to_string(),
                body: body.to_string(),
                fire_at,
            });
        Ok(())
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify(&self, title: &str, body: &str, fire_at: NaiveDateTime) -> Result<(), NotifyError> {
        (**self).notify(title, body, fire_at)
    }
}
