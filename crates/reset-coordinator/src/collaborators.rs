//! Collaborators the reset sequence talks to but does not own

use std::future::Future;
use tracing::{error, info};

/// Asks the user to confirm a destructive action
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> impl Future<Output = bool> + Send;
}

/// Fixed answer, for non-interactive runs
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Severity of a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// User-facing feedback: transient toasts and the activity log panel
pub trait Notifier: Send + Sync {
    fn toast(&self, level: NoticeLevel, message: &str);
    fn activity(&self, level: NoticeLevel, message: &str);
}

/// Notifier that only writes to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn toast(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => error!(target: "toast", "{}", message),
            _ => info!(target: "toast", "{}", message),
        }
    }

    fn activity(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => error!(target: "activity", "{}", message),
            _ => info!(target: "activity", "{}", message),
        }
    }
}
