//! Dashboard notices raised by the engine.
//!
//! Each constructor matches one thing the engine tells the user about. Only
//! a scheduled retry carries an action.

use crate::recovery::{FailureSource, RetryNotice};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
            NotificationLevel::Success => "ok",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Acknowledge the pending retry notice.
    Retry,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    /// Which side of the master connection the notice is about, if any.
    pub source: Option<FailureSource>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            action: None,
            source: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// A full snapshot was loaded from a new subscription.
    pub fn connected(agents: usize, frameworks: usize) -> Self {
        Self::new(
            NotificationLevel::Success,
            format!(
                "Connected to master: {} agents, {} frameworks",
                agents, frameworks
            ),
        )
    }

    /// A failure opened the retry countdown.
    pub fn retry_scheduled(notice: &RetryNotice) -> Self {
        let mut notification = Self::new(
            NotificationLevel::Error,
            format!(
                "Failed to reach {}: {}. Retrying in {}s",
                notice.source,
                notice.reason,
                notice.delay_ms.div_ceil(1000)
            ),
        )
        .with_action(NotificationAction::Retry);
        notification.source = Some(notice.source);
        notification
    }

    /// Stream and poller are being restarted.
    pub fn reconnecting() -> Self {
        Self::new(NotificationLevel::Info, "Reconnecting to master")
    }

    /// A snapshot was refused and the previous one stays on screen.
    pub fn snapshot_rejected(reason: impl fmt::Display) -> Self {
        let mut notification = Self::new(
            NotificationLevel::Warning,
            format!("Ignoring inconsistent cluster state: {}", reason),
        );
        notification.source = Some(FailureSource::Stream);
        notification
    }

    pub fn is_actionable(&self) -> bool {
        self.action.is_some()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)?;
        if self.action == Some(NotificationAction::Retry) {
            f.write_str(" (type `retry` to reconnect now)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(delay_ms: u64) -> RetryNotice {
        RetryNotice {
            source: FailureSource::Metrics,
            reason: "HTTP 503: unavailable".to_string(),
            delay_ms,
            remaining_ms: delay_ms,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn retry_notice_offers_an_action() {
        let notification = Notification::retry_scheduled(&notice(4000));
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.source, Some(FailureSource::Metrics));
        assert!(notification.is_actionable());
        assert_eq!(
            notification.to_string(),
            "[error] Failed to reach metrics: HTTP 503: unavailable. Retrying in 4s \
             (type `retry` to reconnect now)"
        );
    }

    #[test]
    fn retry_delay_rounds_up_to_whole_seconds() {
        let notification = Notification::retry_scheduled(&notice(4500));
        assert!(notification.message.ends_with("Retrying in 5s"));
    }

    #[test]
    fn informational_notices_have_no_action() {
        for notification in [
            Notification::connected(3, 1),
            Notification::reconnecting(),
            Notification::snapshot_rejected("unreachable task without framework"),
        ] {
            assert!(!notification.is_actionable());
        }
        assert_eq!(
            Notification::connected(3, 1).to_string(),
            "[ok] Connected to master: 3 agents, 1 frameworks"
        );
    }
}
