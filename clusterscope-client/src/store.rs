//! Shared dashboard state with change notification.
//!
//! The engine is the only writer. Every accepted change bumps `version` and
//! wakes all readers.

use crate::notifications::Notification;
use crate::recovery::RetryNotice;
use crate::session::SessionState;
use crate::transport::MasterFlags;
use clusterscope_core::{ClusterSnapshot, LifecycleCounters};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::watch;

/// Notifications kept for display, oldest dropped first.
pub const NOTIFICATION_LIMIT: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    /// Absent until the first successful subscription.
    pub snapshot: Option<ClusterSnapshot>,
    /// Cluster-wide task counters from the metrics endpoint.
    pub metrics: LifecycleCounters,
    pub session: SessionState,
    pub flags: Option<MasterFlags>,
    pub retry: Option<RetryNotice>,
    pub notifications: VecDeque<Notification>,
    /// Notifications ever pushed, including ones already dropped.
    pub notifications_raised: u64,
    pub version: u64,
}

impl ClusterState {
    pub fn push_notification(&mut self, notification: Notification) {
        if self.notifications.len() == NOTIFICATION_LIMIT {
            self.notifications.pop_front();
        }
        self.notifications.push_back(notification);
        self.notifications_raised += 1;
    }

    /// Notifications pushed after the first `seen`, oldest first.
    pub fn notifications_since(&self, seen: u64) -> impl Iterator<Item = &Notification> {
        let unseen = self.notifications_raised.saturating_sub(seen);
        let unseen = usize::try_from(unseen).unwrap_or(usize::MAX);
        let skip = self.notifications.len().saturating_sub(unseen);
        self.notifications.iter().skip(skip)
    }

    pub fn agent_count(&self) -> usize {
        self.snapshot.as_ref().map_or(0, ClusterSnapshot::agent_count)
    }

    pub fn summary(&self) -> StateSummary {
        let snapshot = self.snapshot.as_ref();
        StateSummary {
            version: self.version,
            session: self.session,
            cluster: self.flags.as_ref().and_then(|flags| flags.cluster.clone()),
            agents: self.agent_count(),
            frameworks: snapshot.map_or(0, |s| s.frameworks.len()),
            active_tasks: snapshot.map_or(0, |s| s.tasks.active.len()),
            completed_tasks: snapshot.map_or(0, |s| s.tasks.completed.len()),
            idle_cpus: snapshot.map_or(0.0, |s| s.idle().cpus),
            running_tasks: self.metrics.running,
            retry_in_ms: self.retry.as_ref().map(|retry| retry.remaining_ms),
        }
    }
}

/// One-line view of the state, for headless output.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSummary {
    pub version: u64,
    pub session: SessionState,
    pub cluster: Option<String>,
    pub agents: usize,
    pub frameworks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub idle_cpus: f64,
    pub running_tasks: i64,
    pub retry_in_ms: Option<u64>,
}

impl fmt::Display for StateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[v{}] {} {}: {} agents, {} frameworks, {} active / {} completed tasks, {} idle cpus, {} running",
            self.version,
            self.cluster.as_deref().unwrap_or("(unnamed)"),
            self.session,
            self.agents,
            self.frameworks,
            self.active_tasks,
            self.completed_tasks,
            self.idle_cpus,
            self.running_tasks,
        )?;
        if let Some(ms) = self.retry_in_ms {
            write!(f, ", retrying in {}s", ms.div_ceil(1000))?;
        }
        Ok(())
    }
}

/// Write side, owned by the engine.
#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<ClusterState>,
}

impl StateStore {
    pub fn new() -> (Self, StateReader) {
        let (tx, rx) = watch::channel(ClusterState::default());
        (Self { tx }, StateReader { rx })
    }

    /// Apply `f`; readers are notified only when it reports a change.
    pub fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut ClusterState) -> bool,
    {
        self.tx.send_if_modified(|state| {
            let changed = f(state);
            if changed {
                state.version += 1;
            }
            changed
        })
    }

    pub fn read<R>(&self, f: impl FnOnce(&ClusterState) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side handed to views.
#[derive(Debug, Clone)]
pub struct StateReader {
    rx: watch::Receiver<ClusterState>,
}

impl StateReader {
    /// Wait for the next change. Errors once the engine has gone away.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    pub fn read<R>(&self, f: impl FnOnce(&ClusterState) -> R) -> R {
        f(&self.rx.borrow())
    }

    /// Mark the current value seen and read it.
    pub fn read_latest<R>(&mut self, f: impl FnOnce(&ClusterState) -> R) -> R {
        f(&self.rx.borrow_and_update())
    }

    /// Wait until `predicate` holds for the current state.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&ClusterState) -> bool,
    ) -> Result<(), watch::error::RecvError> {
        self.rx.wait_for(predicate).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationLevel;

    #[test]
    fn modify_bumps_version_only_on_change() {
        let (store, reader) = StateStore::new();
        assert!(!store.modify(|_| false));
        assert_eq!(reader.read(|s| s.version), 0);

        assert!(store.modify(|state| {
            state.session = SessionState::Streaming;
            true
        }));
        assert_eq!(reader.read(|s| (s.version, s.session)), (1, SessionState::Streaming));
    }

    #[tokio::test]
    async fn readers_wake_on_change() {
        let (store, mut reader) = StateStore::new();
        let mut second = store.subscribe();
        store.modify(|state| {
            state.metrics.running = 3;
            true
        });
        reader.changed().await.unwrap();
        second.changed().await.unwrap();
        assert_eq!(reader.read_latest(|s| s.metrics.running), 3);
    }

    #[test]
    fn notification_log_is_bounded() {
        let mut state = ClusterState::default();
        for i in 0..NOTIFICATION_LIMIT + 5 {
            state.push_notification(Notification::new(NotificationLevel::Info, i.to_string()));
        }
        assert_eq!(state.notifications.len(), NOTIFICATION_LIMIT);
        assert_eq!(state.notifications.front().unwrap().message, "5");
        assert_eq!(state.notifications_raised, NOTIFICATION_LIMIT as u64 + 5);

        let unseen: Vec<_> = state
            .notifications_since(NOTIFICATION_LIMIT as u64 + 3)
            .map(|n| n.message.as_str())
            .collect();
        assert_eq!(unseen, vec!["35", "36"]);
        assert_eq!(state.notifications_since(0).count(), NOTIFICATION_LIMIT);
    }

    #[test]
    fn summary_of_empty_state() {
        let summary = ClusterState::default().summary();
        assert_eq!(summary.agents, 0);
        assert_eq!(
            summary.to_string(),
            "[v0] (unnamed) disconnected: 0 agents, 0 frameworks, 0 active / 0 completed tasks, 0 idle cpus, 0 running"
        );
    }
}
