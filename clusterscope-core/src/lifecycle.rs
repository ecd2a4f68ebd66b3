//! Life-cycle counters.
//!
//! The same eight counters appear per framework (maintained by the
//! reconciler) and cluster-wide (overwritten from the master's metrics
//! endpoint).

use crate::task::TaskState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Staging,
    Starting,
    Running,
    Killing,
    Finished,
    Killed,
    Failed,
    Lost,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 8] = [
        Lifecycle::Staging,
        Lifecycle::Starting,
        Lifecycle::Running,
        Lifecycle::Killing,
        Lifecycle::Finished,
        Lifecycle::Killed,
        Lifecycle::Failed,
        Lifecycle::Lost,
    ];

    /// Key of the matching counter in the master's metrics snapshot.
    pub fn metric_key(&self) -> &'static str {
        match self {
            Lifecycle::Staging => "master/tasks_staging",
            Lifecycle::Starting => "master/tasks_starting",
            Lifecycle::Running => "master/tasks_running",
            Lifecycle::Killing => "master/tasks_killing",
            Lifecycle::Finished => "master/tasks_finished",
            Lifecycle::Killed => "master/tasks_killed",
            Lifecycle::Failed => "master/tasks_failed",
            Lifecycle::Lost => "master/tasks_lost",
        }
    }
}

/// Eight task counters.
///
/// Signed: a framework that was removed has its counters zeroed while its
/// tasks may still receive updates, which can drive a counter below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCounters {
    pub staging: i64,
    pub starting: i64,
    pub running: i64,
    pub killing: i64,
    pub finished: i64,
    pub killed: i64,
    pub failed: i64,
    pub lost: i64,
}

impl LifecycleCounters {
    pub fn get(&self, lifecycle: Lifecycle) -> i64 {
        match lifecycle {
            Lifecycle::Staging => self.staging,
            Lifecycle::Starting => self.starting,
            Lifecycle::Running => self.running,
            Lifecycle::Killing => self.killing,
            Lifecycle::Finished => self.finished,
            Lifecycle::Killed => self.killed,
            Lifecycle::Failed => self.failed,
            Lifecycle::Lost => self.lost,
        }
    }

    fn slot_mut(&mut self, lifecycle: Lifecycle) -> &mut i64 {
        match lifecycle {
            Lifecycle::Staging => &mut self.staging,
            Lifecycle::Starting => &mut self.starting,
            Lifecycle::Running => &mut self.running,
            Lifecycle::Killing => &mut self.killing,
            Lifecycle::Finished => &mut self.finished,
            Lifecycle::Killed => &mut self.killed,
            Lifecycle::Failed => &mut self.failed,
            Lifecycle::Lost => &mut self.lost,
        }
    }

    /// Count a task entering `state`. States without a counter are ignored.
    pub fn increment(&mut self, state: TaskState) {
        if let Some(lifecycle) = state.lifecycle() {
            *self.slot_mut(lifecycle) += 1;
        }
    }

    /// Uncount a task leaving `state`. States without a counter are ignored.
    pub fn decrement(&mut self, state: TaskState) {
        if let Some(lifecycle) = state.lifecycle() {
            *self.slot_mut(lifecycle) -= 1;
        }
    }

    pub fn total(&self) -> i64 {
        Lifecycle::ALL.iter().map(|l| self.get(*l)).sum()
    }

    /// Read the cluster-wide counters out of a metrics snapshot.
    ///
    /// Absent keys read as zero.
    pub fn from_metrics(metrics: &MetricsSnapshot) -> Self {
        let mut counters = Self::default();
        for lifecycle in Lifecycle::ALL {
            *counters.slot_mut(lifecycle) = metrics.get(lifecycle.metric_key()).unwrap_or(0.0) as i64;
        }
        counters
    }
}

/// Flat mapping of named scalar counters from the metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsSnapshot(pub HashMap<String, f64>);

impl MetricsSnapshot {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_and_decrement_follow_state_lookup() {
        let mut counters = LifecycleCounters::default();
        counters.increment(TaskState::Running);
        counters.increment(TaskState::Running);
        counters.increment(TaskState::Finished);
        counters.increment(TaskState::Unreachable);
        counters.decrement(TaskState::Running);
        assert_eq!(counters.running, 1);
        assert_eq!(counters.finished, 1);
        assert_eq!(counters.total(), 2);
    }

    #[test]
    fn decrement_past_zero_goes_negative() {
        let mut counters = LifecycleCounters::default();
        counters.decrement(TaskState::Killing);
        assert_eq!(counters.killing, -1);
    }

    #[test]
    fn metrics_snapshot_overwrites_every_counter() {
        let metrics: MetricsSnapshot = serde_json::from_str(
            r#"{"master/tasks_staging":1.0,"master/tasks_starting":2.0,
                "master/tasks_running":3.0,"master/tasks_killing":4.0,
                "master/tasks_finished":5.0,"master/tasks_killed":6.0,
                "master/tasks_failed":7.0,"master/tasks_lost":8.0,
                "master/uptime_secs":1234.5}"#,
        )
        .unwrap();
        let counters = LifecycleCounters::from_metrics(&metrics);
        let values: Vec<i64> = Lifecycle::ALL.iter().map(|l| counters.get(*l)).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn missing_metric_reads_as_zero() {
        let counters = LifecycleCounters::from_metrics(&MetricsSnapshot::default());
        assert_eq!(counters, LifecycleCounters::default());
    }
}
