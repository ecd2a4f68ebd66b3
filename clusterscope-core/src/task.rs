//! Tasks, task states and status history.

use crate::ids::{AgentId, ExecutorId, FrameworkId, TaskId, TaskKey};
use crate::lifecycle::Lifecycle;
use crate::resources::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Life-cycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    #[serde(rename = "TASK_STAGING")]
    Staging,
    #[serde(rename = "TASK_STARTING")]
    Starting,
    #[serde(rename = "TASK_RUNNING")]
    Running,
    #[serde(rename = "TASK_KILLING")]
    Killing,
    #[serde(rename = "TASK_FINISHED")]
    Finished,
    #[serde(rename = "TASK_FAILED")]
    Failed,
    #[serde(rename = "TASK_KILLED")]
    Killed,
    #[serde(rename = "TASK_ERROR")]
    Error,
    #[serde(rename = "TASK_LOST")]
    Lost,
    #[serde(rename = "TASK_DROPPED")]
    Dropped,
    #[serde(rename = "TASK_UNREACHABLE")]
    Unreachable,
    #[serde(rename = "TASK_GONE")]
    Gone,
    #[serde(rename = "TASK_GONE_BY_OPERATOR")]
    GoneByOperator,
    #[serde(rename = "TASK_UNKNOWN")]
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Whether no further transition can follow this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Error
                | TaskState::Failed
                | TaskState::Finished
                | TaskState::Killed
                | TaskState::Lost
                | TaskState::Dropped
                | TaskState::Gone
                | TaskState::GoneByOperator
        )
    }

    /// The per-framework counter this state is tallied under, if any.
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        match self {
            TaskState::Staging => Some(Lifecycle::Staging),
            TaskState::Starting => Some(Lifecycle::Starting),
            TaskState::Running => Some(Lifecycle::Running),
            TaskState::Killing => Some(Lifecycle::Killing),
            TaskState::Finished => Some(Lifecycle::Finished),
            TaskState::Killed => Some(Lifecycle::Killed),
            TaskState::Failed => Some(Lifecycle::Failed),
            TaskState::Lost => Some(Lifecycle::Lost),
            TaskState::Error
            | TaskState::Dropped
            | TaskState::Unreachable
            | TaskState::Gone
            | TaskState::GoneByOperator
            | TaskState::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Staging => "TASK_STAGING",
            TaskState::Starting => "TASK_STARTING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Killing => "TASK_KILLING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Killed => "TASK_KILLED",
            TaskState::Error => "TASK_ERROR",
            TaskState::Lost => "TASK_LOST",
            TaskState::Dropped => "TASK_DROPPED",
            TaskState::Unreachable => "TASK_UNREACHABLE",
            TaskState::Gone => "TASK_GONE",
            TaskState::GoneByOperator => "TASK_GONE_BY_OPERATOR",
            TaskState::Unknown => "TASK_UNKNOWN",
        }
    }
}

/// The three mutually exclusive task lists, at cluster and framework scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskBucket {
    Active,
    Unreachable,
    Completed,
}

impl TaskBucket {
    /// Search order used when locating a task.
    pub const ALL: [TaskBucket; 3] = [
        TaskBucket::Active,
        TaskBucket::Unreachable,
        TaskBucket::Completed,
    ];

    pub fn for_state(state: TaskState) -> Self {
        if state == TaskState::Unreachable {
            TaskBucket::Unreachable
        } else if state.is_terminal() {
            TaskBucket::Completed
        } else {
            TaskBucket::Active
        }
    }
}

/// One status record of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    /// Seconds since the epoch, as reported by the master.
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
}

impl TaskStatus {
    pub fn time(&self) -> Option<Timestamp> {
        DateTime::from_timestamp_millis((self.timestamp * 1000.0) as i64)
    }
}

/// A task as tracked by the dashboard.
///
/// Identity, owners and resources are fixed once the task is known; only the
/// state and the append-only status history change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub name: String,
    pub task_id: TaskId,
    pub framework_id: FrameworkId,
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<ExecutorId>,
    pub state: TaskState,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub statuses: Vec<TaskStatus>,
}

impl Task {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.framework_id.clone(), self.task_id.clone())
    }

    /// Executor id, defaulting to the task id for command tasks.
    pub fn executor_id(&self) -> ExecutorId {
        self.executor_id
            .clone()
            .unwrap_or_else(|| ExecutorId::new(self.task_id.as_str()))
    }

    /// Role of the first resource's allocation.
    pub fn role(&self) -> Option<&str> {
        self.resources.first().and_then(|r| r.role())
    }

    /// Time of the first status, unless that status was already terminal.
    pub fn start_time(&self) -> Option<Timestamp> {
        self.statuses
            .first()
            .filter(|status| !status.state.is_terminal())
            .and_then(TaskStatus::time)
    }

    /// Time of the last status, once the task is terminal.
    pub fn finish_time(&self) -> Option<Timestamp> {
        if !self.state.is_terminal() {
            return None;
        }
        self.statuses.last().and_then(TaskStatus::time)
    }

    /// Health reported by the last status.
    pub fn healthy(&self) -> Option<bool> {
        self.statuses.last().and_then(|status| status.healthy)
    }

    pub fn bucket(&self) -> TaskBucket {
        TaskBucket::for_state(self.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Append a status and move to `state`.
    pub fn record_status(&mut self, status: TaskStatus, state: TaskState) {
        self.statuses.push(status);
        self.state = state;
    }

    /// Sandbox path of this task inside its executor's directory.
    pub fn sandbox_directory(&self, executor: &ExecutorSandbox) -> String {
        match executor.kind {
            ExecutorKind::Default => format!("{}/tasks/{}", executor.directory, self.task_id),
            ExecutorKind::Custom => executor.directory.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutorKind {
    #[serde(rename = "DEFAULT")]
    Default,
    #[default]
    #[serde(other)]
    Custom,
}

/// The part of an agent's executor record needed to locate task sandboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSandbox {
    #[serde(rename = "type", default)]
    pub kind: ExecutorKind,
    pub directory: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: TaskState, timestamp: f64) -> TaskStatus {
        TaskStatus {
            task_id: TaskId::new("t1"),
            state,
            timestamp,
            healthy: None,
            message: None,
            agent_id: None,
        }
    }

    fn task(state: TaskState, statuses: Vec<TaskStatus>) -> Task {
        Task {
            name: "web".to_string(),
            task_id: TaskId::new("t1"),
            framework_id: FrameworkId::new("fw"),
            agent_id: AgentId::new("a1"),
            executor_id: None,
            state,
            resources: vec![Resource::scalar("cpus", 1.0).allocated_to("web")],
            statuses,
        }
    }

    #[test]
    fn terminal_classification_matches_master() {
        let terminal = [
            TaskState::Error,
            TaskState::Failed,
            TaskState::Finished,
            TaskState::Killed,
            TaskState::Lost,
            TaskState::Dropped,
            TaskState::Gone,
            TaskState::GoneByOperator,
        ];
        for state in terminal {
            assert!(state.is_terminal(), "{} should be terminal", state.as_str());
            assert_eq!(TaskBucket::for_state(state), TaskBucket::Completed);
        }
        for state in [
            TaskState::Staging,
            TaskState::Starting,
            TaskState::Running,
            TaskState::Killing,
            TaskState::Unknown,
        ] {
            assert!(!state.is_terminal());
            assert_eq!(TaskBucket::for_state(state), TaskBucket::Active);
        }
        assert_eq!(
            TaskBucket::for_state(TaskState::Unreachable),
            TaskBucket::Unreachable
        );
    }

    #[test]
    fn unrecognized_state_decodes_as_unknown() {
        let state: TaskState = serde_json::from_str(r#""TASK_SOMETHING_NEW""#).unwrap();
        assert_eq!(state, TaskState::Unknown);
        let state: TaskState = serde_json::from_str(r#""TASK_GONE_BY_OPERATOR""#).unwrap();
        assert_eq!(state, TaskState::GoneByOperator);
    }

    #[test]
    fn start_time_skips_terminal_first_status() {
        let running = task(TaskState::Running, vec![status(TaskState::Running, 10.0)]);
        assert_eq!(running.start_time().map(|t| t.timestamp()), Some(10));

        let failed = task(TaskState::Failed, vec![status(TaskState::Failed, 10.0)]);
        assert!(failed.start_time().is_none());
    }

    #[test]
    fn finish_time_follows_state_after_update() {
        let mut t = task(TaskState::Running, vec![status(TaskState::Running, 10.0)]);
        assert!(t.finish_time().is_none());

        t.record_status(status(TaskState::Finished, 25.5), TaskState::Finished);
        assert_eq!(t.finish_time().map(|t| t.timestamp_millis()), Some(25_500));
        assert_eq!(t.start_time().map(|t| t.timestamp()), Some(10));
        assert_eq!(t.statuses.len(), 2);
    }

    #[test]
    fn healthy_reads_last_status() {
        let mut last = status(TaskState::Running, 2.0);
        last.healthy = Some(false);
        let mut first = status(TaskState::Running, 1.0);
        first.healthy = Some(true);
        let t = task(TaskState::Running, vec![first, last]);
        assert_eq!(t.healthy(), Some(false));
    }

    #[test]
    fn metadata_defaults_for_bare_task() {
        let t: Task = serde_json::from_str(
            r#"{"task_id":{"value":"t9"},"framework_id":{"value":"fw"},
                "agent_id":{"value":"a1"},"state":"TASK_STAGING"}"#,
        )
        .unwrap();
        assert!(t.statuses.is_empty());
        assert!(t.role().is_none());
        assert_eq!(t.executor_id(), ExecutorId::new("t9"));
        assert!(t.start_time().is_none());
    }

    #[test]
    fn role_comes_from_first_resource() {
        let t = task(TaskState::Running, Vec::new());
        assert_eq!(t.role(), Some("web"));
    }

    #[test]
    fn sandbox_directory_depends_on_executor_kind() {
        let t = task(TaskState::Running, Vec::new());
        let default = ExecutorSandbox {
            kind: ExecutorKind::Default,
            directory: "/var/lib/sandbox/e1".to_string(),
        };
        let custom = ExecutorSandbox {
            kind: ExecutorKind::Custom,
            directory: "/var/lib/sandbox/e2".to_string(),
        };
        assert_eq!(t.sandbox_directory(&default), "/var/lib/sandbox/e1/tasks/t1");
        assert_eq!(t.sandbox_directory(&custom), "/var/lib/sandbox/e2");

        let decoded: ExecutorSandbox =
            serde_json::from_str(r#"{"type":"DEFAULT","directory":"/d"}"#).unwrap();
        assert_eq!(decoded.kind, ExecutorKind::Default);
        let decoded: ExecutorSandbox = serde_json::from_str(r#"{"directory":"/d"}"#).unwrap();
        assert_eq!(decoded.kind, ExecutorKind::Custom);
    }
}
