//! Event stream message types.
//!
//! Each message carries a `type` discriminator plus one payload field named
//! after it, e.g. `{"type": "TASK_ADDED", "task_added": {"task": {...}}}`.

use crate::agent::AgentPayload;
use crate::framework::{FrameworkInfo, FrameworkPayload};
use crate::ids::{AgentId, FrameworkId};
use crate::task::{Task, TaskState, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// First message of every subscription, carrying the full state.
    Subscribed { subscribed: Subscribed },
    TaskAdded { task_added: TaskAdded },
    TaskUpdated { task_updated: TaskUpdated },
    AgentAdded { agent_added: AgentAdded },
    AgentRemoved { agent_removed: AgentRemoved },
    FrameworkAdded { framework_added: FrameworkAdded },
    FrameworkUpdated { framework_updated: FrameworkUpdated },
    FrameworkRemoved { framework_removed: FrameworkRemoved },
    /// Keep-alive sent periodically by the master.
    Heartbeat,
    /// Any event type this client does not model.
    #[serde(other)]
    Unknown,
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Subscribed { .. } => "SUBSCRIBED",
            Event::TaskAdded { .. } => "TASK_ADDED",
            Event::TaskUpdated { .. } => "TASK_UPDATED",
            Event::AgentAdded { .. } => "AGENT_ADDED",
            Event::AgentRemoved { .. } => "AGENT_REMOVED",
            Event::FrameworkAdded { .. } => "FRAMEWORK_ADDED",
            Event::FrameworkUpdated { .. } => "FRAMEWORK_UPDATED",
            Event::FrameworkRemoved { .. } => "FRAMEWORK_REMOVED",
            Event::Heartbeat => "HEARTBEAT",
            Event::Unknown => "UNKNOWN",
        }
    }

    pub fn subscribed(get_state: GetState) -> Self {
        Event::Subscribed {
            subscribed: Subscribed {
                get_state,
                heartbeat_interval_seconds: None,
            },
        }
    }

    pub fn task_added(task: Task) -> Self {
        Event::TaskAdded {
            task_added: TaskAdded { task },
        }
    }

    pub fn task_updated(framework_id: FrameworkId, status: TaskStatus) -> Self {
        Event::TaskUpdated {
            task_updated: TaskUpdated {
                framework_id,
                state: status.state,
                status,
            },
        }
    }

    pub fn agent_added(agent: AgentPayload) -> Self {
        Event::AgentAdded {
            agent_added: AgentAdded { agent },
        }
    }

    pub fn agent_removed(agent_id: AgentId) -> Self {
        Event::AgentRemoved {
            agent_removed: AgentRemoved { agent_id },
        }
    }

    pub fn framework_added(framework: FrameworkPayload) -> Self {
        Event::FrameworkAdded {
            framework_added: FrameworkAdded { framework },
        }
    }

    pub fn framework_updated(framework: FrameworkPayload) -> Self {
        Event::FrameworkUpdated {
            framework_updated: FrameworkUpdated { framework },
        }
    }

    pub fn framework_removed(framework_info: FrameworkInfo) -> Self {
        Event::FrameworkRemoved {
            framework_removed: FrameworkRemoved { framework_info },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscribed {
    pub get_state: GetState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_seconds: Option<f64>,
}

/// Full state payload. The three sections are required; every list inside
/// them defaults to empty, since the master omits empty repeated fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetState {
    pub get_tasks: GetTasks,
    pub get_frameworks: GetFrameworks,
    pub get_agents: GetAgents,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetTasks {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub unreachable_tasks: Vec<Task>,
    #[serde(default)]
    pub completed_tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetFrameworks {
    #[serde(default)]
    pub frameworks: Vec<FrameworkPayload>,
    #[serde(default)]
    pub completed_frameworks: Vec<FrameworkPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetAgents {
    #[serde(default)]
    pub agents: Vec<AgentPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAdded {
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdated {
    pub framework_id: FrameworkId,
    pub status: TaskStatus,
    pub state: TaskState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAdded {
    pub agent: AgentPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRemoved {
    pub agent_id: AgentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkAdded {
    pub framework: FrameworkPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkUpdated {
    pub framework: FrameworkPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkRemoved {
    pub framework_info: FrameworkInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_task_updated() {
        let event: Event = serde_json::from_str(
            r#"{"type":"TASK_UPDATED","task_updated":{
                "framework_id":{"value":"fw"},
                "status":{"task_id":{"value":"t1"},"state":"TASK_FINISHED","timestamp":12.5},
                "state":"TASK_FINISHED"}}"#,
        )
        .unwrap();
        match event {
            Event::TaskUpdated { task_updated } => {
                assert_eq!(task_updated.framework_id, FrameworkId::new("fw"));
                assert_eq!(task_updated.state, TaskState::Finished);
                assert_eq!(task_updated.status.timestamp, 12.5);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn decodes_subscribed_with_omitted_lists() {
        let event: Event = serde_json::from_str(
            r#"{"type":"SUBSCRIBED","subscribed":{"get_state":{
                "get_tasks":{},"get_frameworks":{},"get_agents":{}},
                "heartbeat_interval_seconds":15}}"#,
        )
        .unwrap();
        match event {
            Event::Subscribed { subscribed } => {
                assert_eq!(subscribed.get_state, GetState::default());
                assert_eq!(subscribed.heartbeat_interval_seconds, Some(15.0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn subscribed_without_agents_section_is_malformed() {
        let result = serde_json::from_str::<Event>(
            r#"{"type":"SUBSCRIBED","subscribed":{"get_state":{
                "get_tasks":{},"get_frameworks":{}}}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn heartbeat_and_unmodelled_types_decode() {
        let event: Event = serde_json::from_str(r#"{"type":"HEARTBEAT"}"#).unwrap();
        assert_eq!(event, Event::Heartbeat);
        let event: Event =
            serde_json::from_str(r#"{"type":"OPERATION_UPDATED","operation_updated":{}}"#).unwrap();
        assert_eq!(event, Event::Unknown);
    }
}
