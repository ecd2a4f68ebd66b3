//! Frameworks and their per-framework task lists.

use crate::ids::{FrameworkId, TaskId};
use crate::lifecycle::LifecycleCounters;
use crate::resources::{ScalarResources, Shares};
use crate::task::TaskBucket;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub id: FrameworkId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: String,
    /// Single role of frameworks registered before multi-role support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webui_url: Option<String>,
}

impl FrameworkInfo {
    /// Roles of the framework, falling back to the legacy single role.
    pub fn effective_roles(&self) -> Vec<String> {
        if self.roles.is_empty() {
            self.role.iter().cloned().collect()
        } else {
            self.roles.clone()
        }
    }
}

/// Framework record as delivered in the full state and in framework events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkPayload {
    pub framework_info: FrameworkInfo,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub recovered: bool,
}

/// Ids of a framework's tasks, one ordered set per life-cycle bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkTasks {
    pub active: IndexSet<TaskId>,
    pub unreachable: IndexSet<TaskId>,
    pub completed: IndexSet<TaskId>,
}

impl FrameworkTasks {
    pub fn get(&self, bucket: TaskBucket) -> &IndexSet<TaskId> {
        match bucket {
            TaskBucket::Active => &self.active,
            TaskBucket::Unreachable => &self.unreachable,
            TaskBucket::Completed => &self.completed,
        }
    }

    pub fn get_mut(&mut self, bucket: TaskBucket) -> &mut IndexSet<TaskId> {
        match bucket {
            TaskBucket::Active => &mut self.active,
            TaskBucket::Unreachable => &mut self.unreachable,
            TaskBucket::Completed => &mut self.completed,
        }
    }

    /// Bucket holding `task_id`, searched active, unreachable, completed.
    pub fn locate(&self, task_id: &TaskId) -> Option<TaskBucket> {
        TaskBucket::ALL
            .into_iter()
            .find(|bucket| self.get(*bucket).contains(task_id))
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.unreachable.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A framework as tracked by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    pub info: FrameworkInfo,
    pub roles: Vec<String>,
    pub active: bool,
    pub connected: bool,
    pub recovered: bool,
    pub tasks: FrameworkTasks,
    pub counters: LifecycleCounters,
    pub allocated: ScalarResources,
    pub shares: Shares,
}

impl Framework {
    /// A fresh record with empty task lists and zeroed aggregates.
    pub fn from_payload(payload: FrameworkPayload) -> Self {
        Self {
            roles: payload.framework_info.effective_roles(),
            info: payload.framework_info,
            active: payload.active,
            connected: payload.connected,
            recovered: payload.recovered,
            tasks: FrameworkTasks::default(),
            counters: LifecycleCounters::default(),
            allocated: ScalarResources::default(),
            shares: Shares::default(),
        }
    }

    pub fn id(&self) -> &FrameworkId {
        &self.info.id
    }

    pub fn refresh_shares(&mut self, cluster_total: &ScalarResources) {
        self.shares = Shares::compute(&self.allocated, cluster_total);
    }

    /// Zero counters, allocation and shares. Task lists are left alone.
    pub fn reset_aggregates(&mut self) {
        self.counters = LifecycleCounters::default();
        self.allocated = ScalarResources::default();
        self.shares = Shares::default();
    }
}
