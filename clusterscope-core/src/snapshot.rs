//! Entity stores.
//!
//! [`ClusterSnapshot`] is the root aggregate every view reads. It is only
//! ever changed by [`crate::build_snapshot`] (full replacement) and by the
//! reconciler methods in `reconcile.rs`.

use crate::agent::Agent;
use crate::framework::Framework;
use crate::ids::{AgentId, FrameworkId, TaskKey};
use crate::resources::ScalarResources;
use crate::task::{Task, TaskBucket};
use indexmap::IndexMap;

/// The three cluster-scope task lists, keyed by (framework, task).
///
/// Insertion order is kept so views list tasks in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBuckets {
    pub active: IndexMap<TaskKey, Task>,
    pub unreachable: IndexMap<TaskKey, Task>,
    pub completed: IndexMap<TaskKey, Task>,
}

impl TaskBuckets {
    pub fn get(&self, bucket: TaskBucket) -> &IndexMap<TaskKey, Task> {
        match bucket {
            TaskBucket::Active => &self.active,
            TaskBucket::Unreachable => &self.unreachable,
            TaskBucket::Completed => &self.completed,
        }
    }

    pub fn get_mut(&mut self, bucket: TaskBucket) -> &mut IndexMap<TaskKey, Task> {
        match bucket {
            TaskBucket::Active => &mut self.active,
            TaskBucket::Unreachable => &mut self.unreachable,
            TaskBucket::Completed => &mut self.completed,
        }
    }

    /// Bucket holding `key`, searched active, unreachable, completed.
    pub fn locate(&self, key: &TaskKey) -> Option<TaskBucket> {
        TaskBucket::ALL
            .into_iter()
            .find(|bucket| self.get(*bucket).contains_key(key))
    }

    pub fn task(&self, key: &TaskKey) -> Option<&Task> {
        self.locate(key).and_then(|bucket| self.get(bucket).get(key))
    }

    /// Remove the task from whichever bucket holds it.
    pub fn take(&mut self, key: &TaskKey) -> Option<(TaskBucket, Task)> {
        let bucket = self.locate(key)?;
        self.get_mut(bucket)
            .shift_remove(key)
            .map(|task| (bucket, task))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskBucket, &Task)> + '_ {
        TaskBucket::ALL
            .into_iter()
            .flat_map(move |bucket| self.get(bucket).values().map(move |task| (bucket, task)))
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.unreachable.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Complete in-memory cluster state at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSnapshot {
    pub agents: IndexMap<AgentId, Agent>,
    pub frameworks: IndexMap<FrameworkId, Framework>,
    /// Frameworks that were removed. Disjoint from `frameworks`.
    pub completed_frameworks: IndexMap<FrameworkId, Framework>,
    pub tasks: TaskBuckets,
    /// Sum of every known agent's total resources.
    pub total: ScalarResources,
    /// Sum of every known agent's allocated resources.
    pub allocated: ScalarResources,
    pub activated_agents: usize,
    pub deactivated_agents: usize,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity not yet allocated, per kind. Negative under oversubscription.
    pub fn idle(&self) -> ScalarResources {
        self.total - self.allocated
    }

    /// Look a framework up among active, then completed frameworks.
    pub fn framework(&self, id: &FrameworkId) -> Option<&Framework> {
        self.frameworks
            .get(id)
            .or_else(|| self.completed_frameworks.get(id))
    }

    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn task(&self, key: &TaskKey) -> Option<&Task> {
        self.tasks.task(key)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}
