//! Event reconciliation.
//!
//! One method per incremental event kind, each applied in place to an
//! existing [`ClusterSnapshot`]. Nothing is re-derived globally: every method
//! touches only the entities named by its event and folds the resource and
//! counter deltas into the affected aggregates.
//!
//! Events that reference unknown entities are not errors. Whatever can be
//! located is applied, the rest is skipped and reported through [`Outcome`].
//!
//! Delivery is assumed to be exactly once and in order. A repeated event is
//! logged, not masked.

use crate::agent::{Agent, AgentPayload};
use crate::event::{Event, TaskUpdated};
use crate::framework::{Framework, FrameworkPayload};
use crate::ids::{AgentId, FrameworkId, TaskKey};
use crate::snapshot::ClusterSnapshot;
use crate::task::{Task, TaskBucket};
use std::fmt;
use tracing::{debug, warn};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The snapshot changed.
    Applied,
    /// The snapshot is untouched.
    Ignored(IgnoreReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownFramework(FrameworkId),
    UnknownAgent(AgentId),
    UnknownTask(TaskKey),
    /// The framework has already been removed and cannot come back.
    CompletedFramework(FrameworkId),
    /// The event carries no incremental change (full state, keep-alive or an
    /// unmodelled type).
    NotIncremental(&'static str),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::UnknownFramework(id) => write!(f, "unknown framework {}", id),
            IgnoreReason::UnknownAgent(id) => write!(f, "unknown agent {}", id),
            IgnoreReason::UnknownTask(key) => write!(f, "unknown task {}", key),
            IgnoreReason::CompletedFramework(id) => write!(f, "framework {} already completed", id),
            IgnoreReason::NotIncremental(kind) => write!(f, "{} is not incremental", kind),
        }
    }
}

impl ClusterSnapshot {
    /// Apply one incremental event.
    ///
    /// `SUBSCRIBED` is not handled here; a full state replaces the snapshot
    /// through [`crate::build_snapshot`].
    pub fn apply(&mut self, event: Event) -> Outcome {
        match event {
            Event::TaskAdded { task_added } => self.task_added(task_added.task),
            Event::TaskUpdated { task_updated } => self.task_updated(task_updated),
            Event::AgentAdded { agent_added } => self.agent_added(agent_added.agent),
            Event::AgentRemoved { agent_removed } => self.agent_removed(&agent_removed.agent_id),
            Event::FrameworkAdded { framework_added } => {
                self.framework_added(framework_added.framework)
            }
            Event::FrameworkUpdated { framework_updated } => {
                self.framework_updated(framework_updated.framework)
            }
            Event::FrameworkRemoved { framework_removed } => {
                self.framework_removed(&framework_removed.framework_info.id)
            }
            other @ (Event::Subscribed { .. } | Event::Heartbeat | Event::Unknown) => {
                Outcome::Ignored(IgnoreReason::NotIncremental(other.event_type()))
            }
        }
    }

    /// Track a new task as active.
    ///
    /// Its resources are charged to the owning framework and agent when they
    /// are known. cpus and disk are summed, gpus and mem overwrite.
    pub fn task_added(&mut self, task: Task) -> Outcome {
        let key = task.key();
        if self.tasks.locate(&key).is_some() {
            warn!(task = %key, "Task added twice");
        }

        match self.frameworks.get_mut(&task.framework_id) {
            Some(framework) => {
                framework.tasks.active.insert(task.task_id.clone());
                framework.counters.increment(task.state);
                framework.allocated.accumulate_task(&task.resources);
                framework.refresh_shares(&self.total);
            }
            None => debug!(task = %key, "Task added for unknown framework"),
        }

        match self.agents.get_mut(&task.agent_id) {
            Some(agent) => {
                let before = agent.allocated;
                agent.allocated.accumulate_task(&task.resources);
                self.allocated += agent.allocated - before;
            }
            None => debug!(task = %key, agent_id = %task.agent_id, "Task added on unknown agent"),
        }

        self.tasks.active.insert(key, task);
        Outcome::Applied
    }

    /// Record a status change and move the task to the bucket of its new
    /// state, at cluster and framework scope.
    ///
    /// Allocated resources are not adjusted, even when the task terminates.
    pub fn task_updated(&mut self, update: TaskUpdated) -> Outcome {
        let TaskUpdated {
            framework_id,
            status,
            state,
        } = update;
        let key = TaskKey::new(framework_id.clone(), status.task_id.clone());

        let framework = match self.frameworks.get_mut(&framework_id) {
            Some(framework) => framework,
            None => match self.completed_frameworks.get_mut(&framework_id) {
                Some(framework) => framework,
                None => {
                    debug!(task = %key, "Task update for unknown framework");
                    return Outcome::Ignored(IgnoreReason::UnknownFramework(framework_id));
                }
            },
        };

        let (Some(framework_bucket), Some(cluster_bucket)) =
            (framework.tasks.locate(&key.task_id), self.tasks.locate(&key))
        else {
            debug!(task = %key, "Task update for unknown task");
            return Outcome::Ignored(IgnoreReason::UnknownTask(key));
        };
        let Some(mut task) = self.tasks.get_mut(cluster_bucket).shift_remove(&key) else {
            return Outcome::Ignored(IgnoreReason::UnknownTask(key));
        };

        framework.counters.decrement(task.state);
        framework.tasks.get_mut(framework_bucket).shift_remove(&key.task_id);

        let previous = task.state;
        task.record_status(status, state);
        let bucket = TaskBucket::for_state(state);
        debug!(
            task = %key,
            from = previous.as_str(),
            to = state.as_str(),
            bucket = ?bucket,
            "Task updated"
        );

        framework.tasks.get_mut(bucket).insert(key.task_id.clone());
        framework.counters.increment(state);
        self.tasks.get_mut(bucket).insert(key, task);
        Outcome::Applied
    }

    /// Add an agent and its capacity to the cluster totals.
    ///
    /// An agent re-added under a known id replaces the previous record.
    pub fn agent_added(&mut self, payload: AgentPayload) -> Outcome {
        let agent = Agent::from_payload(payload);
        if let Some(previous) = self.agents.shift_remove(agent.id()) {
            warn!(agent_id = %agent.id(), "Agent added twice, replacing previous record");
            self.retract_agent(&previous);
        }

        if agent.active {
            self.activated_agents += 1;
        } else {
            self.deactivated_agents += 1;
        }
        self.total += agent.total;
        self.allocated += agent.allocated;
        self.agents.insert(agent.id().clone(), agent);
        Outcome::Applied
    }

    pub fn agent_removed(&mut self, agent_id: &AgentId) -> Outcome {
        match self.agents.shift_remove(agent_id) {
            Some(agent) => {
                self.retract_agent(&agent);
                Outcome::Applied
            }
            None => {
                debug!(agent_id = %agent_id, "Removal of unknown agent");
                Outcome::Ignored(IgnoreReason::UnknownAgent(agent_id.clone()))
            }
        }
    }

    fn retract_agent(&mut self, agent: &Agent) {
        if agent.active {
            self.activated_agents = self.activated_agents.saturating_sub(1);
        } else {
            self.deactivated_agents = self.deactivated_agents.saturating_sub(1);
        }
        self.total -= agent.total;
        self.allocated -= agent.allocated;
    }

    /// Insert a framework, attaching every cluster-scope task it owns.
    ///
    /// An existing active framework with the same id is replaced. An id that
    /// has already completed is left alone.
    pub fn framework_added(&mut self, payload: FrameworkPayload) -> Outcome {
        if let Some(outcome) = self.reject_completed(&payload.framework_info.id) {
            return outcome;
        }
        let framework = self.attach_framework(payload);
        debug!(
            framework_id = %framework.id(),
            tasks = framework.tasks.len(),
            max_share = framework.shares.max,
            "Framework added"
        );
        self.frameworks.insert(framework.id().clone(), framework);
        Outcome::Applied
    }

    /// Replace an active framework record. Not a removal: its tasks stay
    /// where they are and are re-attached to the new record.
    pub fn framework_updated(&mut self, payload: FrameworkPayload) -> Outcome {
        if let Some(outcome) = self.reject_completed(&payload.framework_info.id) {
            return outcome;
        }
        self.frameworks.shift_remove(&payload.framework_info.id);
        self.framework_added(payload)
    }

    /// Move a framework to the completed collection.
    ///
    /// Its aggregates are zeroed and its active and unreachable tasks move to
    /// completed at both scopes. Task states and counters are left as they
    /// are.
    pub fn framework_removed(&mut self, framework_id: &FrameworkId) -> Outcome {
        let Some(mut framework) = self.frameworks.shift_remove(framework_id) else {
            debug!(framework_id = %framework_id, "Removal of unknown framework");
            return Outcome::Ignored(IgnoreReason::UnknownFramework(framework_id.clone()));
        };

        framework.reset_aggregates();
        for bucket in [TaskBucket::Active, TaskBucket::Unreachable] {
            let task_ids: Vec<_> = framework.tasks.get_mut(bucket).drain(..).collect();
            for task_id in task_ids {
                let key = TaskKey::new(framework_id.clone(), task_id.clone());
                match self.tasks.take(&key) {
                    Some((_, task)) => {
                        self.tasks.completed.insert(key, task);
                    }
                    None => warn!(task = %key, "Framework task missing at cluster scope"),
                }
                framework.tasks.completed.insert(task_id);
            }
        }

        debug!(
            framework_id = %framework_id,
            completed_tasks = framework.tasks.completed.len(),
            "Framework removed"
        );
        self.completed_frameworks
            .insert(framework_id.clone(), framework);
        Outcome::Applied
    }

    fn reject_completed(&self, framework_id: &FrameworkId) -> Option<Outcome> {
        if !self.completed_frameworks.contains_key(framework_id) {
            return None;
        }
        warn!(framework_id = %framework_id, "Framework event for a completed framework");
        Some(Outcome::Ignored(IgnoreReason::CompletedFramework(
            framework_id.clone(),
        )))
    }

    /// Build a framework record from scratch out of the cluster-scope task
    /// lists. Only active tasks contribute to its allocation.
    fn attach_framework(&self, payload: FrameworkPayload) -> Framework {
        let mut framework = Framework::from_payload(payload);
        let framework_id = framework.id().clone();
        for bucket in TaskBucket::ALL {
            let owned = self
                .tasks
                .get(bucket)
                .values()
                .filter(|task| task.framework_id == framework_id);
            for task in owned {
                framework.tasks.get_mut(bucket).insert(task.task_id.clone());
                framework.counters.increment(task.state);
                if bucket == TaskBucket::Active {
                    framework.allocated.accumulate(&task.resources);
                }
            }
        }
        framework.refresh_shares(&self.total);
        framework
    }
}
