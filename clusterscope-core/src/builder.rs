//! Snapshot builder.
//!
//! The one place a snapshot is derived from scratch. Entities are loaded in
//! dependency order so that every reconciler step finds the owners it needs:
//!
//! 1. agents
//! 2. active frameworks
//! 3. completed frameworks (added, then removed)
//! 4. active tasks
//! 5. unreachable tasks
//! 6. completed tasks

use crate::error::SnapshotError;
use crate::event::GetState;
use crate::snapshot::ClusterSnapshot;
use tracing::debug;

/// Build a fresh snapshot from a full state payload.
///
/// The result is a new value; on error nothing has been applied anywhere.
pub fn build_snapshot(state: GetState) -> Result<ClusterSnapshot, SnapshotError> {
    let GetState {
        get_tasks,
        get_frameworks,
        get_agents,
    } = state;
    let mut snapshot = ClusterSnapshot::new();

    for agent in get_agents.agents {
        snapshot.agent_added(agent);
    }

    for framework in get_frameworks.frameworks {
        snapshot.framework_added(framework);
    }

    for framework in get_frameworks.completed_frameworks {
        let framework_id = framework.framework_info.id.clone();
        snapshot.framework_added(framework);
        snapshot.framework_removed(&framework_id);
    }

    for task in get_tasks.tasks {
        snapshot.task_added(task);
    }

    for task in get_tasks.unreachable_tasks {
        let framework = match snapshot.frameworks.get_mut(&task.framework_id) {
            Some(framework) => framework,
            None => snapshot
                .completed_frameworks
                .get_mut(&task.framework_id)
                .ok_or_else(|| SnapshotError::UnreachableTaskWithoutFramework {
                    task: task.key(),
                    framework_id: task.framework_id.clone(),
                })?,
        };
        framework.tasks.unreachable.insert(task.task_id.clone());
        framework.counters.increment(task.state);
        snapshot.tasks.unreachable.insert(task.key(), task);
    }

    for task in get_tasks.completed_tasks {
        let framework = match snapshot.frameworks.get_mut(&task.framework_id) {
            Some(framework) => Some(framework),
            None => snapshot.completed_frameworks.get_mut(&task.framework_id),
        };
        if let Some(framework) = framework {
            framework.tasks.completed.insert(task.task_id.clone());
            framework.counters.increment(task.state);
        }
        snapshot.tasks.completed.insert(task.key(), task);
    }

    debug!(
        agents = snapshot.agents.len(),
        frameworks = snapshot.frameworks.len(),
        completed_frameworks = snapshot.completed_frameworks.len(),
        tasks = snapshot.tasks.len(),
        "Snapshot built"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInfo, AgentPayload};
    use crate::event::{GetAgents, GetFrameworks, GetTasks};
    use crate::framework::{FrameworkInfo, FrameworkPayload};
    use crate::ids::{AgentId, FrameworkId, TaskId, TaskKey};
    use crate::resources::Resource;
    use crate::task::{Task, TaskBucket, TaskState};

    fn agent(id: &str, cpus: f64) -> AgentPayload {
        AgentPayload {
            agent_info: AgentInfo {
                id: AgentId::new(id),
                hostname: "host".to_string(),
                port: Some(5051),
                resources: Vec::new(),
            },
            active: true,
            pid: None,
            total_resources: vec![Resource::scalar("cpus", cpus)],
        }
    }

    fn framework(id: &str) -> FrameworkPayload {
        FrameworkPayload {
            framework_info: FrameworkInfo {
                id: FrameworkId::new(id),
                name: id.to_string(),
                user: "root".to_string(),
                role: None,
                roles: vec!["*".to_string()],
                principal: None,
                hostname: None,
                webui_url: None,
            },
            active: true,
            connected: true,
            recovered: false,
        }
    }

    fn task(id: &str, framework_id: &str, state: TaskState) -> Task {
        Task {
            name: id.to_string(),
            task_id: TaskId::new(id),
            framework_id: FrameworkId::new(framework_id),
            agent_id: AgentId::new("a1"),
            executor_id: None,
            state,
            resources: vec![Resource::scalar("cpus", 1.0)],
            statuses: Vec::new(),
        }
    }

    fn state() -> GetState {
        GetState {
            get_tasks: GetTasks {
                tasks: vec![task("t1", "fw", TaskState::Running)],
                unreachable_tasks: vec![task("t2", "fw", TaskState::Unreachable)],
                completed_tasks: vec![
                    task("t3", "fw", TaskState::Finished),
                    task("t4", "old", TaskState::Killed),
                    task("t5", "gone", TaskState::Lost),
                ],
            },
            get_frameworks: GetFrameworks {
                frameworks: vec![framework("fw")],
                completed_frameworks: vec![framework("old")],
            },
            get_agents: GetAgents {
                agents: vec![agent("a1", 4.0)],
            },
        }
    }

    #[test]
    fn single_agent_and_empty_framework() {
        let snapshot = build_snapshot(GetState {
            get_agents: GetAgents {
                agents: vec![agent("a1", 4.0)],
            },
            get_frameworks: GetFrameworks {
                frameworks: vec![framework("fw")],
                completed_frameworks: Vec::new(),
            },
            get_tasks: GetTasks::default(),
        })
        .unwrap();
        assert_eq!(snapshot.idle().cpus, 4.0);
        assert_eq!(snapshot.frameworks[&FrameworkId::new("fw")].shares.cpus, 0.0);
        assert_eq!(snapshot.activated_agents, 1);
    }

    #[test]
    fn places_each_task_list_in_its_bucket() {
        let snapshot = build_snapshot(state()).unwrap();
        let key = |fw: &str, t: &str| TaskKey::new(FrameworkId::new(fw), TaskId::new(t));
        assert_eq!(snapshot.tasks.locate(&key("fw", "t1")), Some(TaskBucket::Active));
        assert_eq!(snapshot.tasks.locate(&key("fw", "t2")), Some(TaskBucket::Unreachable));
        assert_eq!(snapshot.tasks.locate(&key("fw", "t3")), Some(TaskBucket::Completed));
        assert_eq!(snapshot.tasks.locate(&key("gone", "t5")), Some(TaskBucket::Completed));

        let fw = &snapshot.frameworks[&FrameworkId::new("fw")];
        assert_eq!(fw.tasks.len(), 3);
        assert_eq!(fw.counters.running, 1);
        assert_eq!(fw.counters.finished, 1);
        assert_eq!(fw.allocated.cpus, 1.0);
        assert_eq!(snapshot.allocated.cpus, 1.0);
        assert_eq!(snapshot.idle().cpus, 3.0);

        let old = &snapshot.completed_frameworks[&FrameworkId::new("old")];
        assert!(old.tasks.completed.contains(&TaskId::new("t4")));
        assert_eq!(old.counters.killed, 1);
        assert!(!snapshot.frameworks.contains_key(&FrameworkId::new("old")));
    }

    #[test]
    fn unreachable_task_of_unknown_framework_fails_the_load() {
        let mut payload = state();
        payload
            .get_tasks
            .unreachable_tasks
            .push(task("t9", "ghost", TaskState::Unreachable));
        let err = build_snapshot(payload).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::UnreachableTaskWithoutFramework {
                task: TaskKey::new(FrameworkId::new("ghost"), TaskId::new("t9")),
                framework_id: FrameworkId::new("ghost"),
            }
        );
    }

    #[test]
    fn building_twice_is_deterministic() {
        assert_eq!(build_snapshot(state()).unwrap(), build_snapshot(state()).unwrap());
    }
}
