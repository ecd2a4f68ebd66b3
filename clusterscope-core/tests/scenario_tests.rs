use clusterscope_core::{
    build_snapshot, AgentId, Event, FrameworkId, IgnoreReason, Outcome, TaskBucket, TaskId,
    TaskKey, TaskState,
};
use clusterscope_test_utils::assertions::assert_all_invariants;
use clusterscope_test_utils::fixtures::{
    agent_payload, busy_cluster, framework_payload, small_cluster, task, task_updated,
};

fn key(framework_id: &str, task_id: &str) -> TaskKey {
    TaskKey::new(FrameworkId::new(framework_id), TaskId::new(task_id))
}

#[test]
fn idle_and_share_of_empty_framework() {
    let snapshot = build_snapshot(small_cluster()).unwrap();
    let fw = &snapshot.frameworks[&FrameworkId::new("fw")];
    assert_eq!(snapshot.idle().cpus, 4.0);
    assert_eq!(fw.shares.cpus, 0.0);
    assert_eq!(fw.shares.max, 0.0);
}

#[test]
fn running_task_added_to_known_owners() {
    let mut snapshot = build_snapshot(small_cluster()).unwrap();
    let outcome = snapshot.apply(Event::task_added(task("t1", "fw", "a1", TaskState::Running, 1.0)));
    assert_eq!(outcome, Outcome::Applied);

    let fw = &snapshot.frameworks[&FrameworkId::new("fw")];
    assert_eq!(fw.counters.running, 1);
    assert_eq!(fw.allocated.cpus, 1.0);
    assert_eq!(snapshot.agents[&AgentId::new("a1")].allocated.cpus, 1.0);
    assert_all_invariants(&snapshot);
}

#[test]
fn running_task_finishes() {
    let mut snapshot = build_snapshot(small_cluster()).unwrap();
    snapshot.apply(Event::task_added(task("t1", "fw", "a1", TaskState::Running, 1.0)));
    snapshot.apply(task_updated("fw", "t1", TaskState::Finished));

    let fw = &snapshot.frameworks[&FrameworkId::new("fw")];
    assert!(fw.tasks.active.is_empty());
    assert!(fw.tasks.completed.contains(&TaskId::new("t1")));
    assert_eq!(fw.counters.running, 0);
    assert_eq!(fw.counters.finished, 1);
    assert_eq!(snapshot.tasks.locate(&key("fw", "t1")), Some(TaskBucket::Completed));

    let t1 = snapshot.task(&key("fw", "t1")).unwrap();
    assert_eq!(t1.statuses.len(), 2);
    assert_eq!(t1.start_time().map(|t| t.timestamp()), Some(1));
    assert_eq!(t1.finish_time().map(|t| t.timestamp()), Some(2));
    assert_all_invariants(&snapshot);
}

#[test]
fn removed_framework_completes_its_tasks() {
    let mut snapshot = build_snapshot(small_cluster()).unwrap();
    snapshot.apply(Event::task_added(task("t1", "fw", "a1", TaskState::Running, 1.0)));
    snapshot.apply(Event::task_added(task("t2", "fw", "a1", TaskState::Staging, 1.0)));
    snapshot.apply(Event::framework_removed(framework_payload("fw").framework_info));

    assert!(snapshot.frameworks.is_empty());
    let fw = &snapshot.completed_frameworks[&FrameworkId::new("fw")];
    assert_eq!(fw.tasks.completed.len(), 2);
    assert!(fw.allocated.is_zero());
    assert_eq!(fw.shares.max, 0.0);
    for id in ["t1", "t2"] {
        assert_eq!(snapshot.tasks.locate(&key("fw", id)), Some(TaskBucket::Completed));
    }
    assert_all_invariants(&snapshot);
}

#[test]
fn unknown_agent_removal_changes_nothing() {
    let mut snapshot = build_snapshot(busy_cluster()).unwrap();
    let before = snapshot.clone();
    let outcome = snapshot.apply(Event::agent_removed(AgentId::new("ghost")));
    assert_eq!(
        outcome,
        Outcome::Ignored(IgnoreReason::UnknownAgent(AgentId::new("ghost")))
    );
    assert_eq!(snapshot, before);
}

#[test]
fn busy_cluster_loads_all_lists() {
    let snapshot = build_snapshot(busy_cluster()).unwrap();
    assert_eq!(snapshot.tasks.active.len(), 2);
    assert_eq!(snapshot.tasks.unreachable.len(), 1);
    assert_eq!(snapshot.tasks.completed.len(), 2);
    assert_eq!(snapshot.total.cpus, 12.0);
    assert_eq!(snapshot.allocated.cpus, 1.5);
    assert_eq!(snapshot.idle().cpus, 10.5);

    let fw = &snapshot.frameworks[&FrameworkId::new("fw")];
    assert_eq!(fw.counters.running, 1);
    assert_eq!(fw.counters.staging, 1);
    assert_eq!(fw.counters.finished, 1);
    assert_eq!(fw.shares.cpus, 1.5 / 12.0);
    assert_all_invariants(&snapshot);
}

#[test]
fn agent_lifecycle_updates_cluster_totals() {
    let mut snapshot = build_snapshot(small_cluster()).unwrap();
    let mut payload = agent_payload("a2", 2.0, 512.0);
    payload.active = false;
    snapshot.apply(Event::agent_added(payload));
    assert_eq!(snapshot.total.cpus, 6.0);
    assert_eq!(snapshot.total.mem, 1536.0);
    assert_eq!(snapshot.deactivated_agents, 1);

    snapshot.apply(Event::agent_removed(AgentId::new("a2")));
    assert_eq!(snapshot.total.cpus, 4.0);
    assert_eq!(snapshot.deactivated_agents, 0);
    assert_all_invariants(&snapshot);
}

#[test]
fn framework_update_replaces_record() {
    let mut snapshot = build_snapshot(busy_cluster()).unwrap();
    let mut payload = framework_payload("fw");
    payload.framework_info.name = "marathon-2".to_string();
    snapshot.apply(Event::framework_updated(payload));

    let fw = &snapshot.frameworks[&FrameworkId::new("fw")];
    assert_eq!(fw.info.name, "marathon-2");
    assert_eq!(fw.tasks.len(), 4);
    assert_all_invariants(&snapshot);
}
