//! Clusterscope Test Utilities
//!
//! Shared test infrastructure for the clusterscope workspace:
//! - Fixtures for master payloads and events
//! - Proptest generators for full states and event sequences
//! - Invariant assertions over a [`ClusterSnapshot`]

pub use clusterscope_core::{
    build_snapshot, Agent, AgentId, AgentInfo, AgentPayload, ClusterSnapshot, Event, Framework,
    FrameworkId, FrameworkInfo, FrameworkPayload, GetAgents, GetFrameworks, GetState, GetTasks,
    Lifecycle, MetricsSnapshot, Resource, ScalarResources, Task, TaskBucket, TaskId, TaskKey,
    TaskState, TaskStatus,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built payloads for common testing scenarios.

    use super::*;

    pub fn agent_payload(id: &str, cpus: f64, mem: f64) -> AgentPayload {
        AgentPayload {
            agent_info: AgentInfo {
                id: AgentId::new(id),
                hostname: format!("{}.cluster.local", id),
                port: Some(5051),
                resources: Vec::new(),
            },
            active: true,
            pid: Some("slave(1)@10.0.0.1:5051".to_string()),
            total_resources: vec![Resource::scalar("cpus", cpus), Resource::scalar("mem", mem)],
        }
    }

    pub fn framework_payload(id: &str) -> FrameworkPayload {
        FrameworkPayload {
            framework_info: FrameworkInfo {
                id: FrameworkId::new(id),
                name: format!("{}-scheduler", id),
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

    pub fn task(id: &str, framework_id: &str, agent_id: &str, state: TaskState, cpus: f64) -> Task {
        Task {
            name: id.to_string(),
            task_id: TaskId::new(id),
            framework_id: FrameworkId::new(framework_id),
            agent_id: AgentId::new(agent_id),
            executor_id: None,
            state,
            resources: vec![Resource::scalar("cpus", cpus).allocated_to("*")],
            statuses: vec![status(id, state, 1.0)],
        }
    }

    pub fn status(task_id: &str, state: TaskState, timestamp: f64) -> TaskStatus {
        TaskStatus {
            task_id: TaskId::new(task_id),
            state,
            timestamp,
            healthy: None,
            message: None,
            agent_id: None,
        }
    }

    pub fn task_updated(framework_id: &str, task_id: &str, state: TaskState) -> Event {
        Event::task_updated(FrameworkId::new(framework_id), status(task_id, state, 2.0))
    }

    /// One agent `a1` (4 cpus, 1024 mem), one framework `fw`, no tasks.
    pub fn small_cluster() -> GetState {
        GetState {
            get_tasks: GetTasks::default(),
            get_frameworks: GetFrameworks {
                frameworks: vec![framework_payload("fw")],
                completed_frameworks: Vec::new(),
            },
            get_agents: GetAgents {
                agents: vec![agent_payload("a1", 4.0, 1024.0)],
            },
        }
    }

    /// Two agents, one active framework with a running, an unreachable and a
    /// finished task, and one completed framework with a killed task.
    pub fn busy_cluster() -> GetState {
        GetState {
            get_tasks: GetTasks {
                tasks: vec![
                    task("web-1", "fw", "a1", TaskState::Running, 1.0),
                    task("web-2", "fw", "a2", TaskState::Staging, 0.5),
                ],
                unreachable_tasks: vec![task("web-0", "fw", "a2", TaskState::Unreachable, 1.0)],
                completed_tasks: vec![
                    task("batch-1", "fw", "a1", TaskState::Finished, 2.0),
                    task("old-1", "old", "a1", TaskState::Killed, 1.0),
                ],
            },
            get_frameworks: GetFrameworks {
                frameworks: vec![framework_payload("fw")],
                completed_frameworks: vec![framework_payload("old")],
            },
            get_agents: GetAgents {
                agents: vec![
                    agent_payload("a1", 4.0, 1024.0),
                    agent_payload("a2", 8.0, 2048.0),
                ],
            },
        }
    }

    /// Metrics snapshot holding the eight task counters with the given values.
    pub fn metrics(values: [f64; 8]) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        for (lifecycle, value) in Lifecycle::ALL.into_iter().zip(values) {
            snapshot.0.insert(lifecycle.metric_key().to_string(), value);
        }
        snapshot
    }

    /// Frame an event the way the master's subscribe stream does:
    /// `<length>\n<json>`.
    pub fn record(event: &Event) -> Vec<u8> {
        let json = serde_json::to_vec(event).expect("event serializes");
        let mut frame = format!("{}\n", json.len()).into_bytes();
        frame.extend_from_slice(&json);
        frame
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for full states and event sequences.
    //!
    //! Scalar values are multiples of 0.5 so that sums and differences stay
    //! exact and aggregates can be compared with `==`.

    use super::*;
    use proptest::prelude::*;

    const ALL_STATES: [TaskState; 14] = [
        TaskState::Staging,
        TaskState::Starting,
        TaskState::Running,
        TaskState::Killing,
        TaskState::Finished,
        TaskState::Failed,
        TaskState::Killed,
        TaskState::Error,
        TaskState::Lost,
        TaskState::Dropped,
        TaskState::Unreachable,
        TaskState::Gone,
        TaskState::GoneByOperator,
        TaskState::Unknown,
    ];

    pub fn arb_scalar() -> impl Strategy<Value = f64> {
        (0u32..32).prop_map(|v| f64::from(v) / 2.0)
    }

    pub fn arb_resources() -> impl Strategy<Value = Vec<Resource>> {
        let name = prop::sample::select(vec!["cpus", "gpus", "mem", "disk", "ports"]);
        prop::collection::vec((name, arb_scalar()), 0..5).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(name, value)| Resource::scalar(name, value))
                .collect()
        })
    }

    pub fn arb_task_state() -> impl Strategy<Value = TaskState> {
        prop::sample::select(ALL_STATES.to_vec())
    }

    pub fn arb_active_state() -> impl Strategy<Value = TaskState> {
        prop::sample::select(vec![
            TaskState::Staging,
            TaskState::Starting,
            TaskState::Running,
            TaskState::Killing,
        ])
    }

    pub fn arb_terminal_state() -> impl Strategy<Value = TaskState> {
        prop::sample::select(
            ALL_STATES
                .into_iter()
                .filter(TaskState::is_terminal)
                .collect::<Vec<_>>(),
        )
    }

    /// Placement of one generated task: owner index, agent index, bucket.
    #[derive(Debug, Clone)]
    pub struct TaskSpec {
        pub owner: usize,
        pub agent: usize,
        pub bucket: TaskBucket,
        pub active_state: TaskState,
        pub terminal_state: TaskState,
        pub resources: Vec<Resource>,
    }

    pub fn arb_task_spec() -> impl Strategy<Value = TaskSpec> {
        (
            0usize..8,
            0usize..5,
            prop::sample::select(TaskBucket::ALL.to_vec()),
            arb_active_state(),
            arb_terminal_state(),
            arb_resources(),
        )
            .prop_map(
                |(owner, agent, bucket, active_state, terminal_state, resources)| TaskSpec {
                    owner,
                    agent,
                    bucket,
                    active_state,
                    terminal_state,
                    resources,
                },
            )
    }

    prop_compose! {
        /// A well-formed full state.
        ///
        /// Tasks may reference unknown frameworks and agents, except
        /// unreachable tasks, which always name a known framework.
        pub fn arb_get_state()(
            agents in prop::collection::vec((arb_scalar(), arb_scalar(), any::<bool>()), 1..4),
            frameworks in 0usize..4,
            completed_frameworks in 0usize..3,
            specs in prop::collection::vec(arb_task_spec(), 0..24),
        ) -> GetState {
            let framework_name = |owner: usize| {
                if owner < frameworks {
                    format!("fw{}", owner)
                } else if owner < frameworks + completed_frameworks {
                    format!("done{}", owner - frameworks)
                } else {
                    format!("orphan{}", owner)
                }
            };
            let known = |owner: usize| owner < frameworks + completed_frameworks;

            let mut tasks = GetTasks::default();
            for (i, spec) in specs.into_iter().enumerate() {
                let agent_id = if spec.agent < agents.len() {
                    format!("a{}", spec.agent)
                } else {
                    "a-missing".to_string()
                };
                let mut task = fixtures::task(
                    &format!("t{}", i),
                    &framework_name(spec.owner),
                    &agent_id,
                    spec.active_state,
                    0.0,
                );
                task.resources = spec.resources;
                match spec.bucket {
                    TaskBucket::Active => tasks.tasks.push(task),
                    TaskBucket::Unreachable if known(spec.owner) => {
                        task.state = TaskState::Unreachable;
                        tasks.unreachable_tasks.push(task);
                    }
                    TaskBucket::Unreachable | TaskBucket::Completed => {
                        task.state = spec.terminal_state;
                        tasks.completed_tasks.push(task);
                    }
                }
            }

            GetState {
                get_tasks: tasks,
                get_frameworks: GetFrameworks {
                    frameworks: (0..frameworks)
                        .map(|i| fixtures::framework_payload(&format!("fw{}", i)))
                        .collect(),
                    completed_frameworks: (0..completed_frameworks)
                        .map(|i| fixtures::framework_payload(&format!("done{}", i)))
                        .collect(),
                },
                get_agents: GetAgents {
                    agents: agents
                        .into_iter()
                        .enumerate()
                        .map(|(i, (cpus, mem, active))| {
                            let mut agent = fixtures::agent_payload(&format!("a{}", i), cpus, mem);
                            agent.active = active;
                            agent
                        })
                        .collect(),
                },
            }
        }
    }

    /// An abstract incremental change, resolved against the current snapshot
    /// by [`Op::realize`] so that generated sequences stay realistic.
    #[derive(Debug, Clone)]
    pub enum Op {
        AddTask {
            framework: usize,
            agent: usize,
            state: TaskState,
            resources: Vec<Resource>,
        },
        UpdateTask {
            pick: usize,
            state: TaskState,
        },
        AddAgent {
            cpus: f64,
            mem: f64,
            active: bool,
        },
        RemoveAgent {
            pick: usize,
        },
        AddFramework,
        UpdateFramework {
            pick: usize,
            role: String,
        },
        RemoveFramework {
            pick: usize,
        },
    }

    impl Op {
        /// Turn the op into a concrete event. `serial` must be unique per op
        /// in a sequence; it names newly created entities.
        ///
        /// Returns `None` when the op needs an entity the snapshot lacks.
        pub fn realize(&self, snapshot: &ClusterSnapshot, serial: usize) -> Option<Event> {
            match self {
                Op::AddTask {
                    framework,
                    agent,
                    state,
                    resources,
                } => {
                    // One past the end picks an unknown owner.
                    let framework_id = snapshot
                        .frameworks
                        .keys()
                        .nth(framework % (snapshot.frameworks.len() + 1))
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "orphan".to_string());
                    let agent_id = snapshot
                        .agents
                        .keys()
                        .nth(agent % (snapshot.agents.len() + 1))
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "a-missing".to_string());
                    let mut task = fixtures::task(
                        &format!("op{}", serial),
                        &framework_id,
                        &agent_id,
                        *state,
                        0.0,
                    );
                    task.resources = resources.clone();
                    Some(Event::task_added(task))
                }
                Op::UpdateTask { pick, state } => {
                    if snapshot.tasks.is_empty() {
                        return None;
                    }
                    let (_, task) = snapshot.tasks.iter().nth(pick % snapshot.tasks.len())?;
                    Some(Event::task_updated(
                        task.framework_id.clone(),
                        fixtures::status(task.task_id.as_str(), *state, serial as f64),
                    ))
                }
                Op::AddAgent { cpus, mem, active } => {
                    let mut agent = fixtures::agent_payload(&format!("agent-op{}", serial), *cpus, *mem);
                    agent.active = *active;
                    Some(Event::agent_added(agent))
                }
                Op::RemoveAgent { pick } => {
                    if snapshot.agents.is_empty() {
                        return None;
                    }
                    let id = snapshot.agents.keys().nth(pick % snapshot.agents.len())?;
                    Some(Event::agent_removed(id.clone()))
                }
                Op::AddFramework => Some(Event::framework_added(fixtures::framework_payload(
                    &format!("fw-op{}", serial),
                ))),
                Op::UpdateFramework { pick, role } => {
                    if snapshot.frameworks.is_empty() {
                        return None;
                    }
                    let id = snapshot.frameworks.keys().nth(pick % snapshot.frameworks.len())?;
                    let mut payload = fixtures::framework_payload(id.as_str());
                    payload.framework_info.roles = vec![role.clone()];
                    Some(Event::framework_updated(payload))
                }
                Op::RemoveFramework { pick } => {
                    if snapshot.frameworks.is_empty() {
                        return None;
                    }
                    let id = snapshot.frameworks.keys().nth(pick % snapshot.frameworks.len())?;
                    Some(Event::framework_removed(
                        fixtures::framework_payload(id.as_str()).framework_info,
                    ))
                }
            }
        }
    }

    pub fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (any::<usize>(), any::<usize>(), arb_task_state(), arb_resources()).prop_map(
                |(framework, agent, state, resources)| Op::AddTask {
                    framework,
                    agent,
                    state,
                    resources,
                }
            ),
            6 => (any::<usize>(), arb_task_state()).prop_map(|(pick, state)| Op::UpdateTask { pick, state }),
            1 => (arb_scalar(), arb_scalar(), any::<bool>())
                .prop_map(|(cpus, mem, active)| Op::AddAgent { cpus, mem, active }),
            1 => any::<usize>().prop_map(|pick| Op::RemoveAgent { pick }),
            1 => Just(Op::AddFramework),
            1 => (any::<usize>(), "[a-z]{1,6}").prop_map(|(pick, role)| Op::UpdateFramework { pick, role }),
            1 => any::<usize>().prop_map(|pick| Op::RemoveFramework { pick }),
        ]
    }

    pub fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(arb_op(), 0..40)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Invariant checks over a snapshot. Each panics with a descriptive
    //! message on violation.

    use super::*;

    /// Every task sits in exactly one cluster bucket, and in the same bucket
    /// of its framework when the framework tracks it. Active frameworks track
    /// every cluster task they own.
    pub fn assert_task_placement(snapshot: &ClusterSnapshot) {
        for (bucket, task) in snapshot.tasks.iter() {
            let key = task.key();
            let holders = TaskBucket::ALL
                .into_iter()
                .filter(|b| snapshot.tasks.get(*b).contains_key(&key))
                .count();
            assert_eq!(holders, 1, "task {} held by {} cluster buckets", key, holders);

            if let Some(framework) = snapshot.framework(&task.framework_id) {
                let framework_holders = TaskBucket::ALL
                    .into_iter()
                    .filter(|b| framework.tasks.get(*b).contains(&task.task_id))
                    .count();
                assert!(
                    framework_holders <= 1,
                    "task {} held by {} framework buckets",
                    key,
                    framework_holders
                );
                if framework_holders == 1 {
                    assert_eq!(
                        framework.tasks.locate(&task.task_id),
                        Some(bucket),
                        "task {} placed differently at framework scope",
                        key
                    );
                }
                if snapshot.frameworks.contains_key(&task.framework_id) {
                    assert_eq!(framework_holders, 1, "active framework lost task {}", key);
                }
            }
        }

        for framework in snapshot
            .frameworks
            .values()
            .chain(snapshot.completed_frameworks.values())
        {
            for bucket in TaskBucket::ALL {
                for task_id in framework.tasks.get(bucket) {
                    let key = TaskKey::new(framework.id().clone(), task_id.clone());
                    assert!(
                        snapshot.tasks.get(bucket).contains_key(&key),
                        "framework task {} missing from cluster bucket {:?}",
                        key,
                        bucket
                    );
                }
            }
        }

        for id in snapshot.frameworks.keys() {
            assert!(
                !snapshot.completed_frameworks.contains_key(id),
                "framework {} both active and completed",
                id
            );
        }
    }

    /// Each counter of an active framework equals the number of its tasks
    /// currently in the matching state.
    pub fn assert_counters_match_lists(snapshot: &ClusterSnapshot) {
        for framework in snapshot.frameworks.values() {
            for lifecycle in Lifecycle::ALL {
                let expected = TaskBucket::ALL
                    .into_iter()
                    .flat_map(|bucket| framework.tasks.get(bucket).iter())
                    .filter_map(|task_id| {
                        snapshot
                            .task(&TaskKey::new(framework.id().clone(), task_id.clone()))
                    })
                    .filter(|task| task.state.lifecycle() == Some(lifecycle))
                    .count() as i64;
                assert_eq!(
                    framework.counters.get(lifecycle),
                    expected,
                    "framework {} counter {:?}",
                    framework.id(),
                    lifecycle
                );
            }
        }
    }

    /// Cluster totals are the sums over the agents, and idle is
    /// `total - allocated`.
    pub fn assert_aggregates_consistent(snapshot: &ClusterSnapshot) {
        let (total, allocated) = snapshot.agents.values().fold(
            (ScalarResources::default(), ScalarResources::default()),
            |(total, allocated), agent| (total + agent.total, allocated + agent.allocated),
        );
        assert_eq!(snapshot.total, total, "cluster total");
        assert_eq!(snapshot.allocated, allocated, "cluster allocated");
        assert_eq!(snapshot.idle(), total - allocated, "cluster idle");

        let active = snapshot.agents.values().filter(|a| a.active).count();
        assert_eq!(snapshot.activated_agents, active, "activated agents");
        assert_eq!(
            snapshot.deactivated_agents,
            snapshot.agents.len() - active,
            "deactivated agents"
        );
    }

    pub fn assert_all_invariants(snapshot: &ClusterSnapshot) {
        assert_task_placement(snapshot);
        assert_counters_match_lists(snapshot);
        assert_aggregates_consistent(snapshot);
    }
}

// ============================================================================
// TESTS
// ============================================================================
