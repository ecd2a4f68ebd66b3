//! Clusterscope Core - Cluster State Model
//!
//! The in-memory model a cluster dashboard renders from: agents, frameworks
//! and task life-cycle buckets, plus the two ways of changing it.
//!
//! - [`build_snapshot`] derives a complete [`ClusterSnapshot`] from the full
//!   state payload delivered on subscription.
//! - [`ClusterSnapshot::apply`] reconciles one incremental [`Event`] into an
//!   existing snapshot without re-deriving anything else.
//!
//! This crate performs no I/O. Transport, scheduling and notification live in
//! `clusterscope-client`.

mod agent;
mod builder;
mod error;
mod event;
mod framework;
mod ids;
mod lifecycle;
mod reconcile;
mod resources;
mod snapshot;
mod task;

pub use agent::{Agent, AgentInfo, AgentPayload};
pub use builder::build_snapshot;
pub use error::SnapshotError;
pub use event::{
    AgentAdded, AgentRemoved, Event, FrameworkAdded, FrameworkRemoved, FrameworkUpdated,
    GetAgents, GetFrameworks, GetState, GetTasks, Subscribed, TaskAdded, TaskUpdated,
};
pub use framework::{Framework, FrameworkInfo, FrameworkPayload, FrameworkTasks};
pub use ids::{AgentId, ExecutorId, FrameworkId, TaskId, TaskKey};
pub use lifecycle::{Lifecycle, LifecycleCounters, MetricsSnapshot};
pub use reconcile::{IgnoreReason, Outcome};
pub use resources::{AllocationInfo, Resource, ResourceKind, Scalar, ScalarResources, Shares};
pub use snapshot::{ClusterSnapshot, TaskBuckets};
pub use task::{ExecutorKind, ExecutorSandbox, Task, TaskBucket, TaskState, TaskStatus, Timestamp};
