//! Error types for full state loads

use crate::ids::{FrameworkId, TaskKey};
use thiserror::Error;

/// A full state payload that cannot be turned into a snapshot.
///
/// Loading is all-or-nothing: when this is returned, no snapshot was produced
/// and whatever the caller held before stays in place.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Unreachable task {task} references unknown framework {framework_id}")]
    UnreachableTaskWithoutFramework {
        task: TaskKey,
        framework_id: FrameworkId,
    },
}
