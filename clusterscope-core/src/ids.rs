//! Identity types for cluster entities.
//!
//! The master encodes every identifier as an object with a single `value`
//! field (`{"value": "..."}`); the newtypes below keep that shape on the wire
//! while giving each entity kind its own type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declare an opaque string identifier wrapped in `{"value": ...}`.
///
/// # Example
/// ```ignore
/// define_id!(AgentId, "Identifier of a cluster agent.");
/// let id = AgentId::new("a-1");
/// assert_eq!(id.as_str(), "a-1");
/// ```
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            pub value: String,
        }

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self {
                    value: value.into(),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.value
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

define_id!(AgentId, "Identifier of a cluster agent.");
define_id!(FrameworkId, "Identifier of a registered framework.");
define_id!(TaskId, "Identifier of a task, unique within its framework.");
define_id!(ExecutorId, "Identifier of the executor running a task.");

/// Cluster-wide key of a task.
///
/// Task ids are only unique within one framework, so cluster-scope lists
/// key tasks by the pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub framework_id: FrameworkId,
    pub task_id: TaskId,
}

impl TaskKey {
    pub fn new(framework_id: FrameworkId, task_id: TaskId) -> Self {
        Self {
            framework_id,
            task_id,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.framework_id, self.task_id)
    }
}
