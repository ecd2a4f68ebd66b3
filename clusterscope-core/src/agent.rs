//! Agents.

use crate::ids::AgentId;
use crate::resources::{Resource, ScalarResources};
use serde::{Deserialize, Serialize};

/// Port agents listen on when neither the pid nor the agent info says.
const DEFAULT_AGENT_PORT: u32 = 5051;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Agent record as delivered in the full state and in `AGENT_ADDED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPayload {
    pub agent_info: AgentInfo,
    #[serde(default)]
    pub active: bool,
    /// Process identifier, e.g. `slave(1)@10.0.0.1:5051`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default)]
    pub total_resources: Vec<Resource>,
}

/// A cluster node offering resources.
///
/// `total` is fixed when the agent is added; only `allocated` changes
/// afterwards, as tasks are placed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub info: AgentInfo,
    pub active: bool,
    pub pid: Option<String>,
    pub total: ScalarResources,
    pub allocated: ScalarResources,
}

impl Agent {
    pub fn from_payload(payload: AgentPayload) -> Self {
        Self {
            total: ScalarResources::from_resources(&payload.total_resources),
            allocated: ScalarResources::default(),
            info: payload.agent_info,
            active: payload.active,
            pid: payload.pid,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.info.id
    }

    /// Port the agent process serves on, taken from its pid when known.
    pub fn port(&self) -> u32 {
        self.pid
            .as_deref()
            .and_then(|pid| pid.rsplit_once(':'))
            .and_then(|(_, port)| port.parse().ok())
            .or(self.info.port)
            .unwrap_or(DEFAULT_AGENT_PORT)
    }

    /// Name of the agent process within its host, e.g. `slave(1)`.
    pub fn process_id(&self) -> Option<&str> {
        self.pid
            .as_deref()
            .and_then(|pid| pid.split_once('@'))
            .map(|(process, _)| process)
    }

    /// URL prefix for reaching this agent's endpoints.
    ///
    /// Several agents can share one `host:port` (e.g. a local test cluster),
    /// so endpoints of the agent process itself need the process id segment:
    /// `//host:port/slave(1)`. Endpoints served once per process do not:
    /// `//host:port`.
    pub fn url_prefix(&self, include_process_id: bool) -> String {
        let mut url = format!("//{}:{}", self.info.hostname, self.port());
        if include_process_id {
            if let Some(process_id) = self.process_id() {
                url.push('/');
                url.push_str(process_id);
            }
        }
        url
    }

    pub fn idle(&self) -> ScalarResources {
        self.total - self.allocated
    }
}
