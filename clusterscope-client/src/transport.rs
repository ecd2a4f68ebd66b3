//! The seam between the engine and the master's HTTP API.

use crate::api_client::ApiClientError;
use async_trait::async_trait;
use clusterscope_core::{Event, MetricsSnapshot};
use futures_util::stream::BoxStream;
use serde::Deserialize;

/// Decoded events of one subscription, in arrival order.
pub type EventStream = BoxStream<'static, Result<Event, ApiClientError>>;

#[async_trait]
pub trait MasterApi: Send + Sync + 'static {
    /// Open a new event subscription. The first event is expected to be
    /// `SUBSCRIBED`.
    async fn subscribe(&self) -> Result<EventStream, ApiClientError>;

    async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, ApiClientError>;

    async fn flags(&self) -> Result<MasterFlags, ApiClientError>;
}

/// Master flags the dashboard cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterFlags {
    pub cluster: Option<String>,
    pub log_dir: Option<String>,
    pub external_log_file: Option<String>,
}

impl MasterFlags {
    pub fn is_cluster_named(&self) -> bool {
        self.cluster.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// Whether the master exposes a log file the dashboard can link to.
    pub fn has_log_file(&self) -> bool {
        self.log_dir.is_some() || self.external_log_file.is_some()
    }

    pub fn from_response(response: GetFlagsResponse) -> Self {
        let mut flags = Self::default();
        for flag in response.get_flags.flags {
            let slot = match flag.name.as_str() {
                "cluster" => &mut flags.cluster,
                "log_dir" => &mut flags.log_dir,
                "external_log_file" => &mut flags.external_log_file,
                _ => continue,
            };
            *slot = flag.value;
        }
        flags
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetFlagsResponse {
    pub get_flags: GetFlags,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetFlags {
    #[serde(default)]
    pub flags: Vec<Flag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Flag {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}
