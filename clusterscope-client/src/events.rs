//! Messages delivered to the engine loop.

use crate::api_client::ApiClientError;
use crate::transport::MasterFlags;
use clusterscope_core::{Event, MetricsSnapshot};

#[derive(Debug)]
pub enum EngineEvent {
    /// Progress of the subscription identified by `generation`.
    Session {
        generation: u64,
        update: SessionUpdate,
    },
    /// Result of one metrics fetch started by poller `generation`.
    Metrics {
        generation: u64,
        result: Result<MetricsSnapshot, ApiClientError>,
    },
    Flags(Result<MasterFlags, ApiClientError>),
    Command(EngineCommand),
}

#[derive(Debug)]
pub enum SessionUpdate {
    Connected,
    Event(Box<Event>),
    /// One record could not be decoded. The stream is still open.
    Malformed(ApiClientError),
    Completed,
    Failed(ApiClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// The user dismissed the retry notice before its countdown ran out.
    AcknowledgeRetry,
    Shutdown,
}
