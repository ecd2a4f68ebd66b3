//! Clusterscope client runtime.
//!
//! Keeps a [`clusterscope_core::ClusterSnapshot`] in sync with a master:
//! subscribes to its event stream, polls its metrics and surfaces transport
//! failures as a retry notice with capped backoff. Views read the result
//! through a [`store::StateReader`].

pub mod api_client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod notifications;
pub mod poller;
pub mod recordio;
pub mod recovery;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use api_client::{ApiClientError, MasterClient};
pub use config::ClientConfig;
pub use engine::{Engine, EngineHandle, EngineStopped};
pub use error::ClientError;
pub use store::{ClusterState, StateReader};
pub use transport::{EventStream, MasterApi, MasterFlags};
