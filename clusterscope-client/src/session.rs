//! One subscription to the master's event stream.

use crate::events::{EngineEvent, SessionUpdate};
use crate::transport::MasterApi;
use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Subscribing,
    Streaming,
    Erred,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Subscribing => "subscribing",
            SessionState::Streaming => "streaming",
            SessionState::Erred => "erred",
        };
        f.write_str(label)
    }
}

/// Subscribe and forward every decoded event to the engine in arrival order.
///
/// The task ends after the stream completes or fails, or once the engine
/// stops listening. The engine aborts it when it starts a newer generation.
pub fn spawn_session(
    api: Arc<dyn MasterApi>,
    generation: u64,
    tx: mpsc::Sender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let send = |update: SessionUpdate| {
            let tx = tx.clone();
            async move {
                tx.send(EngineEvent::Session { generation, update })
                    .await
                    .is_ok()
            }
        };

        let mut stream = match api.subscribe().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(generation, error = %err, "Subscribe request failed");
                send(SessionUpdate::Failed(err)).await;
                return;
            }
        };
        if !send(SessionUpdate::Connected).await {
            return;
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if !send(SessionUpdate::Event(Box::new(event))).await {
                        return;
                    }
                }
                Err(err) if err.is_malformed_record() => {
                    if !send(SessionUpdate::Malformed(err)).await {
                        return;
                    }
                }
                Err(err) => {
                    warn!(generation, error = %err, "Event stream failed");
                    send(SessionUpdate::Failed(err)).await;
                    return;
                }
            }
        }

        debug!(generation, "Event stream completed");
        send(SessionUpdate::Completed).await;
    })
}
