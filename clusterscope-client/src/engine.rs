//! The single consumer loop that owns the cluster snapshot.
//!
//! Session and poller tasks only talk to the engine through its channel, and
//! each message is applied to completion before the next one is received.

use crate::api_client::ApiClientError;
use crate::config::BackoffConfig;
use crate::events::{EngineCommand, EngineEvent, SessionUpdate};
use crate::notifications::Notification;
use crate::poller::{PollOutcome, Poller};
use crate::recovery::{FailureSource, Recovery, RecoveryStep};
use crate::session::{spawn_session, SessionState};
use crate::store::{StateReader, StateStore};
use crate::transport::{MasterApi, MasterFlags};
use clusterscope_core::{build_snapshot, Event, LifecycleCounters, MetricsSnapshot, Outcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
#[error("engine has stopped")]
pub struct EngineStopped;

/// Control side of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    pub async fn acknowledge_retry(&self) -> Result<(), EngineStopped> {
        self.command(EngineCommand::AcknowledgeRetry).await
    }

    pub async fn shutdown(&self) -> Result<(), EngineStopped> {
        self.command(EngineCommand::Shutdown).await
    }

    async fn command(&self, command: EngineCommand) -> Result<(), EngineStopped> {
        self.tx
            .send(EngineEvent::Command(command))
            .await
            .map_err(|_| EngineStopped)
    }
}

pub struct Engine {
    api: Arc<dyn MasterApi>,
    tx: mpsc::Sender<EngineEvent>,
    rx: mpsc::Receiver<EngineEvent>,
    store: StateStore,
    session: Option<JoinHandle<()>>,
    generation: u64,
    /// Whether the current session has delivered its SUBSCRIBED event.
    subscribed: bool,
    /// A completed stream is resubscribed once without a notice.
    completion_retry_used: bool,
    poller: Poller,
    recovery: Recovery,
}

impl Engine {
    pub fn new(api: Arc<dyn MasterApi>, backoff: &BackoffConfig) -> (Self, EngineHandle, StateReader) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (store, reader) = StateStore::new();
        let handle = EngineHandle { tx: tx.clone() };
        let engine = Self {
            api,
            tx,
            rx,
            store,
            session: None,
            generation: 0,
            subscribed: false,
            completion_retry_used: false,
            poller: Poller::new(),
            recovery: Recovery::new(backoff),
        };
        (engine, handle, reader)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Engine starting");
        self.fetch_flags();
        self.start_session();
        self.poller.start(Instant::now());

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(EngineEvent::Command(EngineCommand::Shutdown)) | None => break,
                    Some(event) => self.handle(event, Instant::now()),
                },
                _ = sleep_until(deadline) => self.on_timer(Instant::now()),
            }
        }

        self.stop_session();
        self.poller.abort();
        info!("Engine stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.poller.next_deadline(), self.recovery.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle(&mut self, event: EngineEvent, now: Instant) {
        match event {
            EngineEvent::Session { generation, update } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Dropping update from superseded session");
                    return;
                }
                self.on_session_update(update, now);
            }
            EngineEvent::Metrics { generation, result } => {
                self.on_metrics(generation, result, now);
            }
            EngineEvent::Flags(result) => self.on_flags(result),
            EngineEvent::Command(EngineCommand::AcknowledgeRetry) => self.acknowledge(now),
            EngineEvent::Command(EngineCommand::Shutdown) => {}
        }
    }

    fn on_session_update(&mut self, update: SessionUpdate, now: Instant) {
        match update {
            SessionUpdate::Connected => {
                info!(generation = self.generation, "Event stream connected");
                self.set_session(SessionState::Streaming);
            }
            SessionUpdate::Event(event) => self.on_stream_event(*event, now),
            SessionUpdate::Malformed(err) if self.subscribed => {
                warn!(generation = self.generation, error = %err, "Skipping undecodable event");
            }
            SessionUpdate::Malformed(err) => {
                warn!(generation = self.generation, error = %err, "Undecodable record before SUBSCRIBED");
                self.invalidate_session();
                self.set_session(SessionState::Erred);
                self.fail(FailureSource::Stream, err.to_string(), now);
            }
            SessionUpdate::Completed => {
                self.session = None;
                self.set_session(SessionState::Disconnected);
                if self.completion_retry_used {
                    self.fail(FailureSource::Stream, "event stream closed", now);
                } else {
                    info!(generation = self.generation, "Event stream closed, resubscribing");
                    self.completion_retry_used = true;
                    self.start_session();
                }
            }
            SessionUpdate::Failed(err) => {
                self.session = None;
                self.set_session(SessionState::Erred);
                self.fail(FailureSource::Stream, err.to_string(), now);
            }
        }
    }

    fn on_stream_event(&mut self, event: Event, now: Instant) {
        let event_type = event.event_type();
        match event {
            Event::Subscribed { subscribed } => match build_snapshot(subscribed.get_state) {
                Ok(snapshot) => {
                    info!(
                        generation = self.generation,
                        agents = snapshot.agent_count(),
                        frameworks = snapshot.frameworks.len(),
                        tasks = snapshot.tasks.len(),
                        "Cluster snapshot loaded"
                    );
                    self.subscribed = true;
                    self.completion_retry_used = false;
                    let connected =
                        Notification::connected(snapshot.agent_count(), snapshot.frameworks.len());
                    self.store.modify(|state| {
                        state.snapshot = Some(snapshot);
                        state.push_notification(connected);
                        true
                    });
                }
                Err(err) => {
                    warn!(error = %err, "Rejecting malformed cluster snapshot");
                    self.store.modify(|state| {
                        state.push_notification(Notification::snapshot_rejected(&err));
                        true
                    });
                    self.invalidate_session();
                    self.set_session(SessionState::Erred);
                    self.fail(FailureSource::Stream, err.to_string(), now);
                }
            },
            Event::Heartbeat | Event::Unknown => {
                trace!(event_type, "Ignoring keep-alive event");
            }
            _ if !self.subscribed => {
                debug!(event_type, "Dropping event received before SUBSCRIBED");
            }
            event => {
                self.store.modify(|state| {
                    let Some(snapshot) = state.snapshot.as_mut() else {
                        return false;
                    };
                    match snapshot.apply(event) {
                        Outcome::Applied => true,
                        Outcome::Ignored(reason) => {
                            debug!(event_type, %reason, "Event left snapshot unchanged");
                            false
                        }
                    }
                });
            }
        }
    }

    fn on_metrics(
        &mut self,
        generation: u64,
        result: Result<MetricsSnapshot, ApiClientError>,
        now: Instant,
    ) {
        let agent_count = self.store.read(|state| state.agent_count());
        match self.poller.on_result(generation, result, now, agent_count) {
            PollOutcome::Stale => debug!(generation, "Dropping stale metrics result"),
            PollOutcome::Updated(metrics) => {
                let counters = LifecycleCounters::from_metrics(&metrics);
                self.store.modify(|state| {
                    let changed = state.metrics != counters;
                    state.metrics = counters;
                    changed
                });
            }
            PollOutcome::Unauthorized(err) => {
                info!(error = %err, "Metrics polling stopped: not authorized");
            }
            PollOutcome::Failed(err) => {
                warn!(error = %err, "Metrics poll failed");
                self.fail(FailureSource::Metrics, err.to_string(), now);
            }
        }
    }

    fn on_flags(&mut self, result: Result<MasterFlags, ApiClientError>) {
        match result {
            Ok(flags) => {
                info!(
                    cluster = flags.cluster.as_deref().unwrap_or(""),
                    named = flags.is_cluster_named(),
                    "Master flags loaded"
                );
                self.store.modify(|state| {
                    state.flags = Some(flags);
                    true
                });
            }
            Err(err) => warn!(error = %err, "Could not fetch master flags"),
        }
    }

    fn on_timer(&mut self, now: Instant) {
        while let Some(step) = self.recovery.on_deadline(now) {
            match step {
                RecoveryStep::Countdown(notice) => {
                    self.store.modify(|state| {
                        state.retry = Some(notice);
                        true
                    });
                }
                RecoveryStep::Expired => {
                    debug!("Retry countdown elapsed");
                    self.store.modify(|state| {
                        state.retry = None;
                        true
                    });
                }
                RecoveryStep::Restart => self.restart(now),
            }
        }
        self.poller.poll_if_due(now, &self.api, &self.tx);
    }

    fn acknowledge(&mut self, now: Instant) {
        if !self.recovery.acknowledge(now) {
            debug!("No retry notice to acknowledge");
            return;
        }
        info!("Retry acknowledged, backoff reset");
        self.store.modify(|state| {
            state.retry = None;
            true
        });
    }

    fn fail(&mut self, source: FailureSource, reason: impl Into<String>, now: Instant) {
        let reason = reason.into();
        let Some(notice) = self.recovery.fail(source, reason.clone(), now) else {
            debug!(%source, %reason, "Retry notice already open");
            return;
        };
        info!(%source, delay_ms = notice.delay_ms, "Scheduling retry");
        let notification = Notification::retry_scheduled(&notice);
        self.store.modify(|state| {
            state.retry = Some(notice);
            state.push_notification(notification);
            true
        });
    }

    fn restart(&mut self, now: Instant) {
        info!(generation = self.generation + 1, "Restarting event stream and metrics polling");
        self.store.modify(|state| {
            state.push_notification(Notification::reconnecting());
            true
        });
        self.start_session();
        self.poller.start(now);
    }

    fn start_session(&mut self) {
        self.invalidate_session();
        self.session = Some(spawn_session(
            Arc::clone(&self.api),
            self.generation,
            self.tx.clone(),
        ));
        self.set_session(SessionState::Subscribing);
    }

    /// Drop the current session along with anything it already queued.
    fn invalidate_session(&mut self) {
        self.stop_session();
        self.generation += 1;
        self.subscribed = false;
    }

    fn stop_session(&mut self) {
        if let Some(handle) = self.session.take() {
            handle.abort();
        }
    }

    fn set_session(&self, session: SessionState) {
        self.store.modify(|state| {
            let changed = state.session != session;
            state.session = session;
            changed
        });
    }

    fn fetch_flags(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.flags().await;
            let _ = tx.send(EngineEvent::Flags(result)).await;
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
