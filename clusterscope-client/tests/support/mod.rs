//! In-memory master used to drive the engine in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use clusterscope_client::config::BackoffConfig;
use clusterscope_client::{ApiClientError, ClusterState, EventStream, MasterApi, MasterFlags};
use clusterscope_core::{Event, MetricsSnapshot};
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

type Item = Result<Event, ApiClientError>;

enum Script {
    Refuse(ApiClientError),
    Live(mpsc::UnboundedReceiver<Item>),
}

/// Sender side of one scripted subscription. Dropping it ends the stream.
pub struct SessionFeed {
    tx: mpsc::UnboundedSender<Item>,
}

impl SessionFeed {
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(Ok(event));
    }

    pub fn fail(&self, err: ApiClientError) {
        let _ = self.tx.send(Err(err));
    }
}

#[derive(Default)]
pub struct FakeMaster {
    sessions: Mutex<VecDeque<Script>>,
    metrics: Mutex<VecDeque<Result<MetricsSnapshot, ApiClientError>>>,
    flags: MasterFlags,
    pub subscribe_calls: AtomicUsize,
    pub metrics_calls: AtomicUsize,
}

impl FakeMaster {
    pub fn new() -> Self {
        Self {
            flags: MasterFlags {
                cluster: Some("test-cluster".to_string()),
                ..MasterFlags::default()
            },
            ..Self::default()
        }
    }

    /// Queue a subscription whose events are pushed through the returned feed.
    pub fn live_session(&self) -> SessionFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push_back(Script::Live(rx));
        SessionFeed { tx }
    }

    /// Queue a subscription that delivers `events` and then completes.
    pub fn finite_session(&self, events: Vec<Event>) {
        let feed = self.live_session();
        for event in events {
            feed.send(event);
        }
    }

    pub fn refused_session(&self, err: ApiClientError) {
        self.sessions.lock().unwrap().push_back(Script::Refuse(err));
    }

    pub fn queue_metrics(&self, result: Result<MetricsSnapshot, ApiClientError>) {
        self.metrics.lock().unwrap().push_back(result);
    }

    pub fn subscribes(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.metrics_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MasterApi for FakeMaster {
    /// Unscripted subscriptions stay open without delivering anything.
    async fn subscribe(&self) -> Result<EventStream, ApiClientError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.sessions.lock().unwrap().pop_front();
        match script {
            Some(Script::Refuse(err)) => Err(err),
            Some(Script::Live(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    /// Unscripted polls succeed with empty metrics.
    async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, ApiClientError> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.metrics.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(MetricsSnapshot::default()))
    }

    async fn flags(&self) -> Result<MasterFlags, ApiClientError> {
        Ok(self.flags.clone())
    }
}

pub fn backoff() -> BackoffConfig {
    BackoffConfig {
        initial_ms: 2000,
        max_ms: 128000,
        multiplier: 2.0,
        countdown_tick_ms: 1000,
        restart_grace_ms: 1000,
    }
}

pub fn unavailable() -> ApiClientError {
    ApiClientError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

pub fn malformed() -> ApiClientError {
    let err = serde_json::from_str::<Event>("{\"type\":").unwrap_err();
    ApiClientError::MalformedRecord(err)
}

pub fn has_snapshot(state: &ClusterState) -> bool {
    state.snapshot.is_some()
}
