//! Adaptive metrics polling.

use crate::api_client::ApiClientError;
use crate::events::EngineEvent;
use crate::transport::MasterApi;
use clusterscope_core::MetricsSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Agent-count thresholds and the poll interval used below each of them.
const INTERVAL_STEPS: [(usize, u64); 6] = [
    (500, 10),
    (1_000, 20),
    (5_000, 60),
    (10_000, 120),
    (15_000, 240),
    (20_000, 480),
];
const MAX_INTERVAL_SECS: u64 = 960;

/// Poll interval for a cluster of `agent_count` agents.
pub fn update_interval(agent_count: usize) -> Duration {
    let secs = INTERVAL_STEPS
        .iter()
        .find(|(limit, _)| agent_count < *limit)
        .map(|(_, secs)| *secs)
        .unwrap_or(MAX_INTERVAL_SECS);
    Duration::from_secs(secs)
}

#[derive(Debug)]
pub enum PollOutcome {
    /// Result of a fetch started before the latest restart.
    Stale,
    Updated(MetricsSnapshot),
    /// Authorization failure; polling has stopped for good.
    Unauthorized(ApiClientError),
    /// Retryable failure; polling waits for the next restart.
    Failed(ApiClientError),
}

/// Poll schedule. At most one fetch is in flight.
#[derive(Debug, Default)]
pub struct Poller {
    generation: u64,
    next_poll: Option<Instant>,
    in_flight: Option<JoinHandle<()>>,
    stopped: bool,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// (Re)start the schedule with an immediate poll. Results of a fetch that
    /// is still running are discarded. Has no effect once authorization failed.
    pub fn start(&mut self, now: Instant) {
        if self.stopped {
            return;
        }
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.generation += 1;
        self.next_poll = Some(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.stopped || self.in_flight.is_some() {
            return None;
        }
        self.next_poll
    }

    /// Start a fetch if one is due.
    pub fn poll_if_due(
        &mut self,
        now: Instant,
        api: &Arc<dyn MasterApi>,
        tx: &mpsc::Sender<EngineEvent>,
    ) -> bool {
        match self.next_deadline() {
            Some(due) if due <= now => {}
            _ => return false,
        }
        self.next_poll = None;

        let api = Arc::clone(api);
        let tx = tx.clone();
        let generation = self.generation;
        self.in_flight = Some(tokio::spawn(async move {
            let result = api.metrics_snapshot().await;
            let _ = tx.send(EngineEvent::Metrics { generation, result }).await;
        }));
        true
    }

    pub fn on_result(
        &mut self,
        generation: u64,
        result: Result<MetricsSnapshot, ApiClientError>,
        now: Instant,
        agent_count: usize,
    ) -> PollOutcome {
        if generation != self.generation {
            return PollOutcome::Stale;
        }
        self.in_flight = None;
        self.next_poll = None;
        match result {
            Ok(metrics) => {
                self.next_poll = Some(now + update_interval(agent_count));
                PollOutcome::Updated(metrics)
            }
            Err(err) if err.is_authorization() => {
                self.stopped = true;
                PollOutcome::Unauthorized(err)
            }
            Err(err) => PollOutcome::Failed(err),
        }
    }

    pub fn abort(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.next_poll = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_steps_with_cluster_size() {
        assert_eq!(update_interval(0), Duration::from_secs(10));
        assert_eq!(update_interval(499), Duration::from_secs(10));
        assert_eq!(update_interval(500), Duration::from_secs(20));
        assert_eq!(update_interval(4_999), Duration::from_secs(60));
        assert_eq!(update_interval(10_000), Duration::from_secs(240));
        assert_eq!(update_interval(19_999), Duration::from_secs(480));
        assert_eq!(update_interval(20_000), Duration::from_secs(960));
        assert_eq!(update_interval(usize::MAX), Duration::from_secs(960));
    }

    #[tokio::test]
    async fn success_schedules_next_poll_from_agent_count() {
        let now = Instant::now();
        let mut poller = Poller::new();
        poller.start(now);
        assert_eq!(poller.next_deadline(), Some(now));

        let outcome = poller.on_result(1, Ok(MetricsSnapshot::default()), now, 600);
        assert!(matches!(outcome, PollOutcome::Updated(_)));
        assert_eq!(poller.next_deadline(), Some(now + Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn stale_results_are_discarded() {
        let now = Instant::now();
        let mut poller = Poller::new();
        poller.start(now);
        poller.start(now);
        let outcome = poller.on_result(1, Ok(MetricsSnapshot::default()), now, 0);
        assert!(matches!(outcome, PollOutcome::Stale));
        assert_eq!(poller.next_deadline(), Some(now));
    }

    #[tokio::test]
    async fn authorization_failure_stops_for_good() {
        let now = Instant::now();
        let mut poller = Poller::new();
        poller.start(now);
        let outcome = poller.on_result(1, Err(ApiClientError::Unauthorized { status: 403 }), now, 0);
        assert!(matches!(outcome, PollOutcome::Unauthorized(_)));
        assert!(poller.is_stopped());

        poller.start(now);
        assert_eq!(poller.next_deadline(), None);
    }

    #[tokio::test]
    async fn other_failures_wait_for_restart() {
        let now = Instant::now();
        let mut poller = Poller::new();
        poller.start(now);
        let err = ApiClientError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(matches!(
            poller.on_result(1, Err(err), now, 0),
            PollOutcome::Failed(_)
        ));
        assert_eq!(poller.next_deadline(), None);

        poller.start(now);
        assert_eq!(poller.next_deadline(), Some(now));
    }
}
