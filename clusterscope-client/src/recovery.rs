//! Shared error notice and backoff for stream and poll failures.
//!
//! A failure opens a notice whose delay grows with every notice and counts
//! down in fixed ticks. When the countdown runs out, or the user acknowledges
//! the notice, both the stream and the poller restart after a short grace.
//! Acknowledging also resets the delay.

use crate::config::BackoffConfig;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            initial: config.initial(),
            max: config.max(),
            multiplier: config.multiplier,
            current: config.initial(),
        }
    }

    /// Grow the delay, then return it. Saturates at the configured maximum.
    pub fn next_delay(&mut self) -> Duration {
        let grown = self.current.as_secs_f64() * self.multiplier;
        self.current = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max)
            .min(self.max);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    Stream,
    Metrics,
}

impl fmt::Display for FailureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureSource::Stream => f.write_str("event stream"),
            FailureSource::Metrics => f.write_str("metrics"),
        }
    }
}

/// What a view shows while a retry is pending.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    pub source: FailureSource,
    pub reason: String,
    pub delay_ms: u64,
    pub remaining_ms: u64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStep {
    Countdown(RetryNotice),
    Expired,
    Restart,
}

#[derive(Debug)]
pub struct Recovery {
    backoff: Backoff,
    tick: Duration,
    grace: Duration,
    notice: Option<(RetryNotice, Instant)>,
    restart_at: Option<Instant>,
}

impl Recovery {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            backoff: Backoff::new(config),
            tick: config.countdown_tick(),
            grace: config.restart_grace(),
            notice: None,
            restart_at: None,
        }
    }

    pub fn notice(&self) -> Option<&RetryNotice> {
        self.notice.as_ref().map(|(notice, _)| notice)
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Open a notice for `source`. Returns `None` when one is already open.
    pub fn fail(
        &mut self,
        source: FailureSource,
        reason: impl Into<String>,
        now: Instant,
    ) -> Option<RetryNotice> {
        if self.notice.is_some() {
            return None;
        }
        self.restart_at = None;
        let delay_ms = duration_ms(self.backoff.next_delay());
        let notice = RetryNotice {
            source,
            reason: reason.into(),
            delay_ms,
            remaining_ms: delay_ms,
            opened_at: Utc::now(),
        };
        self.notice = Some((notice.clone(), now + self.tick));
        Some(notice)
    }

    /// Close the notice early. Returns `false` when none was open.
    pub fn acknowledge(&mut self, now: Instant) -> bool {
        if self.notice.take().is_none() {
            return false;
        }
        self.backoff.reset();
        self.restart_at = Some(now + self.grace);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.notice {
            Some((_, next_tick)) => Some(*next_tick),
            None => self.restart_at,
        }
    }

    /// Advance whatever is due at `now`.
    pub fn on_deadline(&mut self, now: Instant) -> Option<RecoveryStep> {
        if let Some((notice, next_tick)) = &mut self.notice {
            if *next_tick > now {
                return None;
            }
            notice.remaining_ms = notice.remaining_ms.saturating_sub(duration_ms(self.tick));
            if notice.remaining_ms > 0 {
                *next_tick += self.tick;
                return Some(RecoveryStep::Countdown(notice.clone()));
            }
            self.notice = None;
            self.restart_at = Some(now + self.grace);
            return Some(RecoveryStep::Expired);
        }

        match self.restart_at {
            Some(at) if at <= now => {
                self.restart_at = None;
                Some(RecoveryStep::Restart)
            }
            _ => None,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
