//! analytics.rs
//!
//! Best-effort export of booking statistics to the reporting store.
//!
//! Key pieces:
//! 1.  **AnalyticsSink**: the write side of the reporting store. The Redis
//!     implementation appends each stat to a capped stream.
//! 2.  **CircuitBreaker**: stops hammering a sink that keeps failing and lets
//!     a single probe through once the timeout has elapsed.
//! 3.  **AnalyticsDispatcher**: a bounded queue drained by a detached worker.
//!     Enqueueing never waits, and nothing the worker does can reach the
//!     booking that produced the stat.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::AnalyticsConfig,
    models::{Booking, Money, ShowtimeDetails},
    redis_client::RedisClient,
};

/// One denormalized record per committed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingStat {
    pub booking_id: i64,
    pub film_id: i64,
    pub film_title: String,
    pub cinema_id: i64,
    pub cinema_name: String,
    pub quality: String,
    pub seat_count: i32,
    pub revenue: Money,
    pub recorded_at: DateTime<Utc>,
}

impl BookingStat {
    pub fn new(showtime: &ShowtimeDetails, booking: &Booking) -> Self {
        BookingStat {
            booking_id: booking.id,
            film_id: showtime.film_id,
            film_title: showtime.film_title.clone(),
            cinema_id: showtime.cinema_id,
            cinema_name: showtime.cinema_name.clone(),
            quality: showtime.quality.clone(),
            seat_count: booking.seat_count,
            revenue: booking.total_price_cents,
            recorded_at: booking.created_at,
        }
    }

    fn stream_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("booking_id", self.booking_id.to_string()),
            ("film_id", self.film_id.to_string()),
            ("film_title", self.film_title.clone()),
            ("cinema_id", self.cinema_id.to_string()),
            ("cinema_name", self.cinema_name.clone()),
            ("quality", self.quality.clone()),
            ("seat_count", self.seat_count.to_string()),
            ("revenue", self.revenue.to_string()),
            ("recorded_at", self.recorded_at.to_rfc3339()),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("analytics store timed out after {0:?}")]
    Timeout(Duration),
    #[error("analytics store unavailable: {0}")]
    Unavailable(String),
}

/// Write side of the reporting store.
#[async_trait]
pub trait AnalyticsSink: Send + Sync + 'static {
    async fn record_booking_stat(&self, stat: &BookingStat) -> Result<(), AnalyticsError>;
}

/// Appends stats to a Redis stream capped at roughly `max_len` entries.
pub struct RedisStreamSink {
    redis: RedisClient,
    stream: String,
    max_len: usize,
}

impl RedisStreamSink {
    pub fn new(redis: RedisClient, stream: impl Into<String>, max_len: usize) -> Self {
        Self {
            redis,
            stream: stream.into(),
            max_len,
        }
    }
}

#[async_trait]
impl AnalyticsSink for RedisStreamSink {
    async fn record_booking_stat(&self, stat: &BookingStat) -> Result<(), AnalyticsError> {
        let timeout = self.redis.timeout();
        let write = async {
            let mut conn = self.redis.connection().await?;
            let mut cmd = redis::cmd("XADD");
            cmd.arg(&self.stream).arg("MAXLEN").arg("~").arg(self.max_len).arg("*");
            for (field, value) in stat.stream_fields() {
                cmd.arg(field).arg(value);
            }
            let _entry_id: String = cmd.query_async(&mut conn).await?;
            Ok::<_, AnalyticsError>(())
        };

        tokio::time::timeout(timeout, write)
            .await
            .map_err(|_| AnalyticsError::Timeout(timeout))?
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls go through.
    Closed,
    /// Calls are skipped until the timeout elapses.
    Open,
    /// One probe call is allowed to test recovery.
    HalfOpen,
}

/// Consecutive-failure circuit breaker, owned by the analytics worker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            failure_threshold: failure_threshold.max(1),
            timeout,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn can_execute(&mut self) -> bool {
        self.can_execute_at(Instant::now())
    }

    fn can_execute_at(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened))
                    .unwrap_or(self.timeout);
                if elapsed >= self.timeout {
                    self.state = CircuitState::HalfOpen;
                    info!("analytics circuit breaker half-open, probing the store");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitState::HalfOpen {
            info!("analytics circuit breaker closed, store recovered");
        }
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        match self.state {
            CircuitState::Closed if self.failure_count >= self.failure_threshold => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
                error!(
                    failures = self.failure_count,
                    threshold = self.failure_threshold,
                    "analytics circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
                warn!("analytics probe failed, circuit breaker open again");
            }
            _ => {}
        }
    }
}

/// Handle used by the booking flow to hand stats off to the worker.
#[derive(Clone)]
pub struct AnalyticsDispatcher {
    queue: Option<mpsc::Sender<BookingStat>>,
}

impl AnalyticsDispatcher {
    /// Spawns the worker on the current runtime.
    pub fn spawn(
        sink: Arc<dyn AnalyticsSink>,
        queue_capacity: usize,
        breaker: CircuitBreaker,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(sink, rx, breaker));
        (Self { queue: Some(tx) }, worker)
    }

    pub fn from_config(
        sink: Arc<dyn AnalyticsSink>,
        config: &AnalyticsConfig,
    ) -> (Self, JoinHandle<()>) {
        let breaker = CircuitBreaker::new(
            config.failure_threshold,
            Duration::from_secs(config.breaker_timeout_secs),
        );
        Self::spawn(sink, config.queue_capacity, breaker)
    }

    /// Dispatcher that drops every stat.
    pub fn disabled() -> Self {
        Self { queue: None }
    }

    /// Fire-and-forget: never waits and never fails.
    pub fn record_booking_stat(&self, stat: BookingStat) {
        let Some(queue) = &self.queue else {
            return;
        };
        if let Err(err) = queue.try_send(stat) {
            let booking_id = match &err {
                mpsc::error::TrySendError::Full(stat) | mpsc::error::TrySendError::Closed(stat) => {
                    stat.booking_id
                }
            };
            warn!(booking_id, error = %err, "dropping booking stat");
        }
    }
}

async fn run_worker(
    sink: Arc<dyn AnalyticsSink>,
    mut rx: mpsc::Receiver<BookingStat>,
    mut breaker: CircuitBreaker,
) {
    while let Some(stat) = rx.recv().await {
        if !breaker.can_execute() {
            debug!(booking_id = stat.booking_id, "analytics circuit open, skipping stat");
            continue;
        }
        match sink.record_booking_stat(&stat).await {
            Ok(()) => breaker.record_success(),
            Err(err) => {
                breaker.record_failure();
                error!(booking_id = stat.booking_id, error = %err, "failed to record booking stat");
            }
        }
    }
    debug!("analytics queue closed, worker exiting");
}
