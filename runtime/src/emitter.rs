//! Best-effort event emission.
//!
//! The lifecycle manager never waits on the broker. It hands each
//! [`DomainEvent`] to [`EventEmitter::submit`], which enqueues it on a bounded
//! channel and returns at once. A single worker task drains the channel in
//! FIFO order:
//!
//! ```text
//! submit ──▶ [ bounded mpsc ] ──▶ worker ──▶ emit (timeout) ──▶ EventBus
//!                  │                 │
//!                  │ full            │ retries exhausted
//!                  ▼                 ▼
//!            dead letters ◀──────────┘
//! ```
//!
//! Every attempt is bounded by the emission timeout and retried with
//! exponential backoff. An event that still cannot be delivered ends up in a
//! bounded [`DeadLetters`] store, which degrades the emitter's
//! [`health`](EventEmitter::health). None of these failures reach the caller
//! of `submit` beyond the immediate [`EmissionError`] for a full or closed
//! queue.

use crate::dead_letter::{DeadLetterCause, DeadLetters};
use crate::metrics::EmitterMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::HealthCheck;
use reportdesk_core::event::EventError;
use reportdesk_core::{DomainEvent, EventBus, EventBusError, EventTopics, SerializedEvent};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Why an event could not be emitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmissionError {
    /// The bus did not acknowledge within the emission timeout.
    #[error("Emission timed out after {0:?}")]
    Timeout(Duration),

    /// The bus rejected the message.
    #[error(transparent)]
    Bus(#[from] EventBusError),

    /// The event could not be encoded.
    #[error(transparent)]
    Serialization(#[from] EventError),

    /// The emitter queue is at capacity.
    #[error("Emitter queue is full")]
    QueueFull,

    /// The emitter has been shut down.
    #[error("Emitter is shut down")]
    QueueClosed,
}

impl EmissionError {
    /// Short label used as a metric value.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Bus(_) => "bus",
            Self::Serialization(_) => "serialization",
            Self::QueueFull => "queue_full",
            Self::QueueClosed => "queue_closed",
        }
    }

    /// Whether another attempt could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Bus(_))
    }
}

/// Emitter settings.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Capacity of the submission queue.
    pub queue_capacity: usize,
    /// Bound on a single publish attempt.
    pub emit_timeout: Duration,
    /// Retry schedule for failed attempts.
    pub retry_policy: RetryPolicy,
    /// Capacity of the dead-letter buffer.
    pub dead_letter_capacity: usize,
    /// Topic per event variant.
    pub topics: EventTopics,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            emit_timeout: Duration::from_secs(5),
            retry_policy: RetryPolicy::default(),
            dead_letter_capacity: 1000,
            topics: EventTopics::default(),
        }
    }
}

impl EmitterConfig {
    /// Set the submission queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_emit_timeout(mut self, timeout: Duration) -> Self {
        self.emit_timeout = timeout;
        self
    }

    /// Set the retry schedule.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the dead-letter capacity.
    #[must_use]
    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity;
        self
    }

    /// Set the topic names.
    #[must_use]
    pub fn with_topics(mut self, topics: EventTopics) -> Self {
        self.topics = topics;
        self
    }
}

/// Publish one event, bounded by `timeout`.
///
/// # Errors
///
/// - [`EmissionError::Serialization`] if the event cannot be encoded
/// - [`EmissionError::Bus`] if the bus rejects it
/// - [`EmissionError::Timeout`] if the bus does not answer in time
pub async fn emit(
    bus: &dyn EventBus,
    topics: &EventTopics,
    event: &DomainEvent,
    timeout: Duration,
) -> Result<(), EmissionError> {
    let message = SerializedEvent::from_event(event, topics)?;
    let started = Instant::now();

    let error = match tokio::time::timeout(timeout, bus.publish(&message)).await {
        Ok(Ok(())) => {
            EmitterMetrics::record_emitted(&message.topic, started.elapsed());
            return Ok(());
        }
        Ok(Err(e)) => EmissionError::Bus(e),
        Err(_) => EmissionError::Timeout(timeout),
    };

    EmitterMetrics::record_failure(&message.topic, error.reason());
    Err(error)
}

/// Handle to the emission queue and its worker.
///
/// Cheap to share behind an `Arc`; `submit` never blocks.
pub struct EventEmitter {
    sender: RwLock<Option<mpsc::Sender<DomainEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dead_letters: DeadLetters,
    topics: EventTopics,
    capacity: usize,
}

impl EventEmitter {
    /// Start the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn(bus: Arc<dyn EventBus>, config: EmitterConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let dead_letters = DeadLetters::with_capacity(config.dead_letter_capacity);

        let worker = Worker {
            bus,
            topics: config.topics.clone(),
            timeout: config.emit_timeout,
            policy: config.retry_policy,
            dead_letters: dead_letters.clone(),
        };
        let handle = tokio::spawn(worker.run(receiver));

        tracing::info!(
            queue_capacity = capacity,
            emit_timeout_ms = u64::try_from(config.emit_timeout.as_millis()).unwrap_or(u64::MAX),
            "Event emitter started"
        );

        Self {
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
            dead_letters,
            topics: config.topics,
            capacity,
        }
    }

    /// Enqueue an event for delivery.
    ///
    /// An event rejected because the queue is full is dead-lettered so it
    /// stays visible to operators.
    ///
    /// # Errors
    ///
    /// [`EmissionError::QueueFull`] or [`EmissionError::QueueClosed`].
    pub fn submit(&self, event: DomainEvent) -> Result<(), EmissionError> {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            EmitterMetrics::record_dropped("closed");
            return Err(EmissionError::QueueClosed);
        };

        match sender.try_send(event) {
            Ok(()) => {
                EmitterMetrics::record_queue_depth(self.capacity - sender.capacity());
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                EmitterMetrics::record_dropped("full");
                tracing::warn!(
                    report_id = %event.report_id(),
                    event_type = event.event_type(),
                    "Emitter queue full, dead-lettering event"
                );
                let topic = self.topics.topic_for(&event).to_string();
                self.dead_letters.record(
                    event,
                    &topic,
                    DeadLetterCause::QueueFull,
                    0,
                    EmissionError::QueueFull.to_string(),
                );
                Err(EmissionError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                EmitterMetrics::record_dropped("closed");
                Err(EmissionError::QueueClosed)
            }
        }
    }

    /// Events that could not be delivered.
    #[must_use]
    pub const fn dead_letters(&self) -> &DeadLetters {
        &self.dead_letters
    }

    /// Whether the queue still accepts events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }

    /// Readiness of the emission pipeline.
    ///
    /// Unhealthy once shut down, degraded while dead letters are held.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let dead = self.dead_letters.len();
        let check = if !self.is_running() {
            HealthCheck::unhealthy("event_emitter", "Emitter is shut down")
        } else if dead > 0 {
            HealthCheck::degraded("event_emitter", format!("{dead} event(s) dead-lettered"))
        } else {
            HealthCheck::healthy("event_emitter")
        };

        check
            .with_metadata("dead_letters", dead.to_string())
            .with_metadata("dead_letter_capacity", self.dead_letters.capacity().to_string())
    }

    /// Close the queue and wait for the worker to drain it.
    ///
    /// Events submitted afterwards are rejected with
    /// [`EmissionError::QueueClosed`]. Calling this twice is harmless.
    ///
    /// # Errors
    ///
    /// [`EmissionError::Timeout`] if the worker has not finished within
    /// `timeout`; it keeps running detached in that case.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), EmissionError> {
        drop(
            self.sender
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let Some(handle) = self.worker.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                tracing::info!("Event emitter drained");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Event emitter worker failed");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Event emitter did not drain in time"
                );
                Err(EmissionError::Timeout(timeout))
            }
        }
    }
}

struct Worker {
    bus: Arc<dyn EventBus>,
    topics: EventTopics,
    timeout: Duration,
    policy: RetryPolicy,
    dead_letters: DeadLetters,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<DomainEvent>) {
        while let Some(event) = receiver.recv().await {
            EmitterMetrics::record_queue_depth(receiver.len());
            self.deliver(event).await;
        }
        tracing::debug!("Emitter queue closed, worker exiting");
    }

    async fn deliver(&self, event: DomainEvent) {
        let result = retry_with_predicate(
            &self.policy,
            "emit_event",
            || emit(self.bus.as_ref(), &self.topics, &event, self.timeout),
            EmissionError::is_retryable,
        )
        .await;

        match result {
            Ok(()) => tracing::debug!(
                report_id = %event.report_id(),
                event_type = event.event_type(),
                "Event emitted"
            ),
            Err(failure) => {
                let topic = self.topics.topic_for(&event).to_string();
                tracing::error!(
                    report_id = %event.report_id(),
                    event_type = event.event_type(),
                    topic = %topic,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Event publish failed (continuing)"
                );
                self.dead_letters.record(
                    event,
                    &topic,
                    DeadLetterCause::RetriesExhausted,
                    failure.attempts,
                    failure.error.to_string(),
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::HealthStatus;
    use reportdesk_core::{
        Report, ReportCategory, ReportId, ReportStatus, UserId, Visibility,
    };
    use reportdesk_testing::InMemoryEventBus;

    fn event(seq: u64) -> DomainEvent {
        let now = chrono::Utc::now();
        let report = Report {
            id: ReportId::from_sequence(2025, seq),
            title: "Pothole".to_string(),
            description: "Large pothole".to_string(),
            category: ReportCategory::Sanitation,
            status: ReportStatus::Open,
            visibility: Visibility::Public,
            image_url: None,
            user_id: UserId::from("u1"),
            created_at: now,
            updated_at: now,
            updates: Vec::new(),
        };
        DomainEvent::created(&report, now)
    }

    fn config(max_retries: usize) -> EmitterConfig {
        EmitterConfig::default()
            .with_emit_timeout(Duration::from_millis(200))
            .with_retry_policy(
                RetryPolicy::builder()
                    .max_retries(max_retries)
                    .initial_delay(Duration::from_millis(1))
                    .build(),
            )
    }

    #[tokio::test]
    async fn delivers_keyed_by_report_id() {
        let bus = Arc::new(InMemoryEventBus::new());
        let emitter = EventEmitter::spawn(bus.clone(), config(0));

        emitter.submit(event(1)).unwrap();
        assert!(bus.wait_for(1, Duration::from_secs(1)).await);

        let published = bus.published();
        assert_eq!(published[0].topic, "reports.created");
        assert_eq!(published[0].key, "R-2025-001");
        assert_eq!(emitter.health().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.fail_next(2);
        let emitter = EventEmitter::spawn(bus.clone(), config(3));

        emitter.submit(event(1)).unwrap();
        assert!(bus.wait_for(1, Duration::from_secs(1)).await);
        assert_eq!(bus.attempts(), 3);
        assert!(emitter.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn dead_letters_after_exhausting_retries() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.set_outage(true);
        let emitter = EventEmitter::spawn(bus.clone(), config(2));

        emitter.submit(event(1)).unwrap();
        emitter.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.attempts(), 3);
        let dead = emitter.dead_letters().take_all();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].cause, DeadLetterCause::RetriesExhausted);
        assert_eq!(dead[0].topic, "reports.created");
        assert_eq!(dead[0].event.report_id().as_str(), "R-2025-001");
    }

    #[tokio::test]
    async fn slow_bus_times_out() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.set_latency(Some(Duration::from_millis(500)));
        let emitter = EventEmitter::spawn(
            bus.clone(),
            config(0).with_emit_timeout(Duration::from_millis(20)),
        );

        emitter.submit(event(1)).unwrap();
        emitter.shutdown(Duration::from_secs(2)).await.unwrap();

        let dead = emitter.dead_letters().snapshot();
        assert!(dead[0].error.contains("timed out"));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn degraded_while_dead_letters_exist() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.set_outage(true);
        let emitter = EventEmitter::spawn(bus, config(0));

        emitter.submit(event(1)).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while emitter.dead_letters().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(emitter.health().status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn shutdown_drains_then_rejects() {
        let bus = Arc::new(InMemoryEventBus::new());
        let emitter = EventEmitter::spawn(bus.clone(), config(0));

        for seq in 1..=5 {
            emitter.submit(event(seq)).unwrap();
        }
        emitter.shutdown(Duration::from_secs(1)).await.unwrap();

        let keys: Vec<_> = bus.published().into_iter().map(|m| m.key).collect();
        assert_eq!(
            keys,
            ["R-2025-001", "R-2025-002", "R-2025-003", "R-2025-004", "R-2025-005"]
        );
        assert_eq!(emitter.submit(event(6)), Err(EmissionError::QueueClosed));
        assert_eq!(emitter.health().status, HealthStatus::Unhealthy);
        assert!(emitter.shutdown(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn full_queue_dead_letters_instead_of_blocking() {
        // The current-thread test runtime does not run the worker until we
        // yield, so the single slot stays occupied.
        let bus = Arc::new(InMemoryEventBus::new());
        let emitter = EventEmitter::spawn(bus.clone(), config(0).with_queue_capacity(1));

        emitter.submit(event(1)).unwrap();
        assert_eq!(emitter.submit(event(2)), Err(EmissionError::QueueFull));
        let dead = emitter.dead_letters().snapshot();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].cause, DeadLetterCause::QueueFull);
        assert_eq!(dead[0].attempts, 0);

        emitter.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(bus.published().len(), 1);
    }
}
