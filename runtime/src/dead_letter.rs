//! Dead-lettered domain events.
//!
//! Events the emitter gave up on are parked here for operators and for the
//! readiness check. Nothing replays them. The buffer is bounded; once full,
//! the oldest event is evicted and counted in
//! `report_dead_letters_evicted_total`.

use crate::metrics::EmitterMetrics;
use chrono::{DateTime, Utc};
use reportdesk_core::{DomainEvent, ReportId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// How an event ended up dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterCause {
    /// Rejected at submission because the emitter queue was full.
    QueueFull,
    /// Every delivery attempt failed.
    RetriesExhausted,
}

impl DeadLetterCause {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }
}

/// An undelivered event together with where it was headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The event.
    pub event: DomainEvent,
    /// Topic it was meant for.
    pub topic: String,
    /// Why it was parked.
    pub cause: DeadLetterCause,
    /// Delivery attempts made; zero for [`DeadLetterCause::QueueFull`].
    pub attempts: usize,
    /// Last error seen.
    pub error: String,
    /// When it was parked.
    pub failed_at: DateTime<Utc>,
}

/// Shared, bounded store of [`DeadLetter`]s, oldest first.
///
/// Clones share the same store.
#[derive(Debug, Clone)]
pub struct DeadLetters {
    entries: Arc<Mutex<VecDeque<DeadLetter>>>,
    capacity: usize,
}

impl DeadLetters {
    /// Empty store holding at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<DeadLetter>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `event`, evicting the oldest entry when full.
    pub fn record(
        &self,
        event: DomainEvent,
        topic: &str,
        cause: DeadLetterCause,
        attempts: usize,
        error: String,
    ) {
        EmitterMetrics::record_dead_lettered(topic, cause.as_str());

        let mut entries = self.entries();
        if entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                EmitterMetrics::record_dead_letter_evicted();
                tracing::warn!(
                    report_id = %evicted.event.report_id(),
                    topic = %evicted.topic,
                    capacity = self.capacity,
                    "Dead-letter buffer full, evicting oldest event"
                );
            }
        }

        entries.push_back(DeadLetter {
            event,
            topic: topic.to_string(),
            cause,
            attempts,
            error,
            failed_at: Utc::now(),
        });
        EmitterMetrics::record_dead_letters(entries.len());
    }

    /// Number of parked events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Maximum number of parked events.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of every parked event, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.entries().iter().cloned().collect()
    }

    /// Parked events for one report, oldest first.
    #[must_use]
    pub fn for_report(&self, report_id: &ReportId) -> Vec<DeadLetter> {
        self.entries()
            .iter()
            .filter(|d| d.event.report_id() == report_id)
            .cloned()
            .collect()
    }

    /// Remove and return every parked event, oldest first.
    pub fn take_all(&self) -> Vec<DeadLetter> {
        let drained: Vec<_> = self.entries().drain(..).collect();
        EmitterMetrics::record_dead_letters(0);
        drained
    }
}

impl Default for DeadLetters {
    fn default() -> Self {
        Self::with_capacity(1000)
    }
}
