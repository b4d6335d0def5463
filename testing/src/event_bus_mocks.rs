//! In-memory event bus for tests.
//!
//! Records every published message and every provisioned topic. Failure
//! modes can be toggled at runtime:
//!
//! - [`InMemoryEventBus::set_outage`]: every publish fails until cleared
//! - [`InMemoryEventBus::fail_next`]: the next `n` publishes fail
//! - [`InMemoryEventBus::set_latency`]: publishes sleep before completing

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only

use reportdesk_core::{DomainEvent, EventBus, EventBusError, SerializedEvent, TopicSpec};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recording [`EventBus`] with outage simulation.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventBus {
    published: Arc<Mutex<Vec<SerializedEvent>>>,
    topics: Arc<Mutex<BTreeMap<String, TopicSpec>>>,
    outage: Arc<AtomicBool>,
    fail_next: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryEventBus {
    /// Create a healthy bus with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (`true`) or succeed again (`false`).
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    /// Make the next `n` publishes fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delay every publish by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Pre-create a topic, as if provisioned by an earlier process.
    #[must_use]
    pub fn with_existing_topic(self, name: &str) -> Self {
        self.topics
            .lock()
            .unwrap()
            .insert(name.to_string(), TopicSpec::new(name));
        self
    }

    /// Messages delivered so far, in delivery order.
    #[must_use]
    pub fn published(&self) -> Vec<SerializedEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Delivered messages decoded back into domain events.
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.published()
            .iter()
            .filter_map(|m| m.decode().ok())
            .collect()
    }

    /// Messages delivered to `topic`.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<SerializedEvent> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    /// Total publish attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Topics that exist on the bus.
    #[must_use]
    pub fn topics(&self) -> Vec<TopicSpec> {
        self.topics.lock().unwrap().values().cloned().collect()
    }

    /// Wait until at least `count` messages were delivered.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.published.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    fn should_fail(&self) -> bool {
        if self.outage.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let event = event.clone();
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let latency = *self.latency.lock().unwrap();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if self.should_fail() {
                return Err(EventBusError::PublishFailed {
                    topic: event.topic,
                    reason: "simulated outage".to_string(),
                });
            }
            self.published.lock().unwrap().push(event);
            Ok(())
        })
    }

    fn ensure_topics(
        &self,
        topics: &[TopicSpec],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            let mut existing = self.topics.lock().unwrap();
            for spec in topics {
                existing.entry(spec.name.clone()).or_insert(spec);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str) -> SerializedEvent {
        SerializedEvent {
            topic: topic.to_string(),
            key: "R-2025-001".to_string(),
            event_type: topic.to_string(),
            payload: b"{}".to_vec(),
        }
    }

    #[tokio::test]
    async fn records_published_messages() {
        let bus = InMemoryEventBus::new();
        bus.publish(&message("reports.created")).await.unwrap();
        assert_eq!(bus.published_to("reports.created").len(), 1);
        assert!(bus.published_to("reports.status-changed").is_empty());
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_n_times() {
        let bus = InMemoryEventBus::new();
        bus.fail_next(2);
        assert!(bus.publish(&message("t")).await.is_err());
        assert!(bus.publish(&message("t")).await.is_err());
        assert!(bus.publish(&message("t")).await.is_ok());
        assert_eq!(bus.attempts(), 3);
    }

    #[tokio::test]
    async fn ensure_topics_keeps_existing_topics() {
        let bus = InMemoryEventBus::new().with_existing_topic("reports.created");
        bus.ensure_topics(&[
            TopicSpec::new("reports.created").partitions(6),
            TopicSpec::new("reports.status-changed"),
        ])
        .await
        .unwrap();

        let topics = bus.topics();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].partitions, 3);
    }
}
