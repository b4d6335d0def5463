//! Event bus abstraction for publishing report events.
//!
//! The bus is the last hop of the emission pipeline:
//!
//! ```text
//! ┌─────────────────┐
//! │ ReportService   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  1. Save report │
//! │   to storage    │◄─── Source of truth
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Enqueue on   │
//! │    emitter      │◄─── Returns immediately
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 3. Publish to   │
//! │    Event Bus    │◄─── At-least-once, keyed by report id
//! └─────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Storage first**: the report row is written before anything is published
//! - **At-least-once delivery**: a retried publish may duplicate a message
//! - **Idempotency**: consumers deduplicate on `event_id`
//! - **Ordered within partition**: events of one report share a key
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in `reportdesk-testing`, with outage simulation
//! - `RedpandaEventBus` in `reportdesk-redpanda`, Kafka-compatible

use crate::event::SerializedEvent;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to create a topic
    #[error("Topic provisioning failed for '{topic}': {reason}")]
    ProvisioningFailed {
        /// The topic that could not be created
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Desired shape of a topic, used for provisioning at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicSpec {
    /// Topic name.
    pub name: String,
    /// Partition count.
    pub partitions: i32,
    /// Replication factor.
    pub replication_factor: i32,
}

impl TopicSpec {
    /// Topic with the default shape (3 partitions, replication factor 1).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 3,
            replication_factor: 1,
        }
    }

    /// Set the partition count.
    #[must_use]
    pub const fn partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set the replication factor.
    #[must_use]
    pub const fn replication_factor(mut self, factor: i32) -> Self {
        self.replication_factor = factor;
        self
    }
}

/// Trait for event bus implementations.
///
/// All implementations must be `Send + Sync`: the emitter worker holds the bus
/// behind an `Arc` and publishes from a spawned task.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be used as `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an event to `event.topic`, keyed by `event.key`.
    ///
    /// The call is not bounded by a timeout here; the emitter applies one.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the broker rejects or
    /// cannot receive the message.
    fn publish(
        &self,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Create the given topics if they do not exist.
    ///
    /// A topic that already exists counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ProvisioningFailed`] for the first topic that
    /// could not be created for any other reason.
    fn ensure_topics(
        &self,
        topics: &[TopicSpec],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;
}
