//! Domain events describing report lifecycle transitions.
//!
//! One event is produced per transition and handed to the emitter. Events are
//! never persisted by this crate; the report row is the source of truth.
//!
//! # Wire format
//!
//! Events are serialized as flat JSON objects. The variant is carried in the
//! `event_type` field, which doubles as the default topic name:
//!
//! ```json
//! {
//!   "event_type": "reports.status-changed",
//!   "event_id": "2f0c…",
//!   "timestamp": "2025-01-01T00:00:00Z",
//!   "report_id": "R-2025-001",
//!   "user_id": "u1",
//!   "old_status": "OPEN",
//!   "new_status": "RESOLVED"
//! }
//! ```

use crate::event_bus::TopicSpec;
use crate::identifier::ReportId;
use crate::report::{Report, ReportCategory, ReportStatus, UserId, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default topic for [`ReportCreated`].
pub const REPORTS_CREATED: &str = "reports.created";
/// Default topic for [`ReportStatusChanged`].
pub const REPORTS_STATUS_CHANGED: &str = "reports.status-changed";

/// Error types for event operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// Payload emitted when a report is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCreated {
    /// Unique event id.
    pub event_id: Uuid,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Report the event is about; also the partition key.
    pub report_id: ReportId,
    /// Owner of the report.
    pub user_id: UserId,
    /// Report title.
    pub title: String,
    /// Report description.
    pub description: String,
    /// Report category.
    pub category: ReportCategory,
    /// Initial status, always `OPEN`.
    pub status: ReportStatus,
    /// Report visibility.
    pub visibility: Visibility,
}

/// Payload emitted when a report's status changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatusChanged {
    /// Unique event id.
    pub event_id: Uuid,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Report the event is about; also the partition key.
    pub report_id: ReportId,
    /// Owner of the report.
    pub user_id: UserId,
    /// Status before the change.
    pub old_status: ReportStatus,
    /// Status after the change.
    pub new_status: ReportStatus,
}

/// A report lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum DomainEvent {
    /// A report was created.
    #[serde(rename = "reports.created")]
    ReportCreated(ReportCreated),
    /// A report's status changed.
    #[serde(rename = "reports.status-changed")]
    ReportStatusChanged(ReportStatusChanged),
}

impl DomainEvent {
    /// Event for a freshly created report.
    #[must_use]
    pub fn created(report: &Report, now: DateTime<Utc>) -> Self {
        Self::ReportCreated(ReportCreated {
            event_id: Uuid::new_v4(),
            timestamp: now,
            report_id: report.id.clone(),
            user_id: report.user_id.clone(),
            title: report.title.clone(),
            description: report.description.clone(),
            category: report.category,
            status: report.status,
            visibility: report.visibility,
        })
    }

    /// Event for a status change; `report` already carries the new status.
    #[must_use]
    pub fn status_changed(report: &Report, old_status: ReportStatus, now: DateTime<Utc>) -> Self {
        Self::ReportStatusChanged(ReportStatusChanged {
            event_id: Uuid::new_v4(),
            timestamp: now,
            report_id: report.id.clone(),
            user_id: report.user_id.clone(),
            old_status,
            new_status: report.status,
        })
    }

    /// The `event_type` tag.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ReportCreated(_) => REPORTS_CREATED,
            Self::ReportStatusChanged(_) => REPORTS_STATUS_CHANGED,
        }
    }

    /// Report the event is about.
    #[must_use]
    pub const fn report_id(&self) -> &ReportId {
        match self {
            Self::ReportCreated(e) => &e.report_id,
            Self::ReportStatusChanged(e) => &e.report_id,
        }
    }

    /// Unique event id.
    #[must_use]
    pub const fn event_id(&self) -> Uuid {
        match self {
            Self::ReportCreated(e) => e.event_id,
            Self::ReportStatusChanged(e) => e.event_id,
        }
    }
}

/// Topic names, one per event variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventTopics {
    /// Topic receiving [`ReportCreated`].
    pub created: String,
    /// Topic receiving [`ReportStatusChanged`].
    pub status_changed: String,
}

impl Default for EventTopics {
    fn default() -> Self {
        Self {
            created: REPORTS_CREATED.to_string(),
            status_changed: REPORTS_STATUS_CHANGED.to_string(),
        }
    }
}

impl EventTopics {
    /// Topic an event is routed to.
    #[must_use]
    pub fn topic_for(&self, event: &DomainEvent) -> &str {
        match event {
            DomainEvent::ReportCreated(_) => &self.created,
            DomainEvent::ReportStatusChanged(_) => &self.status_changed,
        }
    }

    /// Both topic names.
    #[must_use]
    pub fn all(&self) -> [&str; 2] {
        [&self.created, &self.status_changed]
    }

    /// Provisioning shape for both topics.
    #[must_use]
    pub fn specs(&self, partitions: i32, replication_factor: i32) -> Vec<TopicSpec> {
        self.all()
            .into_iter()
            .map(|name| {
                TopicSpec::new(name)
                    .partitions(partitions)
                    .replication_factor(replication_factor)
            })
            .collect()
    }
}

/// A routed, serialized event ready for the bus.
///
/// # Fields
///
/// - `topic`: destination topic
/// - `key`: partition key (the report id)
/// - `event_type`: the `event_type` tag, also sent as a message header
/// - `payload`: JSON bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEvent {
    /// Destination topic.
    pub topic: String,
    /// Partition key.
    pub key: String,
    /// Event type tag.
    pub event_type: String,
    /// JSON payload.
    pub payload: Vec<u8>,
}

impl SerializedEvent {
    /// Serialize and route a domain event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if JSON encoding fails.
    pub fn from_event(event: &DomainEvent, topics: &EventTopics) -> Result<Self, EventError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| EventError::SerializationError(e.to_string()))?;

        Ok(Self {
            topic: topics.topic_for(event).to_string(),
            key: event.report_id().to_string(),
            event_type: event.event_type().to_string(),
            payload,
        })
    }

    /// Decode the payload back into a domain event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload is not a
    /// valid event.
    pub fn decode(&self) -> Result<DomainEvent, EventError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}
