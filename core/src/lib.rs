//! # Reportdesk Core
//!
//! Core types, policies and collaborator traits for the Reportdesk citizen
//! report intake backend.
//!
//! This crate holds everything that does not perform I/O itself:
//!
//! - **Domain model**: [`Report`], [`ReportUpdate`] and the category, status and
//!   visibility enums
//! - **Identifier format**: `R-<year>-<seq>` report identifiers
//! - **Progress timeline**: the fixed three milestones attached to every report
//! - **Visibility filter**: who may read which report
//! - **Transition policy**: the single point where status changes are validated
//! - **Domain events**: the payloads emitted on creation and status change
//! - **Collaborator traits**: [`ReportRepository`] for persistence and
//!   [`EventBus`] for the message broker
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌─────────────────────┐
//! │ create / update  │─────▶│  ReportService      │ (reportdesk-runtime)
//! └──────────────────┘      │  - next_report_id   │
//!                           │  - build_timeline   │
//!                           │  - TransitionPolicy │
//!                           └─────────┬───────────┘
//!                                     │
//!                  ┌──────────────────┴──────────────────┐
//!                  ▼                                     ▼
//!        ┌───────────────────┐                 ┌───────────────────┐
//!        │ ReportRepository  │                 │ EventEmitter      │
//!        │ (source of truth) │                 │ → EventBus        │
//!        └───────────────────┘                 └───────────────────┘
//! ```
//!
//! The repository write is the primary transaction. Event emission is a
//! detached, best-effort follow-up whose failure never reaches the caller.

pub mod environment;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod identifier;
pub mod report;
pub mod repository;
pub mod timeline;
pub mod transition;
pub mod visibility;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::ReportError;
pub use event::{DomainEvent, EventTopics, ReportCreated, ReportStatusChanged, SerializedEvent};
pub use event_bus::{EventBus, EventBusError, TopicSpec};
pub use identifier::{ReportId, next_report_id};
pub use report::{
    CreateReportRequest, NewReport, Report, ReportCategory, ReportStatus, ReportUpdate, UserId,
    Visibility,
};
pub use repository::{ReportQuery, ReportRepository, RepositoryError, VisibilityScope};
pub use timeline::build_timeline;
pub use transition::{
    ForwardOnlyTransitions, PermissiveTransitions, TransitionMode, TransitionPolicy,
};
pub use visibility::{RoleSet, Viewer, VisibilityPolicy};
