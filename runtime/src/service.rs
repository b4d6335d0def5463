//! Report lifecycle manager.
//!
//! [`ReportService`] owns creation and status transitions and gates reads
//! through the visibility policy. Each write is a storage transaction followed
//! by a detached hand-off to the [`EventEmitter`]:
//!
//! ```text
//! create(owner, request)
//!   ├─ validate            → ReportError::Validation
//!   ├─ next_report_id      → ReportError::Storage
//!   ├─ build_timeline
//!   ├─ insert (atomic)     → ReportError::Storage
//!   └─ emitter.submit      → logged, never returned
//! ```
//!
//! Storage failures are not retried here.

use crate::emitter::EventEmitter;
use crate::metrics::ReportMetrics;
use reportdesk_core::error::Result;
use reportdesk_core::{
    Clock, CreateReportRequest, DomainEvent, NewReport, PermissiveTransitions, Report,
    ReportError, ReportId, ReportQuery, ReportRepository, ReportStatus, TransitionPolicy, UserId,
    Viewer, VisibilityPolicy, build_timeline, next_report_id,
};
use serde::Serialize;
use std::sync::Arc;

/// Report counts shown on a user's profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileCounts {
    /// Reports in `OPEN` or `IN_PROGRESS`.
    pub open_reports: u64,
    /// Reports in `RESOLVED`.
    pub resolved_reports: u64,
}

/// The report lifecycle manager.
///
/// Cloning is cheap; all collaborators are shared.
#[derive(Clone)]
pub struct ReportService {
    repository: Arc<dyn ReportRepository>,
    emitter: Arc<EventEmitter>,
    clock: Arc<dyn Clock>,
    transitions: Arc<dyn TransitionPolicy>,
    visibility: VisibilityPolicy,
}

impl ReportService {
    /// Create a service with permissive transitions and the default staff role.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ReportRepository>,
        emitter: Arc<EventEmitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            emitter,
            clock,
            transitions: Arc::new(PermissiveTransitions),
            visibility: VisibilityPolicy::default(),
        }
    }

    /// Replace the transition policy.
    #[must_use]
    pub fn with_transition_policy(mut self, policy: Arc<dyn TransitionPolicy>) -> Self {
        self.transitions = policy;
        self
    }

    /// Replace the visibility policy.
    #[must_use]
    pub fn with_visibility_policy(mut self, policy: VisibilityPolicy) -> Self {
        self.visibility = policy;
        self
    }

    /// The visibility policy in force.
    #[must_use]
    pub const fn visibility(&self) -> &VisibilityPolicy {
        &self.visibility
    }

    /// The emitter events are handed to.
    #[must_use]
    pub const fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// Reports `viewer` may see, newest first.
    ///
    /// # Errors
    ///
    /// [`ReportError::Storage`] on storage failure.
    #[tracing::instrument(skip_all, fields(viewer = %viewer.user_id))]
    pub async fn list(&self, viewer: &Viewer) -> Result<Vec<Report>> {
        let query = ReportQuery::all().scoped(self.visibility.scope_for(viewer));
        Ok(self.repository.list_reports(&query).await?)
    }

    /// Load a report regardless of visibility.
    ///
    /// # Errors
    ///
    /// [`ReportError::NotFound`] when absent, [`ReportError::Storage`] on
    /// storage failure.
    #[tracing::instrument(skip_all, fields(report_id = %id))]
    pub async fn get(&self, id: &ReportId) -> Result<Report> {
        Ok(self.repository.find_report(id).await?)
    }

    /// Load a report on behalf of `viewer`.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`ReportError::Forbidden`] when the
    /// visibility policy denies access.
    pub async fn get_for(&self, id: &ReportId, viewer: &Viewer) -> Result<Report> {
        let report = self.get(id).await?;
        if !self.visibility.can_view(&report, viewer) {
            tracing::debug!(report_id = %id, viewer = %viewer.user_id, "Private report hidden from viewer");
            return Err(ReportError::Forbidden(format!("report {id} is private")));
        }
        Ok(report)
    }

    /// All reports owned by `owner`, newest first, private ones included.
    ///
    /// # Errors
    ///
    /// [`ReportError::Storage`] on storage failure.
    #[tracing::instrument(skip_all, fields(owner = %owner))]
    pub async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Report>> {
        let query = ReportQuery::all().owned_by(owner.clone());
        Ok(self.repository.list_reports(&query).await?)
    }

    /// Create a report owned by `owner`.
    ///
    /// The returned report carries its three milestones. Event emission
    /// failures are logged and never returned.
    ///
    /// # Errors
    ///
    /// - [`ReportError::Validation`] for a missing or malformed field
    /// - [`ReportError::Storage`] if id allocation or the insert fails
    #[tracing::instrument(skip_all, fields(owner = %owner))]
    pub async fn create(&self, owner: &UserId, request: CreateReportRequest) -> Result<Report> {
        if owner.as_str().trim().is_empty() {
            return Err(ReportError::validation("user id is required"));
        }
        let new = NewReport::try_from(request)?;

        let now = self.clock.now();
        let id = next_report_id(self.repository.as_ref(), now).await?;
        let updates = build_timeline(&id, now);

        let report = Report {
            id,
            title: new.title,
            description: new.description,
            category: new.category,
            status: ReportStatus::Open,
            visibility: new.visibility,
            image_url: new.image_url,
            user_id: owner.clone(),
            created_at: now,
            updated_at: now,
            updates: updates.to_vec(),
        };

        self.repository
            .insert_report_with_updates(&report, &updates)
            .await?;

        ReportMetrics::record_created();
        tracing::info!(
            report_id = %report.id,
            category = %report.category,
            visibility = %report.visibility,
            "Report created"
        );

        self.notify(DomainEvent::created(&report, now));
        Ok(report)
    }

    /// Move a report to `new_status`.
    ///
    /// Event emission failures are logged and never returned.
    ///
    /// # Errors
    ///
    /// - [`ReportError::NotFound`] when absent
    /// - [`ReportError::InvalidTransition`] when the policy rejects the move
    /// - [`ReportError::Storage`] on storage failure
    #[tracing::instrument(skip_all, fields(report_id = %id, new_status = %new_status))]
    pub async fn update_status(&self, id: &ReportId, new_status: ReportStatus) -> Result<Report> {
        let mut report = self.repository.find_report(id).await?;
        let old_status = report.status;

        self.transitions.check(old_status, new_status).inspect_err(|_| {
            tracing::info!(
                policy = self.transitions.name(),
                from = %old_status,
                to = %new_status,
                "Status transition rejected"
            );
        })?;

        let now = self.clock.now();
        report.status = new_status;
        report.updated_at = now;
        self.repository.save_report(&report).await?;

        ReportMetrics::record_status_change(old_status, new_status);
        tracing::info!(from = %old_status, to = %new_status, "Report status updated");

        self.notify(DomainEvent::status_changed(&report, old_status, now));
        Ok(report)
    }

    /// Open and resolved report counts for `owner`.
    ///
    /// # Errors
    ///
    /// [`ReportError::Storage`] on storage failure.
    pub async fn profile_counts(&self, owner: &UserId) -> Result<ProfileCounts> {
        let open = ReportQuery::all()
            .owned_by(owner.clone())
            .with_statuses([ReportStatus::Open, ReportStatus::InProgress]);
        let resolved = ReportQuery::all()
            .owned_by(owner.clone())
            .with_statuses([ReportStatus::Resolved]);

        Ok(ProfileCounts {
            open_reports: self.repository.count_reports(&open).await?,
            resolved_reports: self.repository.count_reports(&resolved).await?,
        })
    }

    fn notify(&self, event: DomainEvent) {
        let report_id = event.report_id().clone();
        let event_type = event.event_type();
        if let Err(e) = self.emitter.submit(event) {
            tracing::warn!(
                report_id = %report_id,
                event_type,
                error = %e,
                "Event publish failed (continuing)"
            );
        }
    }
}
