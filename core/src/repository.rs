//! Persistence contract for reports.
//!
//! The lifecycle manager depends only on this trait. It needs:
//!
//! - an atomic insert of a report together with its three milestones
//! - lookup by id and filtered listing, newest first
//! - a single-row overwrite for status changes
//! - counting, for the profile summary
//! - an atomic per-year sequence for identifiers
//!
//! # Implementations
//!
//! - `PostgresReportRepository` (in `reportdesk-postgres`): production
//! - `InMemoryReportRepository` (in `reportdesk-testing`): fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Like [`EventBus`](crate::event_bus::EventBus), this trait returns
//! `Pin<Box<dyn Future>>` so it can be shared as `Arc<dyn ReportRepository>`.

use crate::identifier::ReportId;
use crate::report::{Report, ReportStatus, ReportUpdate, UserId, Visibility};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by repository methods.
pub type RepositoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Errors that can occur during repository operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No report with this id.
    #[error("Report not found: {0}")]
    NotFound(ReportId),

    /// A report with this id already exists.
    #[error("Duplicate report id: {0}")]
    Duplicate(ReportId),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to a report.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Which visibility classes a listing may return.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Every report.
    #[default]
    Unrestricted,
    /// Non-private reports, plus private ones owned by this user.
    PublicOrOwnedBy(UserId),
}

impl VisibilityScope {
    /// Whether a report falls within the scope.
    #[must_use]
    pub fn permits(&self, report: &Report) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::PublicOrOwnedBy(user) => {
                report.visibility != Visibility::Private || &report.user_id == user
            }
        }
    }
}

/// Listing and counting predicate.
///
/// # Examples
///
/// ```
/// use reportdesk_core::{ReportQuery, ReportStatus, UserId};
///
/// let open_for_u1 = ReportQuery::all()
///     .owned_by(UserId::from("u1"))
///     .with_statuses([ReportStatus::Open, ReportStatus::InProgress]);
/// assert_eq!(open_for_u1.statuses.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportQuery {
    /// Restrict to one owner.
    pub owner: Option<UserId>,
    /// Restrict to these statuses; empty means any.
    pub statuses: Vec<ReportStatus>,
    /// Visibility restriction.
    pub scope: VisibilityScope,
}

impl ReportQuery {
    /// Match every report.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to reports owned by `user`.
    #[must_use]
    pub fn owned_by(mut self, user: UserId) -> Self {
        self.owner = Some(user);
        self
    }

    /// Restrict to the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = ReportStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Apply a visibility scope.
    #[must_use]
    pub fn scoped(mut self, scope: VisibilityScope) -> Self {
        self.scope = scope;
        self
    }

    /// Evaluate the predicate in memory.
    #[must_use]
    pub fn matches(&self, report: &Report) -> bool {
        self.owner.as_ref().is_none_or(|owner| &report.user_id == owner)
            && (self.statuses.is_empty() || self.statuses.contains(&report.status))
            && self.scope.permits(report)
    }
}

/// Storage collaborator for reports.
pub trait ReportRepository: Send + Sync {
    /// Insert a report and its three milestones as one atomic unit.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::Duplicate`] if the id is taken
    /// - [`RepositoryError::Database`] on any storage failure; nothing is
    ///   written in that case
    fn insert_report_with_updates<'a>(
        &'a self,
        report: &'a Report,
        updates: &'a [ReportUpdate; 3],
    ) -> RepositoryFuture<'a, ()>;

    /// Load a report with its milestones.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when absent.
    fn find_report<'a>(&'a self, id: &'a ReportId) -> RepositoryFuture<'a, Report>;

    /// List reports matching `query`, newest first, milestones included.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Database`] on storage failure.
    fn list_reports<'a>(&'a self, query: &'a ReportQuery) -> RepositoryFuture<'a, Vec<Report>>;

    /// Overwrite the mutable fields (status, `updated_at`) of an existing report.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when the row does not exist.
    fn save_report<'a>(&'a self, report: &'a Report) -> RepositoryFuture<'a, ()>;

    /// Count reports matching `query`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Database`] on storage failure.
    fn count_reports<'a>(&'a self, query: &'a ReportQuery) -> RepositoryFuture<'a, u64>;

    /// Atomically allocate the next identifier sequence for `year`.
    ///
    /// The first allocation of a year starts after the number of stored
    /// reports already carrying that year.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Database`] on storage failure.
    fn next_sequence(&self, year: i32) -> RepositoryFuture<'_, u64>;
}
