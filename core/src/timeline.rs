//! Progress timeline attached to every new report.
//!
//! Three fixed milestones are created with the report and never advanced by
//! this crate. Only the first is active; the other two carry the literal date
//! `Pending`.

use crate::identifier::ReportId;
use crate::report::ReportUpdate;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Title of the first milestone.
pub const REPORT_RECEIVED: &str = "Report Received";
/// Title of the second milestone.
pub const IN_REVIEW: &str = "In Review";
/// Title of the third milestone.
pub const ISSUE_RESOLVED: &str = "Issue Resolved";
/// Date shown for milestones not yet reached.
pub const PENDING: &str = "Pending";

/// Display format of a reached milestone (`Jan 02, 2025`).
pub const DATE_FORMAT: &str = "%b %d, %Y";

/// Build the three milestones for a report created at `now`.
///
/// Entries are returned in display order and share `now` as their creation
/// timestamp. Each gets a fresh UUID.
#[must_use]
pub fn build_timeline(report_id: &ReportId, now: DateTime<Utc>) -> [ReportUpdate; 3] {
    let entry = |title: &str, date: String, is_active: bool| ReportUpdate {
        id: Uuid::new_v4(),
        report_id: report_id.clone(),
        title: title.to_string(),
        date,
        is_active,
        created_at: now,
    };

    [
        entry(REPORT_RECEIVED, now.format(DATE_FORMAT).to_string(), true),
        entry(IN_REVIEW, PENDING.to_string(), false),
        entry(ISSUE_RESOLVED, PENDING.to_string(), false),
    ]
}
