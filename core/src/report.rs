//! Report domain model.
//!
//! A [`Report`] is a citizen-submitted issue record. It owns exactly three
//! [`ReportUpdate`] milestones created alongside it (see
//! [`build_timeline`](crate::timeline::build_timeline)). Status and the
//! updated timestamp are the only fields that change after creation.

use crate::error::ReportError;
use crate::identifier::ReportId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum title length accepted on creation.
pub const MAX_TITLE_LEN: usize = 255;

/// Declares a closed string enum with upper-case wire names.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire name of the variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ReportError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(ReportError::validation(format!(
                        concat!("unknown ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum! {
    /// What kind of issue a report describes.
    ReportCategory, "category" {
        /// Criminal activity.
        Crime => "CRIME",
        /// Waste, litter, road surface and similar.
        Sanitation => "SANITATION",
        /// Public health hazards.
        Health => "HEALTH",
    }
}

string_enum! {
    /// Lifecycle status of a report.
    ///
    /// The nominal order is `OPEN → IN_PROGRESS → RESOLVED`; whether that order
    /// is enforced is decided by the configured
    /// [`TransitionPolicy`](crate::transition::TransitionPolicy).
    ReportStatus, "status" {
        /// Newly submitted.
        Open => "OPEN",
        /// Picked up by department staff.
        InProgress => "IN_PROGRESS",
        /// Closed out.
        Resolved => "RESOLVED",
    }
}

string_enum! {
    /// Read-access classification of a report.
    Visibility, "visibility" {
        /// Anyone may read it.
        Public => "PUBLIC",
        /// Only the owner and staff may read it.
        Private => "PRIVATE",
        /// Readable by anyone; the owner is shown only to the owner and staff.
        Anonymous => "ANONYMOUS",
    }
}

/// Identifier of the user owning a report, as resolved by the identity
/// collaborator.
///
/// Empty only on a report whose owner was withheld from the viewer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A citizen-submitted report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// `R-<year>-<seq>` identifier.
    pub id: ReportId,
    /// Short summary.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Issue category.
    pub category: ReportCategory,
    /// Lifecycle status.
    pub status: ReportStatus,
    /// Read-access classification.
    pub visibility: Visibility,
    /// Public URL of an attached image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Owning user; omitted when withheld from the viewer.
    #[serde(default, skip_serializing_if = "UserId::is_empty")]
    pub user_id: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change (or creation time).
    pub updated_at: DateTime<Utc>,
    /// Progress milestones, ordered by position.
    #[serde(default)]
    pub updates: Vec<ReportUpdate>,
}

impl Report {
    /// Whether `user` owns this report.
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }
}

/// One of the three fixed progress milestones of a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportUpdate {
    /// Opaque unique identifier.
    pub id: Uuid,
    /// Owning report.
    pub report_id: ReportId,
    /// Milestone title.
    pub title: String,
    /// Display date (`Jan 02, 2025`) or `Pending`.
    pub date: String,
    /// Whether the milestone has been reached.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Untrusted creation input, as received from a boundary layer.
///
/// Enum fields are kept as strings so that unknown values become
/// [`ReportError::Validation`] in the core rather than a boundary-specific
/// deserialization failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReportRequest {
    /// Short summary.
    #[serde(default)]
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// `CRIME`, `SANITATION` or `HEALTH`.
    #[serde(default)]
    pub category: String,
    /// `PUBLIC`, `PRIVATE` or `ANONYMOUS`.
    #[serde(default)]
    pub visibility: String,
    /// Public URL previously issued for an uploaded image.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Validated creation input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReport {
    /// Non-blank title, as submitted.
    pub title: String,
    /// Non-blank description, as submitted.
    pub description: String,
    /// Parsed category.
    pub category: ReportCategory,
    /// Parsed visibility.
    pub visibility: Visibility,
    /// Image reference, `None` when absent or blank.
    pub image_url: Option<String>,
}

fn required(field: &str, value: String) -> Result<String, ReportError> {
    if value.trim().is_empty() {
        return Err(ReportError::validation(format!("{field} is required")));
    }
    Ok(value)
}

impl TryFrom<CreateReportRequest> for NewReport {
    type Error = ReportError;

    fn try_from(request: CreateReportRequest) -> Result<Self, Self::Error> {
        let title = required("title", request.title)?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ReportError::validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        let description = required("description", request.description)?;
        let category = required("category", request.category)?.trim().parse()?;
        let visibility = required("visibility", request.visibility)?.trim().parse()?;
        let image_url = request
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            title,
            description,
            category,
            visibility,
            image_url,
        })
    }
}
