//! Visibility filter and role capability checks.
//!
//! Roles come from the identity collaborator as an opaque list of strings.
//! Nothing here assumes a hierarchy between them: every gate is a membership
//! check on a [`RoleSet`].

use crate::report::{Report, UserId, Visibility};
use crate::repository::VisibilityScope;
use serde::{Deserialize, Serialize};

/// Default staff capability tag.
pub const STAFF_ROLE: &str = "DEPARTMENT_STAFF";
/// Default citizen capability tag.
pub const CITIZEN_ROLE: &str = "CITIZEN";

/// Ordered, de-duplicated set of capability tags.
///
/// Insertion order is kept so the first role can be shown as the primary
/// one. Blank entries are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    /// Empty role set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Whether the set holds `role`.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }

    /// Iterate over the roles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no role is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut roles: Vec<String> = Vec::new();
        for role in iter {
            let role = role.into().trim().to_string();
            if !role.is_empty() && !roles.contains(&role) {
                roles.push(role);
            }
        }
        Self(roles)
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        roles.into_iter().collect()
    }
}

impl From<RoleSet> for Vec<String> {
    fn from(roles: RoleSet) -> Self {
        roles.0
    }
}

/// The identity reading reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    /// Resolved user id.
    pub user_id: UserId,
    /// Resolved capabilities.
    pub roles: RoleSet,
}

impl Viewer {
    /// Create a viewer.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, roles: RoleSet) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
        }
    }
}

/// Decides which reports a viewer may read.
///
/// A report is readable unless it is [`Visibility::Private`]; private reports
/// are readable only by their owner or by a viewer holding the staff
/// capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityPolicy {
    staff_role: String,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::new(STAFF_ROLE)
    }
}

impl VisibilityPolicy {
    /// Policy treating `staff_role` as the staff capability.
    #[must_use]
    pub fn new(staff_role: impl Into<String>) -> Self {
        Self {
            staff_role: staff_role.into(),
        }
    }

    /// The configured staff capability.
    #[must_use]
    pub fn staff_role(&self) -> &str {
        &self.staff_role
    }

    /// Whether the viewer holds the staff capability.
    #[must_use]
    pub fn is_staff(&self, viewer: &Viewer) -> bool {
        viewer.roles.contains(&self.staff_role)
    }

    /// Whether `viewer` may read `report`.
    #[must_use]
    pub fn can_view(&self, report: &Report, viewer: &Viewer) -> bool {
        report.visibility != Visibility::Private
            || report.is_owned_by(&viewer.user_id)
            || self.is_staff(viewer)
    }

    /// The view of `report` that `viewer` is allowed to see.
    ///
    /// The owner of an [`Visibility::Anonymous`] report is withheld unless the
    /// viewer is that owner or staff.
    #[must_use]
    pub fn redact(&self, mut report: Report, viewer: &Viewer) -> Report {
        if report.visibility == Visibility::Anonymous
            && !report.is_owned_by(&viewer.user_id)
            && !self.is_staff(viewer)
        {
            report.user_id = UserId::default();
        }
        report
    }

    /// Storage-level scope equivalent to [`can_view`](Self::can_view).
    ///
    /// Lets the repository filter in the query instead of after loading.
    #[must_use]
    pub fn scope_for(&self, viewer: &Viewer) -> VisibilityScope {
        if self.is_staff(viewer) {
            VisibilityScope::Unrestricted
        } else {
            VisibilityScope::PublicOrOwnedBy(viewer.user_id.clone())
        }
    }
}
