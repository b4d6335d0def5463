//! Profile endpoint.

use crate::WebResult;
use crate::extractors::AuthenticatedUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::extract::State;
use reportdesk_core::{RoleSet, UserId};
use serde::Serialize;

/// The caller's profile with report counts.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    /// User id.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// The staff role if held, the citizen role otherwise.
    pub role: String,
    /// Every role held.
    pub roles: RoleSet,
    /// Own reports in `OPEN` or `IN_PROGRESS`.
    pub open_reports: u64,
    /// Own reports in `RESOLVED`.
    pub resolved_reports: u64,
}

/// `GET /api/profile`
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> WebResult<ApiResponse<Profile>> {
    let counts = state.service.profile_counts(&user.user_id).await?;

    let role = if user.has_role(state.staff_role()) {
        state.staff_role().to_string()
    } else {
        state.citizen_role.clone()
    };

    let AuthenticatedUser(identity) = user;
    Ok(ApiResponse::ok(Profile {
        id: identity.user_id,
        email: identity.email,
        name: identity.name,
        role,
        roles: identity.roles,
        open_reports: counts.open_reports,
        resolved_reports: counts.resolved_reports,
    }))
}
