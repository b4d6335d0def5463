//! Custom Axum extractors.
//!
//! - [`AuthenticatedUser`]: resolves the `Authorization: Bearer` credential
//!   through the configured [`IdentityProvider`](crate::identity::IdentityProvider)
//! - [`ApiJson`]: `Json` whose rejection renders as the error envelope
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     user: AuthenticatedUser,
//!     ApiJson(body): ApiJson<CreateReportRequest>,
//! ) -> WebResult<ApiResponse<Report>> {
//!     user.require_role("CITIZEN")?;
//!     ...
//! }
//! ```

use crate::error::AppError;
use crate::identity::{Identity, IdentityError};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use reportdesk_core::Viewer;
use std::ops::Deref;

const BEARER_PREFIX: &str = "Bearer ";

/// JSON body extractor that rejects with [`AppError`] (400 `BAD_REQUEST`).
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// The caller behind a bearer credential.
///
/// Rejects with 401 when the header is missing or the token does not
/// resolve, and 503 when the identity backend is unreachable.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl AuthenticatedUser {
    /// The visibility-filter view of the caller.
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        self.0.viewer()
    }

    /// Whether the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.0.roles.contains(role)
    }

    /// Fail with 403 unless the caller holds `role`.
    ///
    /// # Errors
    ///
    /// [`AppError::forbidden`] when the role is missing.
    pub fn require_role(&self, role: &str) -> Result<(), AppError> {
        if self.has_role(role) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.0.user_id, role, "Role check failed");
            Err(AppError::forbidden("Insufficient permissions"))
        }
    }
}

impl Deref for AuthenticatedUser {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        match state.identity.resolve(token).await {
            Ok(identity) => Ok(Self(identity)),
            Err(IdentityError::InvalidToken) => Err(AppError::unauthorized("Invalid token")),
            Err(err) => {
                tracing::warn!(error = %err, "Identity resolution failed");
                Err(AppError::unavailable("Identity provider unavailable"))
            }
        }
    }
}
