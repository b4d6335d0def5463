//! Application state for Axum handlers.

use crate::identity::IdentityProvider;
use crate::uploads::UploadIssuer;
use reportdesk_runtime::ReportService;
use std::sync::Arc;

/// Default role allowed to create reports.
pub const DEFAULT_CITIZEN_ROLE: &str = "CITIZEN";

/// Shared state handed to every handler.
///
/// The staff role is taken from the service's visibility policy so that
/// read filtering and the status-update gate never disagree.
#[derive(Clone)]
pub struct AppState {
    /// Report lifecycle manager.
    pub service: ReportService,
    /// Bearer credential resolution.
    pub identity: Arc<dyn IdentityProvider>,
    /// Image upload URL issuance.
    pub uploads: Arc<dyn UploadIssuer>,
    /// Role required to create reports.
    pub citizen_role: String,
}

impl AppState {
    /// Create the state with the default citizen role.
    #[must_use]
    pub fn new(
        service: ReportService,
        identity: Arc<dyn IdentityProvider>,
        uploads: Arc<dyn UploadIssuer>,
    ) -> Self {
        Self {
            service,
            identity,
            uploads,
            citizen_role: DEFAULT_CITIZEN_ROLE.to_string(),
        }
    }

    /// Replace the citizen role.
    #[must_use]
    pub fn with_citizen_role(mut self, role: impl Into<String>) -> Self {
        self.citizen_role = role.into();
        self
    }

    /// Role required to change report status.
    #[must_use]
    pub fn staff_role(&self) -> &str {
        self.service.visibility().staff_role()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
