//! # Reportdesk Testing
//!
//! Testing utilities for the Reportdesk workspace.
//!
//! This crate provides:
//! - [`InMemoryReportRepository`]: `HashMap`-backed storage with failure injection
//! - [`InMemoryEventBus`]: records published messages, can simulate an outage
//! - [`FixedClock`]: deterministic time
//! - Fixtures and proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use reportdesk_testing::{InMemoryEventBus, InMemoryReportRepository, fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn creates_report() {
//!     let repo = Arc::new(InMemoryReportRepository::new());
//!     let bus = Arc::new(InMemoryEventBus::new());
//!     let service = service_with(repo, bus.clone(), test_clock());
//!
//!     let report = service.create(&"u1".into(), fixtures::pothole()).await?;
//!     bus.wait_for(1, Duration::from_secs(1)).await;
//! }
//! ```

use chrono::{DateTime, Utc};
use reportdesk_core::environment::Clock;

pub mod event_bus_mocks;
pub mod report_mocks;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use reportdesk_testing::mocks::FixedClock;
    /// use reportdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Ready-made inputs and viewers.
pub mod fixtures {
    use reportdesk_core::visibility::{CITIZEN_ROLE, STAFF_ROLE};
    use reportdesk_core::{CreateReportRequest, RoleSet, Viewer};

    /// The canonical pothole submission.
    #[must_use]
    pub fn pothole() -> CreateReportRequest {
        CreateReportRequest {
            title: "Pothole".to_string(),
            description: "Large pothole".to_string(),
            category: "SANITATION".to_string(),
            visibility: "PUBLIC".to_string(),
            image_url: None,
        }
    }

    /// A submission with the given visibility.
    #[must_use]
    pub fn request_with_visibility(visibility: &str) -> CreateReportRequest {
        CreateReportRequest {
            title: "Graffiti".to_string(),
            description: "Tagging on the underpass".to_string(),
            category: "CRIME".to_string(),
            visibility: visibility.to_string(),
            image_url: None,
        }
    }

    /// A viewer holding only the citizen capability.
    #[must_use]
    pub fn citizen(user_id: &str) -> Viewer {
        Viewer::new(user_id, RoleSet::from_iter([CITIZEN_ROLE]))
    }

    /// A viewer holding the staff capability.
    #[must_use]
    pub fn staff(user_id: &str) -> Viewer {
        Viewer::new(user_id, RoleSet::from_iter([STAFF_ROLE]))
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::prelude::*;
    use reportdesk_core::{CreateReportRequest, ReportCategory, ReportStatus, Visibility};

    /// Any report category.
    pub fn category() -> impl Strategy<Value = ReportCategory> {
        proptest::sample::select(ReportCategory::ALL)
    }

    /// Any report status.
    pub fn status() -> impl Strategy<Value = ReportStatus> {
        proptest::sample::select(ReportStatus::ALL)
    }

    /// Any visibility.
    pub fn visibility() -> impl Strategy<Value = Visibility> {
        proptest::sample::select(Visibility::ALL)
    }

    /// Any valid creation request.
    pub fn create_request() -> impl Strategy<Value = CreateReportRequest> {
        (
            "[A-Za-z][A-Za-z0-9 ]{0,40}",
            "[A-Za-z][A-Za-z0-9 ,.]{0,120}",
            category(),
            visibility(),
        )
            .prop_map(|(title, description, category, visibility)| CreateReportRequest {
                title,
                description,
                category: category.as_str().to_string(),
                visibility: visibility.as_str().to_string(),
                image_url: None,
            })
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Respects `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use event_bus_mocks::InMemoryEventBus;
pub use mocks::{FixedClock, test_clock};
pub use report_mocks::InMemoryReportRepository;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn fixtures_resolve_roles() {
        assert!(fixtures::staff("s").roles.contains("DEPARTMENT_STAFF"));
        assert!(!fixtures::citizen("c").roles.contains("DEPARTMENT_STAFF"));
    }
}
