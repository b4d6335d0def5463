//! HTTP surface of the report intake backend.
//!
//! Handlers stay thin: resolve the caller, check the role gate, call
//! [`ReportService`](reportdesk_runtime::ReportService) and wrap the result in
//! the JSON envelope. Domain errors become HTTP errors through
//! [`AppError`]'s `From<ReportError>`.
//!
//! # Request Flow
//!
//! 1. **Correlation id** attached by [`correlation_id_layer`]
//! 2. **Caller** resolved by the [`AuthenticatedUser`] extractor
//! 3. **Role gate** checked in the handler
//! 4. **Service call** (storage, then detached event emission)
//! 5. **Envelope**: [`ApiResponse`] or [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::new(service, Arc::new(identity), Arc::new(uploads));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8081").await?;
//! axum::serve(listener, reportdesk_web::router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod response;
pub mod state;
pub mod uploads;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ApiJson, AuthenticatedUser};
pub use identity::{Identity, IdentityError, IdentityProvider, StaticTokenIdentityProvider};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use response::ApiResponse;
pub use state::AppState;
pub use uploads::{PublicBucketUploadIssuer, UploadError, UploadIssuer, UploadTicket};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/profile", get(handlers::get_profile))
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route("/api/reports/upload-url", post(handlers::create_upload_url))
        .route("/api/reports/:id", get(handlers::get_report))
        .route("/api/reports/:id/status", put(handlers::update_report_status))
        .route("/api/me/reports", get(handlers::list_my_reports))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
