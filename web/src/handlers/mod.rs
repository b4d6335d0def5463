//! HTTP request handlers.

pub mod health;
pub mod profile;
pub mod reports;

pub use health::{health_check, readiness_check};
pub use profile::{Profile, get_profile};
pub use reports::{
    UpdateStatusRequest, UploadUrlRequest, create_report, create_upload_url, get_report,
    list_my_reports, list_reports, update_report_status,
};
