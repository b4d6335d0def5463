//! Report endpoints.
//!
//! | Route | Gate |
//! |---|---|
//! | `GET /api/reports` | bearer |
//! | `GET /api/me/reports` | bearer |
//! | `GET /api/reports/:id` | bearer, visibility |
//! | `POST /api/reports` | citizen role |
//! | `POST /api/reports/upload-url` | citizen role |
//! | `PUT /api/reports/:id/status` | staff role |
//!
//! Reads pass through [`VisibilityPolicy::redact`](reportdesk_core::VisibilityPolicy::redact),
//! so the owner of an anonymous report reaches only the owner and staff.

use crate::WebResult;
use crate::error::AppError;
use crate::extractors::{ApiJson, AuthenticatedUser};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::uploads::UploadTicket;
use axum::extract::{Path, State};
use reportdesk_core::{CreateReportRequest, Report, ReportId, ReportStatus};
use serde::Deserialize;

/// Body of `POST /api/reports/upload-url`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadUrlRequest {
    /// Client-side file name; only its extension is kept.
    #[serde(default)]
    pub file_name: String,
    /// MIME type the client will upload.
    #[serde(default)]
    pub content_type: String,
}

/// Body of `PUT /api/reports/:id/status`.
///
/// Kept as a string so unknown statuses become 422 rather than 400.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    /// `OPEN`, `IN_PROGRESS` or `RESOLVED`.
    pub status: String,
}

/// `GET /api/reports`
pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> WebResult<ApiResponse<Vec<Report>>> {
    let viewer = user.viewer();
    let policy = state.service.visibility();
    let reports = state
        .service
        .list(&viewer)
        .await?
        .into_iter()
        .map(|report| policy.redact(report, &viewer))
        .collect();
    Ok(ApiResponse::ok(reports))
}

/// `GET /api/me/reports`
pub async fn list_my_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> WebResult<ApiResponse<Vec<Report>>> {
    let reports = state.service.list_by_owner(&user.user_id).await?;
    Ok(ApiResponse::ok(reports))
}

/// `GET /api/reports/:id`
pub async fn get_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> WebResult<ApiResponse<Report>> {
    let viewer = user.viewer();
    let report = state.service.get_for(&ReportId::from(id), &viewer).await?;
    Ok(ApiResponse::ok(state.service.visibility().redact(report, &viewer)))
}

/// `POST /api/reports`
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn create_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateReportRequest>,
) -> WebResult<ApiResponse<Report>> {
    user.require_role(&state.citizen_role)?;

    let report = state.service.create(&user.user_id, request).await?;
    Ok(ApiResponse::created("Report created successfully", report))
}

/// `POST /api/reports/upload-url`
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn create_upload_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UploadUrlRequest>,
) -> WebResult<ApiResponse<UploadTicket>> {
    user.require_role(&state.citizen_role)?;

    let file_name = request.file_name.trim();
    let content_type = request.content_type.trim();
    if file_name.is_empty() || content_type.is_empty() {
        return Err(AppError::bad_request("file_name and content_type are required"));
    }

    let ticket = state
        .uploads
        .issue(&user.user_id, file_name, content_type)
        .await
        .map_err(|e| AppError::internal("Failed to create upload URL").with_source(e.into()))?;

    Ok(ApiResponse::ok(ticket))
}

/// `PUT /api/reports/:id/status`
#[tracing::instrument(skip_all, fields(user_id = %user.user_id, report_id = %id))]
pub async fn update_report_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> WebResult<ApiResponse<Report>> {
    user.require_role(state.staff_role())?;

    let status: ReportStatus = request.status.trim().parse()?;
    let report = state
        .service
        .update_status(&ReportId::from(id), status)
        .await?;
    Ok(ApiResponse::ok(report))
}
