//! HTTP tests for the report endpoints.
//!
//! Runs the full router against in-memory adapters and static tokens.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use reportdesk_core::{ForwardOnlyTransitions, ReportStatus};
use reportdesk_runtime::{EmitterConfig, EventEmitter, ReportService};
use reportdesk_testing::{InMemoryEventBus, InMemoryReportRepository, test_clock};
use reportdesk_web::{
    AppState, CORRELATION_ID_HEADER, PublicBucketUploadIssuer, StaticTokenIdentityProvider,
    router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const CITIZEN: &str = "citizen-token";
const OTHER_CITIZEN: &str = "other-token";
const STAFF: &str = "staff-token";

// ============================================================================
// Test Fixtures
// ============================================================================

struct App {
    server: TestServer,
    service: ReportService,
    bus: Arc<InMemoryEventBus>,
}

fn tokens() -> StaticTokenIdentityProvider {
    StaticTokenIdentityProvider::parse(&format!(
        "{CITIZEN}=u1|u1@example.com|Uma|CITIZEN;\
         {OTHER_CITIZEN}=u2|u2@example.com|Ugo|CITIZEN;\
         {STAFF}=s1|s1@example.com|Sam|DEPARTMENT_STAFF"
    ))
    .expect("static tokens should parse")
}

fn app_with(configure: impl FnOnce(ReportService) -> ReportService) -> App {
    reportdesk_testing::init_tracing();
    let repository = InMemoryReportRepository::new();
    let bus = Arc::new(InMemoryEventBus::new());
    let emitter = Arc::new(EventEmitter::spawn(
        bus.clone(),
        EmitterConfig::default().with_emit_timeout(Duration::from_millis(200)),
    ));
    let service = configure(ReportService::new(
        Arc::new(repository),
        emitter,
        Arc::new(test_clock()),
    ));

    let state = AppState::new(
        service.clone(),
        Arc::new(tokens()),
        Arc::new(PublicBucketUploadIssuer::new(
            "http://minio:9000",
            "http://localhost:9001",
            "report-images",
        )),
    );

    App {
        server: TestServer::new(router(state)).expect("router should start"),
        service,
        bus,
    }
}

fn app() -> App {
    app_with(|service| service)
}

fn pothole() -> Value {
    json!({
        "title": "Pothole",
        "description": "Large pothole",
        "category": "SANITATION",
        "visibility": "PUBLIC"
    })
}

async fn create(app: &App, token: &str, body: &Value) -> Value {
    let response = app
        .server
        .post("/api/reports")
        .authorization_bearer(token)
        .json(body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"].clone()
}

fn error_code(body: &Value) -> &str {
    assert_eq!(body["success"], json!(false));
    body["error"]["code"].as_str().expect("error code")
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_is_open() {
    let app = app();

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}

#[tokio::test]
async fn ready_reflects_emitter_state() {
    let app = app();

    let response = app.server.get("/ready").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], json!("healthy"));

    app.service
        .emitter()
        .shutdown(Duration::from_secs(1))
        .await
        .unwrap();

    let response = app.server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], json!("unhealthy"));
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let app = app();
    let id = "6f9619ff-8b86-d011-b42d-00cf4fc964ff";

    let response = app
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static(id),
        )
        .await;

    assert_eq!(response.header(CORRELATION_ID_HEADER), id);
}

// ============================================================================
// Authentication and role gates
// ============================================================================

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = app();

    let response = app.server.get("/api/reports").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body = response.json::<Value>();
    assert_eq!(error_code(&body), "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], json!("Missing authorization header"));
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let app = app();

    let response = app
        .server
        .get("/api/reports")
        .authorization_bearer("nope")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["message"], json!("Invalid token"));
}

#[tokio::test]
async fn staff_cannot_create_reports() {
    let app = app();

    let response = app
        .server
        .post("/api/reports")
        .authorization_bearer(STAFF)
        .json(&pothole())
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&response.json::<Value>()), "FORBIDDEN");
}

#[tokio::test]
async fn citizens_cannot_change_status() {
    let app = app();
    let report = create(&app, CITIZEN, &pothole()).await;

    let response = app
        .server
        .put(&format!("/api/reports/{}/status", report["id"].as_str().unwrap()))
        .authorization_bearer(CITIZEN)
        .json(&json!({ "status": "RESOLVED" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn create_returns_envelope_with_timeline() {
    let app = app();

    let response = app
        .server
        .post("/api/reports")
        .authorization_bearer(CITIZEN)
        .json(&pothole())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Report created successfully"));

    let report = &body["data"];
    assert_eq!(report["id"], json!("R-2025-001"));
    assert_eq!(report["status"], json!("OPEN"));
    assert_eq!(report["user_id"], json!("u1"));

    let titles: Vec<&str> = report["updates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Report Received", "In Review", "Issue Resolved"]);

    assert!(app.bus.wait_for(1, Duration::from_secs(1)).await);
    assert_eq!(app.bus.events()[0].event_type(), "reports.created");
}

#[tokio::test]
async fn unknown_category_is_unprocessable() {
    let app = app();
    let mut body = pothole();
    body["category"] = json!("ROADS");

    let response = app
        .server
        .post("/api/reports")
        .authorization_bearer(CITIZEN)
        .json(&body)
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&response.json::<Value>()), "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = app();

    let response = app
        .server
        .post("/api/reports")
        .authorization_bearer(CITIZEN)
        .bytes(Bytes::from_static(b"{\"title\": "))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json::<Value>()), "BAD_REQUEST");
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn missing_report_is_not_found() {
    let app = app();

    let response = app
        .server
        .get("/api/reports/R-2025-999")
        .authorization_bearer(CITIZEN)
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>()["error"]["message"],
        json!("Report with id R-2025-999 not found")
    );
}

#[tokio::test]
async fn private_report_is_forbidden_to_others() {
    let app = app();
    let mut body = pothole();
    body["visibility"] = json!("PRIVATE");
    let report = create(&app, CITIZEN, &body).await;
    let path = format!("/api/reports/{}", report["id"].as_str().unwrap());

    app.server
        .get(&path)
        .authorization_bearer(OTHER_CITIZEN)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get(&path)
        .authorization_bearer(CITIZEN)
        .await
        .assert_status_ok();
    app.server
        .get(&path)
        .authorization_bearer(STAFF)
        .await
        .assert_status_ok();

    let listed = app
        .server
        .get("/api/reports")
        .authorization_bearer(OTHER_CITIZEN)
        .await
        .json::<Value>();
    assert_eq!(listed["data"], json!([]));

    let mine = app
        .server
        .get("/api/me/reports")
        .authorization_bearer(CITIZEN)
        .await
        .json::<Value>();
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn anonymous_owner_is_hidden_from_other_citizens() {
    let app = app();
    let mut body = pothole();
    body["visibility"] = json!("ANONYMOUS");
    let report = create(&app, CITIZEN, &body).await;
    assert_eq!(report["user_id"], json!("u1"));
    let path = format!("/api/reports/{}", report["id"].as_str().unwrap());

    let listed = app
        .server
        .get("/api/reports")
        .authorization_bearer(OTHER_CITIZEN)
        .await
        .json::<Value>();
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["title"], json!("Pothole"));
    assert!(listed["data"][0].get("user_id").is_none());

    let single = app
        .server
        .get(&path)
        .authorization_bearer(OTHER_CITIZEN)
        .await
        .json::<Value>();
    assert!(single["data"].get("user_id").is_none());

    for token in [CITIZEN, STAFF] {
        let seen = app
            .server
            .get(&path)
            .authorization_bearer(token)
            .await
            .json::<Value>();
        assert_eq!(seen["data"]["user_id"], json!("u1"));
    }
}

#[tokio::test]
async fn profile_counts_own_reports() {
    let app = app();
    let first = create(&app, CITIZEN, &pothole()).await;
    create(&app, CITIZEN, &pothole()).await;
    create(&app, OTHER_CITIZEN, &pothole()).await;

    app.server
        .put(&format!("/api/reports/{}/status", first["id"].as_str().unwrap()))
        .authorization_bearer(STAFF)
        .json(&json!({ "status": "RESOLVED" }))
        .await
        .assert_status_ok();

    let profile = app
        .server
        .get("/api/profile")
        .authorization_bearer(CITIZEN)
        .await
        .json::<Value>();

    assert_eq!(profile["data"]["id"], json!("u1"));
    assert_eq!(profile["data"]["role"], json!("CITIZEN"));
    assert_eq!(profile["data"]["open_reports"], json!(1));
    assert_eq!(profile["data"]["resolved_reports"], json!(1));

    let staff = app
        .server
        .get("/api/profile")
        .authorization_bearer(STAFF)
        .await
        .json::<Value>();
    assert_eq!(staff["data"]["role"], json!("DEPARTMENT_STAFF"));
}

// ============================================================================
// Status changes
// ============================================================================

#[tokio::test]
async fn staff_status_change_is_applied() {
    let app = app();
    let report = create(&app, CITIZEN, &pothole()).await;
    let id = report["id"].as_str().unwrap();

    let response = app
        .server
        .put(&format!("/api/reports/{id}/status"))
        .authorization_bearer(STAFF)
        .json(&json!({ "status": "IN_PROGRESS" }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["status"], json!("IN_PROGRESS"));
    assert_eq!(
        app.service.get(&id.into()).await.unwrap().status,
        ReportStatus::InProgress
    );
}

#[tokio::test]
async fn unknown_status_is_unprocessable() {
    let app = app();
    let report = create(&app, CITIZEN, &pothole()).await;

    let response = app
        .server
        .put(&format!("/api/reports/{}/status", report["id"].as_str().unwrap()))
        .authorization_bearer(STAFF)
        .json(&json!({ "status": "CLOSED" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn forward_only_rejects_reopening() {
    let app = app_with(|service| service.with_transition_policy(Arc::new(ForwardOnlyTransitions)));
    let report = create(&app, CITIZEN, &pothole()).await;
    let path = format!("/api/reports/{}/status", report["id"].as_str().unwrap());

    app.server
        .put(&path)
        .authorization_bearer(STAFF)
        .json(&json!({ "status": "RESOLVED" }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .put(&path)
        .authorization_bearer(STAFF)
        .json(&json!({ "status": "OPEN" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&response.json::<Value>()), "CONFLICT");
}

// ============================================================================
// Upload URLs
// ============================================================================

#[tokio::test]
async fn upload_url_derives_object_key() {
    let app = app();

    let response = app
        .server
        .post("/api/reports/upload-url")
        .authorization_bearer(CITIZEN)
        .json(&json!({ "file_name": "phone/IMG_1234.HEIC", "content_type": "image/heic" }))
        .await;

    response.assert_status_ok();
    let ticket = &response.json::<Value>()["data"];
    let key = ticket["object_key"].as_str().unwrap();
    assert!(key.starts_with("reports/u1/"));
    assert!(key.ends_with(".heic"));
    assert_eq!(
        ticket["image_url"],
        json!(format!("http://localhost:9001/report-images/{key}"))
    );
}

#[tokio::test]
async fn upload_url_requires_file_name() {
    let app = app();

    let response = app
        .server
        .post("/api/reports/upload-url")
        .authorization_bearer(CITIZEN)
        .json(&json!({ "file_name": " ", "content_type": "image/png" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
