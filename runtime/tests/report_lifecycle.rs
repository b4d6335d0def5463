//! Integration tests for the report lifecycle manager.
//!
//! Runs [`ReportService`] against the in-memory repository and event bus.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use reportdesk_core::{
    DomainEvent, ForwardOnlyTransitions, Report, ReportError, ReportId, ReportStatus, UserId,
    Visibility,
};
use reportdesk_runtime::{
    DeadLetterCause, EmitterConfig, EventEmitter, ReportService, RetryPolicy,
};
use reportdesk_testing::{
    InMemoryEventBus, InMemoryReportRepository, fixtures, properties, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Harness {
    service: ReportService,
    repository: InMemoryReportRepository,
    bus: Arc<InMemoryEventBus>,
}

fn harness() -> Harness {
    let repository = InMemoryReportRepository::new();
    let bus = Arc::new(InMemoryEventBus::new());
    let config = EmitterConfig::default()
        .with_emit_timeout(Duration::from_millis(200))
        .with_retry_policy(
            RetryPolicy::builder()
                .max_retries(1)
                .initial_delay(Duration::from_millis(1))
                .build(),
        );
    let emitter = Arc::new(EventEmitter::spawn(bus.clone(), config));
    let service = ReportService::new(
        Arc::new(repository.clone()),
        emitter,
        Arc::new(test_clock()),
    );

    Harness {
        service,
        repository,
        bus,
    }
}

fn u1() -> UserId {
    UserId::from("u1")
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn pothole_is_created_with_timeline_and_event() {
    let h = harness();

    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();

    assert_eq!(report.id.as_str(), "R-2025-001");
    assert_eq!(report.status, ReportStatus::Open);
    assert_eq!(report.user_id, u1());
    assert_eq!(report.created_at, report.updated_at);

    let titles: Vec<_> = report.updates.iter().map(|u| u.title.as_str()).collect();
    assert_eq!(titles, ["Report Received", "In Review", "Issue Resolved"]);
    let active: Vec<_> = report.updates.iter().map(|u| u.is_active).collect();
    assert_eq!(active, [true, false, false]);
    assert_eq!(report.updates[0].date, "Jan 01, 2025");
    assert_eq!(report.updates[1].date, "Pending");

    assert!(h.bus.wait_for(1, Duration::from_secs(1)).await);
    let published = h.bus.published_to("reports.created");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key, "R-2025-001");

    match &h.bus.events()[0] {
        DomainEvent::ReportCreated(created) => {
            assert_eq!(created.report_id, report.id);
            assert_eq!(created.status, ReportStatus::Open);
            assert_eq!(created.title, "Pothole");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn stored_report_matches_returned_report() {
    let h = harness();

    let created = h.service.create(&u1(), fixtures::pothole()).await.unwrap();
    let stored = h.service.get(&created.id).await.unwrap();

    assert_eq!(stored, created);
    assert_eq!(h.repository.len(), 1);
}

#[tokio::test]
async fn identifiers_increase_within_a_year() {
    let h = harness();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(h.service.create(&u1(), fixtures::pothole()).await.unwrap().id);
    }

    let sequences: Vec<_> = ids.iter().map(ReportId::sequence).collect();
    assert_eq!(sequences, [Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn unknown_category_is_rejected_without_side_effects() {
    let h = harness();
    let mut request = fixtures::pothole();
    request.category = "PARKING".to_string();

    let err = h.service.create(&u1(), request).await.unwrap_err();

    assert!(matches!(err, ReportError::Validation(_)));
    assert!(h.repository.is_empty());
    assert!(!h.bus.wait_for(1, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn blank_owner_is_rejected() {
    let h = harness();

    let err = h
        .service
        .create(&UserId::from("  "), fixtures::pothole())
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::Validation(_)));
}

#[tokio::test]
async fn bus_outage_does_not_fail_creation() {
    let h = harness();
    h.bus.set_outage(true);

    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();

    assert_eq!(h.service.get(&report.id).await.unwrap().id, report.id);

    // Retries exhaust, then the event lands in the dead-letter buffer.
    let dead_letters = h.service.emitter().dead_letters().clone();
    for _ in 0..100 {
        if !dead_letters.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(dead_letters.len(), 1);
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn storage_failure_surfaces_and_emits_nothing() {
    let h = harness();
    h.repository.fail_storage(true);

    let err = h.service.create(&u1(), fixtures::pothole()).await.unwrap_err();

    assert!(matches!(err, ReportError::Storage(_)));
    assert!(!h.bus.wait_for(1, Duration::from_millis(50)).await);
}

// ============================================================================
// Status transitions
// ============================================================================

#[tokio::test]
async fn status_update_persists_and_emits_change() {
    let h = harness();
    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();

    let updated = h
        .service
        .update_status(&report.id, ReportStatus::Resolved)
        .await
        .unwrap();

    assert_eq!(updated.status, ReportStatus::Resolved);
    assert_eq!(
        h.service.get(&report.id).await.unwrap().status,
        ReportStatus::Resolved
    );

    assert!(h.bus.wait_for(2, Duration::from_secs(1)).await);
    let changes = h.bus.published_to("reports.status-changed");
    assert_eq!(changes.len(), 1);
    match changes[0].decode().unwrap() {
        DomainEvent::ReportStatusChanged(changed) => {
            assert_eq!(changed.old_status, ReportStatus::Open);
            assert_eq!(changed.new_status, ReportStatus::Resolved);
            assert_eq!(changed.user_id, u1());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn permissive_policy_allows_reopening() {
    let h = harness();
    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();

    h.service
        .update_status(&report.id, ReportStatus::Resolved)
        .await
        .unwrap();
    let reopened = h
        .service
        .update_status(&report.id, ReportStatus::Open)
        .await
        .unwrap();

    assert_eq!(reopened.status, ReportStatus::Open);
}

#[tokio::test]
async fn every_status_is_reachable_under_permissive_policy() {
    let h = harness();
    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();

    for &status in ReportStatus::ALL.iter().rev().chain(ReportStatus::ALL) {
        let updated = h.service.update_status(&report.id, status).await.unwrap();
        assert_eq!(updated.status, status);
        assert_eq!(h.service.get(&report.id).await.unwrap().status, status);
    }
}

#[tokio::test]
async fn status_update_during_bus_outage_succeeds() {
    let h = harness();
    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();
    assert!(h.bus.wait_for(1, Duration::from_secs(1)).await);
    h.bus.set_outage(true);

    let updated = h
        .service
        .update_status(&report.id, ReportStatus::InProgress)
        .await
        .unwrap();

    assert_eq!(updated.status, ReportStatus::InProgress);
    assert_eq!(
        h.service.get(&report.id).await.unwrap().status,
        ReportStatus::InProgress
    );

    let dead_letters = h.service.emitter().dead_letters().clone();
    for _ in 0..100 {
        if !dead_letters.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let parked = dead_letters.for_report(&report.id);
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].topic, "reports.status-changed");
    assert_eq!(parked[0].cause, DeadLetterCause::RetriesExhausted);
    match &parked[0].event {
        DomainEvent::ReportStatusChanged(changed) => {
            assert_eq!(changed.old_status, ReportStatus::Open);
            assert_eq!(changed.new_status, ReportStatus::InProgress);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.bus.published_to("reports.status-changed").len(), 0);
}

#[tokio::test]
async fn timeline_is_not_advanced_by_status_changes() {
    let h = harness();
    let report = h.service.create(&u1(), fixtures::pothole()).await.unwrap();

    h.service
        .update_status(&report.id, ReportStatus::Resolved)
        .await
        .unwrap();

    let stored = h.service.get(&report.id).await.unwrap();
    assert_eq!(stored.updates, report.updates);
}

#[tokio::test]
async fn forward_only_policy_rejects_backwards_move() {
    let h = harness();
    let service = h
        .service
        .clone()
        .with_transition_policy(Arc::new(ForwardOnlyTransitions));
    let report = service.create(&u1(), fixtures::pothole()).await.unwrap();

    service
        .update_status(&report.id, ReportStatus::Resolved)
        .await
        .unwrap();
    let err = service
        .update_status(&report.id, ReportStatus::Open)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ReportError::InvalidTransition {
            from: ReportStatus::Resolved,
            to: ReportStatus::Open,
        }
    );
    assert_eq!(
        service.get(&report.id).await.unwrap().status,
        ReportStatus::Resolved
    );
}

#[tokio::test]
async fn updating_missing_report_is_not_found() {
    let h = harness();
    let id = ReportId::from("R-2025-999");

    let err = h
        .service
        .update_status(&id, ReportStatus::Resolved)
        .await
        .unwrap_err();

    assert_eq!(err, ReportError::NotFound(id));
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn private_report_is_hidden_from_other_citizens() {
    let h = harness();
    let report = h
        .service
        .create(&u1(), fixtures::request_with_visibility("PRIVATE"))
        .await
        .unwrap();

    let err = h
        .service
        .get_for(&report.id, &fixtures::citizen("u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Forbidden(_)));

    assert!(h.service.get_for(&report.id, &fixtures::citizen("u1")).await.is_ok());
    assert!(h.service.get_for(&report.id, &fixtures::staff("s1")).await.is_ok());
}

#[tokio::test]
async fn listing_applies_visibility_newest_first() {
    let h = harness();
    let public = h.service.create(&u1(), fixtures::pothole()).await.unwrap();
    let private = h
        .service
        .create(&u1(), fixtures::request_with_visibility("PRIVATE"))
        .await
        .unwrap();
    let anonymous = h
        .service
        .create(&UserId::from("u3"), fixtures::request_with_visibility("ANONYMOUS"))
        .await
        .unwrap();

    let ids = |reports: Vec<Report>| reports.into_iter().map(|r| r.id).collect::<Vec<_>>();

    let other = ids(h.service.list(&fixtures::citizen("u2")).await.unwrap());
    assert_eq!(other, [anonymous.id.clone(), public.id.clone()]);

    let owner = ids(h.service.list(&fixtures::citizen("u1")).await.unwrap());
    assert_eq!(
        owner,
        [anonymous.id.clone(), private.id.clone(), public.id.clone()]
    );

    let staff = ids(h.service.list(&fixtures::staff("s1")).await.unwrap());
    assert_eq!(staff.len(), 3);
}

#[tokio::test]
async fn owner_listing_and_profile_counts() {
    let h = harness();
    let first = h.service.create(&u1(), fixtures::pothole()).await.unwrap();
    h.service
        .create(&u1(), fixtures::request_with_visibility("PRIVATE"))
        .await
        .unwrap();
    h.service
        .create(&UserId::from("u2"), fixtures::pothole())
        .await
        .unwrap();
    h.service
        .update_status(&first.id, ReportStatus::Resolved)
        .await
        .unwrap();

    let mine = h.service.list_by_owner(&u1()).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().any(|r| r.visibility == Visibility::Private));

    let counts = h.service.profile_counts(&u1()).await.unwrap();
    assert_eq!(counts.open_reports, 1);
    assert_eq!(counts.resolved_reports, 1);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_valid_request_creates_an_open_report(request in properties::create_request()) {
        tokio_test::block_on(async {
            let h = harness();
            let report = h.service.create(&u1(), request.clone()).await.unwrap();

            prop_assert_eq!(report.status, ReportStatus::Open);
            prop_assert_eq!(report.updates.len(), 3);
            prop_assert_eq!(report.title, request.title);
            prop_assert_eq!(report.category.as_str(), request.category.as_str());
            Ok(())
        })?;
    }
}
