//! Integration tests for [`RedpandaEventBus`] with a real Kafka instance.
//!
//! Marked `#[ignore]`: they need Docker and take 15-60 seconds to start Kafka.
//!
//! ```bash
//! cargo test -p reportdesk-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chrono::Utc;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use reportdesk_core::{
    DomainEvent, EventBus, EventTopics, Report, ReportCategory, ReportId, ReportStatus,
    SerializedEvent, UserId, Visibility,
};
use reportdesk_redpanda::{EVENT_TYPE_HEADER, RedpandaEventBus};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

fn created_event() -> SerializedEvent {
    let now = Utc::now();
    let report = Report {
        id: ReportId::from_sequence(2025, 1),
        title: "Pothole".to_string(),
        description: "Large pothole".to_string(),
        category: ReportCategory::Sanitation,
        status: ReportStatus::Open,
        visibility: Visibility::Public,
        image_url: None,
        user_id: UserId::from("u1"),
        created_at: now,
        updated_at: now,
        updates: Vec::new(),
    };
    SerializedEvent::from_event(&DomainEvent::created(&report, now), &EventTopics::default())
        .expect("serialize")
}

async fn start_kafka() -> (testcontainers::ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .start()
        .await
        .expect("Failed to start Kafka container");
    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

async fn provisioned_bus(brokers: &str) -> RedpandaEventBus {
    let bus = RedpandaEventBus::builder()
        .brokers(brokers)
        .build()
        .expect("Failed to create event bus");

    let specs = EventTopics::default().specs(3, 1);
    for attempt in 1..=60 {
        if bus.ensure_topics(&specs).await.is_ok() {
            return bus;
        }
        assert!(attempt != 60, "Kafka failed to become ready");
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    bus
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ensure_topics_is_idempotent() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = provisioned_bus(&brokers).await;

    bus.ensure_topics(&EventTopics::default().specs(3, 1))
        .await
        .expect("existing topics count as success");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn published_event_is_keyed_by_report_id() {
    let (_kafka, brokers) = start_kafka().await;
    let bus = provisioned_bus(&brokers).await;

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", "reportdesk-test")
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("Failed to create consumer");
    consumer
        .subscribe(&["reports.created"])
        .expect("Failed to subscribe");

    let event = created_event();
    bus.publish(&event).await.expect("Failed to publish");

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        let mut stream = consumer.stream();
        loop {
            match stream.next().await {
                Some(Ok(message)) => break message.detach(),
                Some(Err(e)) => panic!("consumer error: {e}"),
                None => panic!("consumer stream ended"),
            }
        }
    })
    .await
    .expect("Timed out waiting for event");

    assert_eq!(received.key(), Some(b"R-2025-001".as_slice()));

    let header = received
        .headers()
        .and_then(|headers| headers.iter().find(|h| h.key == EVENT_TYPE_HEADER))
        .and_then(|h| h.value)
        .expect("event_type header");
    assert_eq!(header, b"reports.created");

    let body: serde_json::Value =
        serde_json::from_slice(received.payload().expect("payload")).expect("json payload");
    assert_eq!(body["event_type"], "reports.created");
    assert_eq!(body["report_id"], "R-2025-001");
    assert_eq!(body["status"], "OPEN");
}
