//! Application wiring and lifecycle.
//!
//! # Startup
//!
//! 1. Install the Prometheus recorder and bind the scrape listener
//! 2. Connect to `PostgreSQL` (with retry) and apply migrations
//! 3. Build the Redpanda producer and provision topics (best effort)
//! 4. Spawn the event emitter and assemble the [`ReportService`]
//! 5. Bind the HTTP listener
//!
//! # Graceful Shutdown
//!
//! On Ctrl+C or SIGTERM the HTTP server stops accepting connections and
//! drains in-flight requests, then the emitter queue is closed and drained
//! within `SHUTDOWN_TIMEOUT`.

use crate::config::Config;
use anyhow::Context;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use reportdesk_core::{EventBus, ReportRepository, SystemClock, TransitionPolicy, VisibilityPolicy};
use reportdesk_postgres::PostgresReportRepository;
use reportdesk_redpanda::RedpandaEventBus;
use reportdesk_runtime::metrics::MetricsServer;
use reportdesk_runtime::retry::retry_with_backoff;
use reportdesk_runtime::{EmitterConfig, EventEmitter, ReportService, RetryPolicy};
use reportdesk_web::{AppState, PublicBucketUploadIssuer, StaticTokenIdentityProvider};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// A fully wired server, ready to run.
pub struct Application {
    listener: TcpListener,
    router: Router,
    metrics: Option<(TcpListener, Router)>,
    emitter: Arc<EventEmitter>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Connect every collaborator and bind the listeners.
    ///
    /// # Errors
    ///
    /// Fails when the database stays unreachable after retries, a migration
    /// fails, the producer cannot be configured, the identity table is
    /// malformed, or a listener cannot be bound. Topic provisioning failures
    /// are only logged.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let metrics = start_metrics(&config).await;

        let repository = connect_repository(&config).await?;

        let bus = RedpandaEventBus::builder()
            .brokers(config.redpanda.brokers.clone())
            .producer_acks(config.redpanda.producer_acks.clone())
            .timeout(config.redpanda.emit_timeout())
            .client_id("reportdesk")
            .build()
            .context("Failed to create event bus")?;

        let topics = config.redpanda.topics();
        if let Err(e) = bus
            .ensure_topics(&topics.specs(
                config.redpanda.partitions,
                config.redpanda.replication_factor,
            ))
            .await
        {
            warn!(error = %e, "Topic provisioning failed; relying on broker auto-creation");
        }

        let emitter = Arc::new(EventEmitter::spawn(
            Arc::new(bus),
            emitter_config(&config),
        ));

        let service = report_service(&config, Arc::new(repository), emitter.clone());
        let router = reportdesk_web::router(app_state(&config, service)?);

        let address = config.server.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;

        Ok(Self {
            listener,
            router,
            metrics,
            emitter,
            shutdown_timeout: config.server.shutdown_timeout(),
        })
    }

    /// Serve until a shutdown signal, then drain the emitter.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(address = %addr, "HTTP server listening");
        }

        if let Some((listener, router)) = self.metrics {
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    warn!(error = %e, "Metrics server stopped");
                }
            });
        }

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")?;

        info!("HTTP server stopped, draining event emitter...");
        if let Err(e) = self.emitter.shutdown(self.shutdown_timeout).await {
            warn!(error = %e, "Event emitter did not drain cleanly");
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Install the recorder and bind `/metrics`. Metrics are optional: failures
/// are logged and the server starts without them.
async fn start_metrics(config: &Config) -> Option<(TcpListener, Router)> {
    let mut server = MetricsServer::new(config.server.metrics_addr());
    if let Err(e) = server.start() {
        warn!(error = %e, "Metrics disabled");
        return None;
    }

    match TcpListener::bind(server.addr()).await {
        Ok(listener) => {
            info!(address = %server.addr(), "Metrics endpoint listening");
            Some((listener, metrics_router(Arc::new(server))))
        }
        Err(e) => {
            warn!(address = %server.addr(), error = %e, "Metrics listener could not bind");
            None
        }
    }
}

/// Router exposing `GET /metrics` in Prometheus text format.
pub fn metrics_router(server: Arc<MetricsServer>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(server)
}

#[allow(clippy::unused_async)]
async fn render_metrics(State(server): State<Arc<MetricsServer>>) -> (StatusCode, String) {
    server.render().map_or_else(
        || (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
        |body| (StatusCode::OK, body),
    )
}

#[tracing::instrument(skip_all)]
async fn connect_repository(config: &Config) -> anyhow::Result<PostgresReportRepository> {
    let pg = &config.postgres;
    let options = PgPoolOptions::new()
        .max_connections(pg.max_connections)
        .min_connections(pg.min_connections)
        .acquire_timeout(Duration::from_secs(pg.connect_timeout));

    let policy = RetryPolicy::builder()
        .max_retries(5)
        .initial_delay(Duration::from_millis(500))
        .max_delay(Duration::from_secs(10))
        .build();

    info!("Connecting to report database...");
    let pool = retry_with_backoff(&policy, "postgres_connect", || {
        options.clone().connect(&pg.url)
    })
    .await
    .context("Failed to connect to PostgreSQL")?;

    let repository = PostgresReportRepository::from_pool(pool);
    if pg.run_migrations {
        repository
            .run_migrations()
            .await
            .context("Failed to apply migrations")?;
    }

    info!("Report database ready");
    Ok(repository)
}

/// Emitter settings from configuration.
#[must_use]
pub fn emitter_config(config: &Config) -> EmitterConfig {
    EmitterConfig::default()
        .with_queue_capacity(config.emitter.queue_capacity)
        .with_emit_timeout(config.redpanda.emit_timeout())
        .with_retry_policy(
            RetryPolicy::builder()
                .max_retries(config.emitter.max_retries)
                .build(),
        )
        .with_dead_letter_capacity(config.emitter.dead_letter_capacity)
        .with_topics(config.redpanda.topics())
}

/// The lifecycle manager with the configured policies.
#[must_use]
pub fn report_service(
    config: &Config,
    repository: Arc<dyn ReportRepository>,
    emitter: Arc<EventEmitter>,
) -> ReportService {
    let transitions: Arc<dyn TransitionPolicy> = Arc::from(config.policy.transitions.policy());
    info!(
        transitions = transitions.name(),
        staff_role = %config.policy.staff_role,
        "Report policies configured"
    );

    ReportService::new(repository, emitter, Arc::new(SystemClock))
        .with_transition_policy(transitions)
        .with_visibility_policy(VisibilityPolicy::new(config.policy.staff_role.clone()))
}

/// HTTP state: identity table, upload issuer and roles from configuration.
///
/// # Errors
///
/// Fails when `AUTH_STATIC_TOKENS` is malformed.
pub fn app_state(config: &Config, service: ReportService) -> anyhow::Result<AppState> {
    let identity = StaticTokenIdentityProvider::parse(&config.identity.static_tokens)
        .context("Invalid AUTH_STATIC_TOKENS")?;
    if identity.is_empty() {
        warn!("No identity tokens configured; every authenticated request will be rejected");
    }

    let uploads = PublicBucketUploadIssuer::new(
        config.upload.endpoint.clone(),
        config.upload.public_base_url.clone(),
        config.upload.bucket.clone(),
    );

    Ok(
        AppState::new(service, Arc::new(identity), Arc::new(uploads))
            .with_citizen_role(config.policy.citizen_role.clone()),
    )
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use reportdesk_core::TransitionMode;
    use reportdesk_testing::{InMemoryEventBus, InMemoryReportRepository};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|key| map.get(key).map(|v| (*v).to_string())).unwrap()
    }

    fn service(config: &Config) -> ReportService {
        let emitter = Arc::new(EventEmitter::spawn(
            Arc::new(InMemoryEventBus::new()),
            emitter_config(config),
        ));
        report_service(config, Arc::new(InMemoryReportRepository::new()), emitter)
    }

    #[test]
    fn emitter_config_follows_settings() {
        let config = config(&[
            ("EMITTER_QUEUE_CAPACITY", "8"),
            ("EMITTER_MAX_RETRIES", "5"),
            ("KAFKA_EMIT_TIMEOUT_MS", "750"),
            ("REPORTS_STATUS_CHANGED_TOPIC", "status"),
        ]);

        let emitter = emitter_config(&config);

        assert_eq!(emitter.queue_capacity, 8);
        assert_eq!(emitter.retry_policy.max_retries, 5);
        assert_eq!(emitter.emit_timeout, Duration::from_millis(750));
        assert_eq!(emitter.topics.status_changed, "status");
    }

    #[tokio::test]
    async fn malformed_token_table_is_rejected() {
        let config = config(&[("AUTH_STATIC_TOKENS", "no-equals-sign")]);
        assert_eq!(config.policy.transitions, TransitionMode::Permissive);

        assert!(app_state(&config, service(&config)).is_err());
    }

    #[tokio::test]
    async fn configured_roles_reach_the_router() {
        let config = config(&[
            ("AUTH_STATIC_TOKENS", "t1=u1|u1@example.com|Uma|RESIDENT;t2=s1|s1@example.com|Sam|CLERK"),
            ("CITIZEN_ROLE", "RESIDENT"),
            ("STAFF_ROLE", "CLERK"),
            ("STATUS_TRANSITIONS", "forward-only"),
        ]);
        let state = app_state(&config, service(&config)).unwrap();
        let server = TestServer::new(reportdesk_web::router(state)).unwrap();

        let created = server
            .post("/api/reports")
            .authorization_bearer("t1")
            .json(&json!({
                "title": "Broken streetlight",
                "description": "Dark since Monday",
                "category": "CRIME",
                "visibility": "PUBLIC"
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

        let path = format!("/api/reports/{id}/status");
        server
            .put(&path)
            .authorization_bearer("t2")
            .json(&json!({ "status": "RESOLVED" }))
            .await
            .assert_status_ok();
        server
            .put(&path)
            .authorization_bearer("t2")
            .json(&json!({ "status": "OPEN" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let profile = server
            .get("/api/profile")
            .authorization_bearer("t2")
            .await
            .json::<Value>();
        assert_eq!(profile["data"]["role"], json!("CLERK"));
    }

    #[tokio::test]
    async fn metrics_endpoint_without_recorder_is_unavailable() {
        let server = TestServer::new(metrics_router(Arc::new(MetricsServer::new(
            "127.0.0.1:0".parse().unwrap(),
        ))))
        .unwrap();

        server
            .get("/metrics")
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }
}
