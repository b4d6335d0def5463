//! # Reportdesk Service
//!
//! The deployable server: environment configuration, collaborator wiring and
//! process lifecycle around the `reportdesk-*` library crates.
//!
//! ```text
//! Config::from_env ─▶ Application::build ─▶ Application::run
//!                      ├─ PostgresReportRepository (migrations)
//!                      ├─ RedpandaEventBus ─▶ EventEmitter
//!                      ├─ ReportService
//!                      └─ reportdesk_web::router
//! ```

pub mod app;
pub mod config;

pub use app::Application;
pub use config::{Config, ConfigError};
