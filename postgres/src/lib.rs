//! `PostgreSQL` report repository for Reportdesk.
//!
//! Implements [`ReportRepository`](reportdesk_core::ReportRepository) on top
//! of a `sqlx` connection pool:
//!
//! - reports and their three milestones inserted in one transaction
//! - listing newest first with owner, status and visibility filters
//! - per-year identifier counters in `report_sequences`
//! - embedded migrations (`migrations/`)
//!
//! # Example
//!
//! ```no_run
//! use reportdesk_postgres::PostgresReportRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = PostgresReportRepository::connect("postgres://localhost/reports").await?;
//! repository.run_migrations().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod report_store;

pub use report_store::PostgresReportRepository;
