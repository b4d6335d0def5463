//! `sqlx` implementation of the report repository.

use chrono::{DateTime, Utc};
use reportdesk_core::repository::RepositoryFuture;
use reportdesk_core::{
    Report, ReportError, ReportId, ReportQuery, ReportRepository, ReportUpdate, RepositoryError,
    UserId, Visibility, VisibilityScope,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

const REPORT_COLUMNS: &str = "id, title, description, category, status, visibility, \
     image_url, user_id, created_at, updated_at";

/// `PostgreSQL` report repository.
///
/// Cloning shares the underlying pool.
#[derive(Clone, Debug)]
pub struct PostgresReportRepository {
    pool: PgPool,
}

impl PostgresReportRepository {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Report store migrations applied");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(report_id = %report.id))]
    async fn insert(
        &self,
        report: &Report,
        updates: &[ReportUpdate; 3],
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("insert", &e))?;

        sqlx::query(
            r"
            INSERT INTO reports (
                id, title, description, category, status, visibility,
                image_url, user_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(report.id.as_str())
        .bind(&report.title)
        .bind(&report.description)
        .bind(report.category.as_str())
        .bind(report.status.as_str())
        .bind(report.visibility.as_str())
        .bind(report.image_url.as_deref())
        .bind(report.user_id.as_str())
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return RepositoryError::Duplicate(report.id.clone());
                }
            }
            database_error("insert", &e)
        })?;

        for (position, update) in (0_i16..).zip(updates) {
            sqlx::query(
                r"
                INSERT INTO report_updates (
                    id, report_id, position, title, date, is_active, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(update.id)
            .bind(update.report_id.as_str())
            .bind(position)
            .bind(&update.title)
            .bind(&update.date)
            .bind(update.is_active)
            .bind(update.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| database_error("insert", &e))?;
        }

        tx.commit().await.map_err(|e| database_error("insert", &e))?;

        tracing::debug!("Report and milestones inserted");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(report_id = %id))]
    async fn find(&self, id: &ReportId) -> Result<Report, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("find", &e))?
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;

        let mut report = report_from_row(&row)?;
        let mut updates = self.load_updates(&[report.id.as_str().to_string()]).await?;
        report.updates = updates.remove(report.id.as_str()).unwrap_or_default();
        Ok(report)
    }

    #[tracing::instrument(skip_all)]
    async fn list(&self, query: &ReportQuery) -> Result<Vec<Report>, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE TRUE"
        ));
        push_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC, row_seq DESC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("list", &e))?;

        let mut reports = rows
            .iter()
            .map(report_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<String> = reports.iter().map(|r| r.id.as_str().to_string()).collect();
        let mut updates = self.load_updates(&ids).await?;
        for report in &mut reports {
            report.updates = updates.remove(report.id.as_str()).unwrap_or_default();
        }

        tracing::debug!(count = reports.len(), "Reports listed");
        Ok(reports)
    }

    #[tracing::instrument(skip_all, fields(report_id = %report.id, status = %report.status))]
    async fn save(&self, report: &Report) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE reports SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(report.status.as_str())
            .bind(report.updated_at)
            .bind(report.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("save", &e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(report.id.clone()));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn count(&self, query: &ReportQuery) -> Result<u64, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM reports WHERE TRUE");
        push_filters(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| database_error("count", &e))?;

        u64::try_from(count).map_err(|_| RepositoryError::Corrupt(format!("negative count {count}")))
    }

    /// Allocate the next sequence number for `year`.
    ///
    /// The first allocation of a year seeds the counter from the number of
    /// stored reports whose id carries that year. Concurrent first allocations
    /// serialize on the primary key.
    #[tracing::instrument(skip(self))]
    async fn allocate(&self, year: i32) -> Result<u64, RepositoryError> {
        let value: i64 = sqlx::query_scalar(
            r"
            INSERT INTO report_sequences (year, last_value)
            VALUES ($1, (SELECT COUNT(*) FROM reports WHERE id LIKE $2) + 1)
            ON CONFLICT (year)
            DO UPDATE SET last_value = report_sequences.last_value + 1
            RETURNING last_value
            ",
        )
        .bind(year)
        .bind(ReportId::year_pattern(year))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("next_sequence", &e))?;

        u64::try_from(value)
            .map_err(|_| RepositoryError::Corrupt(format!("negative sequence {value} for {year}")))
    }

    async fn load_updates(
        &self,
        report_ids: &[String],
    ) -> Result<HashMap<String, Vec<ReportUpdate>>, RepositoryError> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r"
            SELECT id, report_id, title, date, is_active, created_at
            FROM report_updates
            WHERE report_id = ANY($1)
            ORDER BY report_id, position
            ",
        )
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("load_updates", &e))?;

        let mut grouped: HashMap<String, Vec<ReportUpdate>> = HashMap::new();
        for row in &rows {
            let update = update_from_row(row)?;
            grouped
                .entry(update.report_id.as_str().to_string())
                .or_default()
                .push(update);
        }
        Ok(grouped)
    }
}

impl ReportRepository for PostgresReportRepository {
    fn insert_report_with_updates<'a>(
        &'a self,
        report: &'a Report,
        updates: &'a [ReportUpdate; 3],
    ) -> RepositoryFuture<'a, ()> {
        Box::pin(self.insert(report, updates))
    }

    fn find_report<'a>(&'a self, id: &'a ReportId) -> RepositoryFuture<'a, Report> {
        Box::pin(self.find(id))
    }

    fn list_reports<'a>(&'a self, query: &'a ReportQuery) -> RepositoryFuture<'a, Vec<Report>> {
        Box::pin(self.list(query))
    }

    fn save_report<'a>(&'a self, report: &'a Report) -> RepositoryFuture<'a, ()> {
        Box::pin(self.save(report))
    }

    fn count_reports<'a>(&'a self, query: &'a ReportQuery) -> RepositoryFuture<'a, u64> {
        Box::pin(self.count(query))
    }

    fn next_sequence(&self, year: i32) -> RepositoryFuture<'_, u64> {
        Box::pin(self.allocate(year))
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ReportQuery) {
    if let Some(owner) = &query.owner {
        builder.push(" AND user_id = ");
        builder.push_bind(owner.as_str().to_string());
    }

    if !query.statuses.is_empty() {
        let statuses: Vec<String> = query
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        builder.push(" AND status = ANY(");
        builder.push_bind(statuses);
        builder.push(")");
    }

    if let VisibilityScope::PublicOrOwnedBy(user) = &query.scope {
        builder.push(" AND (visibility <> ");
        builder.push_bind(Visibility::Private.as_str());
        builder.push(" OR user_id = ");
        builder.push_bind(user.as_str().to_string());
        builder.push(")");
    }
}

fn report_from_row(row: &PgRow) -> Result<Report, RepositoryError> {
    let id: String = row.try_get("id").map_err(corrupt)?;
    let user_id: String = row.try_get("user_id").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(corrupt)?;

    Ok(Report {
        id: ReportId::from(id),
        title: row.try_get("title").map_err(corrupt)?,
        description: row.try_get("description").map_err(corrupt)?,
        category: parse_column(row, "category")?,
        status: parse_column(row, "status")?,
        visibility: parse_column(row, "visibility")?,
        image_url: row.try_get("image_url").map_err(corrupt)?,
        user_id: UserId::from(user_id),
        created_at,
        updated_at,
        updates: Vec::new(),
    })
}

fn update_from_row(row: &PgRow) -> Result<ReportUpdate, RepositoryError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let report_id: String = row.try_get("report_id").map_err(corrupt)?;

    Ok(ReportUpdate {
        id,
        report_id: ReportId::from(report_id),
        title: row.try_get("title").map_err(corrupt)?,
        date: row.try_get("date").map_err(corrupt)?,
        is_active: row.try_get("is_active").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
    })
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, RepositoryError>
where
    T: FromStr<Err = ReportError>,
{
    let raw: String = row.try_get(column).map_err(corrupt)?;
    raw.parse()
        .map_err(|e: ReportError| RepositoryError::Corrupt(format!("{column}: {e}")))
}

#[allow(clippy::needless_pass_by_value)] // used as a map_err adapter
fn corrupt(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Corrupt(error.to_string())
}

fn database_error(operation: &'static str, error: &sqlx::Error) -> RepositoryError {
    metrics::counter!("report_store_errors_total", "operation" => operation).increment(1);
    tracing::error!(operation, error = %error, "Report store query failed");
    RepositoryError::Database(format!("{operation}: {error}"))
}
