//! PostgreSQL implementation of EventStore
//!
//! Production persistence using PostgreSQL with:
//! - Single-statement mutations, so row-level locking gives per-event atomicity
//! - `UPDATE ... WHERE notified = FALSE` as the idempotence guard for notifications
//! - Embedded, ordered migrations (`crates/core/migrations/`)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error, info, instrument};

use crate::error::{Result, StoreError};
use crate::event::{Event, MAX_NOTIFY_LEAD_SECS};
use crate::period::Period;
use crate::store::EventStore;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const EVENT_COLUMNS: &str = "id, title, start_time, end_time, owner_id, notify_lead, notified";

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    owner_id: String,
    notify_lead: i64,
    notified: bool,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            start_time: row.start_time,
            end_time: row.end_time,
            owner_id: row.owner_id,
            notify_lead: row.notify_lead,
            notified: row.notified,
        }
    }
}

/// PostgreSQL implementation of EventStore
///
/// # Example
///
/// ```ignore
/// use calendar_core::PostgresEventStore;
///
/// let store = PostgresEventStore::connect("postgres://localhost/calendar").await?;
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Wrap an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and verify the connection with a ping
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Connected to PostgreSQL event store");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations in version order
    pub async fn migrate(&self) -> Result<()> {
        for migration in MIGRATOR.iter() {
            debug!(version = migration.version, description = %migration.description, "known migration");
        }
        MIGRATOR.run(&self.pool).await.map_err(|e| {
            error!("Failed to run migrations: {}", e);
            StoreError::Database(e.to_string())
        })?;
        info!("Migrations applied");
        Ok(())
    }

    async fn fetch_events(
        &self,
        sql: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn create(&self, event: &Event) -> Result<()> {
        event.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO events (id, title, start_time, end_time, owner_id, notify_lead)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.owner_id)
        .bind(event.notify_lead)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(event.id.clone()));
        }

        debug!("created event");
        Ok(())
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn update(&self, event: &Event) -> Result<()> {
        event.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE events
            SET title = $2, start_time = $3, end_time = $4, owner_id = $5, notify_lead = $6
            WHERE id = $1
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.owner_id)
        .bind(event.notify_lead)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(event.id.clone()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Event>> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Event::from))
    }

    #[instrument(skip(self, period), fields(period = %period))]
    async fn filter_by_period(&self, period: Period) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE start_time >= $1 AND start_time < $2 \
             ORDER BY start_time, id"
        );
        self.fetch_events(&sql, period.start, period.end).await
    }

    #[instrument(skip(self, window), fields(window = %window))]
    async fn filter_by_notify_window(&self, window: Period) -> Result<Vec<Event>> {
        // Leads are bounded, so every candidate starts in [window.start, window.end + max lead)
        let latest_start = TimeDelta::try_seconds(MAX_NOTIFY_LEAD_SECS)
            .and_then(|lead| window.end.checked_add_signed(lead))
            .unwrap_or(window.end);
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE notified = FALSE \
               AND start_time >= $1 AND start_time < $3 \
               AND start_time - make_interval(secs => notify_lead::double precision) >= $1 \
               AND start_time - make_interval(secs => notify_lead::double precision) < $2 \
             ORDER BY start_time, id"
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(window.start)
            .bind(window.end)
            .bind(latest_start)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events WHERE start_time < $1")
            .bind(threshold)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn mark_notified(&self, id: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE events SET notified = TRUE WHERE id = $1 AND notified = FALSE")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing changed: either the flag was already set or the row is gone
        let notified: Option<bool> = sqlx::query_scalar("SELECT notified FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match notified {
            Some(_) => Err(StoreError::AlreadyNotified(id.to_string())),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
