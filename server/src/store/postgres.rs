use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CatalogStore, MarkUsed, RegistrationStore, StoreError, StoreResult};
use crate::models::{
    Batch, BatchPatch, Event, EventPatch, NewBatch, NewEvent, Registration, TicketId,
    TicketStatus,
};

const REGISTRATION_COLUMNS: &str = "id, ticket_id, event_id, batch_id, full_name, email, phone, \
     message, status, used_at, created_at";

/// PostgreSQL-backed store; schema lives in `server/migrations`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw `registrations` row. `status` stays a string until it has been checked.
#[derive(Debug, FromRow)]
struct RegistrationRow {
    id: Uuid,
    ticket_id: String,
    event_id: Uuid,
    batch_id: Uuid,
    full_name: String,
    email: String,
    phone: String,
    message: Option<String>,
    status: String,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = StoreError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let status: TicketStatus = row.status.parse().map_err(|e: crate::models::UnknownStatus| {
            StoreError::CorruptRecord {
                id: row.ticket_id.clone(),
                reason: e.to_string(),
            }
        })?;

        let registration = Registration {
            id: row.id,
            ticket_id: TicketId::from(row.ticket_id),
            event_id: row.event_id,
            batch_id: row.batch_id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            message: row.message,
            status,
            used_at: row.used_at,
            created_at: row.created_at,
        };

        if !registration.is_consistent() {
            return Err(StoreError::CorruptRecord {
                id: registration.ticket_id.to_string(),
                reason: "status and used_at disagree".to_string(),
            });
        }
        Ok(registration)
    }
}

fn into_registrations(rows: Vec<RegistrationRow>) -> StoreResult<Vec<Registration>> {
    rows.into_iter().map(Registration::try_from).collect()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        let event = Event::create(new, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO events
                (id, name, description, date, location, total_tickets, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.total_tickets)
        .bind(event.is_active)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events(&self, active_only: bool) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE ($1 = FALSE OR is_active) ORDER BY date",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn update_event(&self, id: Uuid, patch: EventPatch) -> StoreResult<Option<Event>> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut event) = current else {
            return Ok(None);
        };

        event.apply(patch, Utc::now());
        sqlx::query(
            r#"
            UPDATE events
            SET name = $2, description = $3, date = $4, location = $5,
                total_tickets = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.total_tickets)
        .bind(event.is_active)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(event))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_batch(&self, event_id: Uuid, new: NewBatch) -> StoreResult<Batch> {
        let batch = Batch::create(event_id, new, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO batches
                (id, event_id, name, start_date, end_date, max_tickets, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(batch.id)
        .bind(batch.event_id)
        .bind(&batch.name)
        .bind(batch.start_date)
        .bind(batch.end_date)
        .bind(batch.max_tickets)
        .bind(batch.is_active)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(batch)
    }

    async fn get_batch(&self, id: Uuid) -> StoreResult<Option<Batch>> {
        let batch = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(batch)
    }

    async fn list_batches(&self, event_id: Uuid) -> StoreResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(
            "SELECT * FROM batches WHERE event_id = $1 ORDER BY created_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    async fn update_batch(&self, id: Uuid, patch: BatchPatch) -> StoreResult<Option<Batch>> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut batch) = current else {
            return Ok(None);
        };

        batch.apply(patch, Utc::now());
        sqlx::query(
            r#"
            UPDATE batches
            SET name = $2, start_date = $3, end_date = $4, max_tickets = $5,
                is_active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(batch.id)
        .bind(&batch.name)
        .bind(batch.start_date)
        .bind(batch.end_date)
        .bind(batch.max_tickets)
        .bind(batch.is_active)
        .bind(batch.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(batch))
    }

    async fn delete_batch(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO registrations
                (id, ticket_id, event_id, batch_id, full_name, email, phone, message,
                 status, used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(registration.id)
        .bind(registration.ticket_id.as_str())
        .bind(registration.event_id)
        .bind(registration.batch_id)
        .bind(&registration.full_name)
        .bind(&registration.email)
        .bind(&registration.phone)
        .bind(&registration.message)
        .bind(registration.status.as_str())
        .bind(registration.used_at)
        .bind(registration.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn registration_exists(&self, email: &str, event_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM registrations WHERE email = $1 AND event_id = $2)",
        )
        .bind(email)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> StoreResult<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE ticket_id = $1"
        ))
        .bind(ticket_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Registration::try_from).transpose()
    }

    async fn list_by_event(&self, event_id: Uuid) -> StoreResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = $1 ORDER BY created_at"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        into_registrations(rows)
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE email = $1 ORDER BY created_at"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        into_registrations(rows)
    }

    async fn mark_used(&self, ticket_id: &TicketId, at: DateTime<Utc>) -> StoreResult<MarkUsed> {
        // The status guard in the WHERE clause is the whole concurrency story:
        // of any number of racing statements only one can match the 'Unused' row.
        let redeemed = sqlx::query_as::<_, RegistrationRow>(&format!(
            r#"
            UPDATE registrations
            SET status = 'Used', used_at = $2
            WHERE ticket_id = $1 AND status = 'Unused'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(ticket_id.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = redeemed {
            return Ok(MarkUsed::Redeemed(row.try_into()?));
        }

        match self.find_by_ticket_id(ticket_id).await? {
            Some(existing) if existing.is_used() => Ok(MarkUsed::AlreadyUsed(existing)),
            Some(existing) => Err(StoreError::Unavailable(format!(
                "ticket {} changed during redemption",
                existing.ticket_id
            ))),
            None => Ok(MarkUsed::Missing),
        }
    }

    async fn delete_registration(&self, ticket_id: &TicketId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM registrations WHERE ticket_id = $1")
            .bind(ticket_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
