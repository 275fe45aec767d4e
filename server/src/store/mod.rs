//! Storage collaborators.
//!
//! Handlers and services only see the [`CatalogStore`] and [`RegistrationStore`]
//! traits. [`PgStore`] backs them with PostgreSQL; [`MemoryStore`] keeps everything
//! in process and is used for local runs without a database and by the tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Batch, BatchPatch, Event, EventPatch, NewBatch, NewEvent, Registration, TicketId,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Runs a store call with an upper bound on its duration.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// Result of the conditional `Unused -> Used` write.
#[derive(Debug, Clone)]
pub enum MarkUsed {
    /// This call performed the transition; carries the updated record.
    Redeemed(Registration),
    /// The ticket was already used; carries the record as stored.
    AlreadyUsed(Registration),
    /// No registration has this ticket id. Nothing was written.
    Missing,
}

/// Events and their batches.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_event(&self, new: NewEvent) -> StoreResult<Event>;

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>>;

    async fn list_events(&self, active_only: bool) -> StoreResult<Vec<Event>>;

    async fn update_event(&self, id: Uuid, patch: EventPatch) -> StoreResult<Option<Event>>;

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;

    async fn create_batch(&self, event_id: Uuid, new: NewBatch) -> StoreResult<Batch>;

    async fn get_batch(&self, id: Uuid) -> StoreResult<Option<Batch>>;

    async fn list_batches(&self, event_id: Uuid) -> StoreResult<Vec<Batch>>;

    async fn update_batch(&self, id: Uuid, patch: BatchPatch) -> StoreResult<Option<Batch>>;

    async fn delete_batch(&self, id: Uuid) -> StoreResult<bool>;
}

/// Registrations (tickets).
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Plain create; no uniqueness check beyond the ticket id itself.
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()>;

    async fn registration_exists(&self, email: &str, event_id: Uuid) -> StoreResult<bool>;

    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> StoreResult<Option<Registration>>;

    async fn list_by_event(&self, event_id: Uuid) -> StoreResult<Vec<Registration>>;

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Registration>>;

    /// Atomically sets `status = Used, used_at = at` only if the stored status is
    /// still `Unused`. Implementations must not split this into a read followed
    /// by an unconditional write.
    async fn mark_used(&self, ticket_id: &TicketId, at: DateTime<Utc>) -> StoreResult<MarkUsed>;

    async fn delete_registration(&self, ticket_id: &TicketId) -> StoreResult<bool>;
}
