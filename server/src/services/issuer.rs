use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::delivery::{deliver_best_effort, DeliveryError, TicketEnvelope, TicketMailer};
use super::feed::{ChangeKind, RegistrationFeed};
use crate::models::{Registration, RegistrationRequest, TicketId, TicketStatus};
use crate::store::{bounded, CatalogStore, RegistrationStore, StoreError};

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("registration form is invalid")]
    Validation(#[from] ValidationErrors),

    #[error("already registered for this event")]
    DuplicateRegistration,

    #[error("event '{0}' not found")]
    EventNotFound(String),

    #[error("batch '{0}' not found")]
    BatchNotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RedeliverError {
    #[error("ticket '{0}' not found")]
    TicketNotFound(String),

    #[error("event '{0}' not found")]
    EventNotFound(Uuid),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Turns a registration form into exactly one stored, unused ticket.
///
/// The duplicate check and the insert are separate store calls. Two truly
/// concurrent submissions for the same email and event can both pass the check
/// and both be stored.
pub struct RegistrationIssuer {
    catalog: Arc<dyn CatalogStore>,
    registrations: Arc<dyn RegistrationStore>,
    mailer: Arc<dyn TicketMailer>,
    feed: RegistrationFeed,
    app_url: String,
    store_timeout: Duration,
}

impl RegistrationIssuer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        registrations: Arc<dyn RegistrationStore>,
        mailer: Arc<dyn TicketMailer>,
        feed: RegistrationFeed,
        app_url: impl Into<String>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            registrations,
            mailer,
            feed,
            app_url: app_url.into(),
            store_timeout,
        }
    }

    #[instrument(skip(self, request), fields(event_id = %request.event_id, batch_id = %request.batch_id))]
    pub async fn issue(&self, request: RegistrationRequest) -> Result<Registration, IssueError> {
        let request = request.normalized();
        request.validate()?;

        let event_id = Uuid::parse_str(&request.event_id)
            .map_err(|_| IssueError::EventNotFound(request.event_id.clone()))?;
        let batch_id = Uuid::parse_str(&request.batch_id)
            .map_err(|_| IssueError::BatchNotFound(request.batch_id.clone()))?;

        // Inactive events and batches are closed for registration.
        let event = bounded(self.store_timeout, self.catalog.get_event(event_id))
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| IssueError::EventNotFound(request.event_id.clone()))?;
        let batch = bounded(self.store_timeout, self.catalog.get_batch(batch_id))
            .await?
            .filter(|b| b.event_id == event.id && b.is_active)
            .ok_or_else(|| IssueError::BatchNotFound(request.batch_id.clone()))?;

        let duplicate = bounded(
            self.store_timeout,
            self.registrations
                .registration_exists(&request.email, event.id),
        )
        .await?;
        if duplicate {
            info!(event_id = %event.id, "Duplicate registration rejected");
            return Err(IssueError::DuplicateRegistration);
        }

        let registration = Registration {
            id: Uuid::new_v4(),
            ticket_id: TicketId::generate(),
            event_id: event.id,
            batch_id: batch.id,
            full_name: request.full_name,
            email: request.email,
            phone: request.phone,
            message: request.message,
            status: TicketStatus::Unused,
            used_at: None,
            created_at: Utc::now(),
        };
        bounded(
            self.store_timeout,
            self.registrations.insert_registration(&registration),
        )
        .await?;

        info!(ticket_id = %registration.ticket_id, event_id = %event.id, "Ticket issued");
        self.feed.publish(ChangeKind::Issued, registration.clone());

        tokio::spawn(deliver_best_effort(
            Arc::clone(&self.mailer),
            registration.clone(),
            event,
            Some(batch),
            self.app_url.clone(),
        ));

        Ok(registration)
    }

    /// Sends the ticket email again, reporting delivery failures to the caller.
    /// The registration itself is never modified.
    #[instrument(skip(self), fields(ticket_id = %ticket_id))]
    pub async fn redeliver(&self, ticket_id: &TicketId) -> Result<Registration, RedeliverError> {
        let registration = bounded(
            self.store_timeout,
            self.registrations.find_by_ticket_id(ticket_id),
        )
        .await?
        .ok_or_else(|| RedeliverError::TicketNotFound(ticket_id.to_string()))?;

        let event = bounded(self.store_timeout, self.catalog.get_event(registration.event_id))
            .await?
            .ok_or(RedeliverError::EventNotFound(registration.event_id))?;
        let batch = bounded(self.store_timeout, self.catalog.get_batch(registration.batch_id)).await?;

        let envelope = TicketEnvelope::build(registration, event, batch, &self.app_url)?;
        self.mailer.send_ticket(&envelope).await?;
        Ok(envelope.registration)
    }
}
