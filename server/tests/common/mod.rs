#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ticketlelo_server::config::Config;
use ticketlelo_server::models::{
    Batch, Event, NewBatch, NewEvent, Registration, RegistrationRequest, TicketId,
};
use ticketlelo_server::services::{DeliveryError, TicketEnvelope, TicketMailer};
use ticketlelo_server::state::AppState;
use ticketlelo_server::store::{
    CatalogStore, MarkUsed, MemoryStore, RegistrationStore, StoreResult,
};

/// Counts sends and optionally fails every one of them.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: AtomicUsize,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketMailer for RecordingMailer {
    async fn send_ticket(&self, _envelope: &TicketEnvelope) -> Result<(), DeliveryError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(DeliveryError::Transport("relay refused connection".to_string()))
        } else {
            Ok(())
        }
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: AppState,
    pub event: Event,
    pub batch: Batch,
}

pub fn test_config() -> Config {
    Config {
        store_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(RecordingMailer::default(), test_config()).await
}

pub async fn fixture_with(mailer: RecordingMailer, config: Config) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(mailer);
    let state = AppState::new(Arc::clone(&store), mailer.clone(), &config);

    let event = store
        .create_event(NewEvent {
            name: "RustConf Lagos".to_string(),
            description: None,
            date: Utc::now(),
            location: "Landmark Centre".to_string(),
            total_tickets: 2,
            is_active: true,
        })
        .await
        .unwrap();
    let batch = store
        .create_batch(
            event.id,
            NewBatch {
                name: "Early bird".to_string(),
                start_date: None,
                end_date: None,
                max_tickets: 2,
                is_active: true,
            },
        )
        .await
        .unwrap();

    Fixture {
        store,
        mailer,
        state,
        event,
        batch,
    }
}

pub fn request(fixture: &Fixture, name: &str, email: &str) -> RegistrationRequest {
    RegistrationRequest {
        full_name: name.to_string(),
        email: email.to_string(),
        phone: "+2348012345678".to_string(),
        event_id: fixture.event.id.to_string(),
        batch_id: fixture.batch.id.to_string(),
        message: None,
    }
}

/// Registration store that counts every call before delegating.
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Every call, reads included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that can change stored state.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistrationStore for CountingStore {
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        self.write();
        self.inner.insert_registration(registration).await
    }

    async fn registration_exists(&self, email: &str, event_id: Uuid) -> StoreResult<bool> {
        self.read();
        self.inner.registration_exists(email, event_id).await
    }

    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> StoreResult<Option<Registration>> {
        self.read();
        self.inner.find_by_ticket_id(ticket_id).await
    }

    async fn list_by_event(&self, event_id: Uuid) -> StoreResult<Vec<Registration>> {
        self.read();
        self.inner.list_by_event(event_id).await
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Registration>> {
        self.read();
        self.inner.list_by_email(email).await
    }

    async fn mark_used(&self, ticket_id: &TicketId, at: DateTime<Utc>) -> StoreResult<MarkUsed> {
        self.write();
        self.inner.mark_used(ticket_id, at).await
    }

    async fn delete_registration(&self, ticket_id: &TicketId) -> StoreResult<bool> {
        self.write();
        self.inner.delete_registration(ticket_id).await
    }
}
