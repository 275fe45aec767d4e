use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CatalogStore, MarkUsed, RegistrationStore, StoreError, StoreResult};
use crate::models::{
    Batch, BatchPatch, Event, EventPatch, NewBatch, NewEvent, Registration, TicketId,
};

#[derive(Debug, Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    batches: HashMap<Uuid, Batch>,
    registrations: HashMap<TicketId, Registration>,
}

/// In-process store. Every operation holds the single table lock for its whole
/// duration, which is what makes [`RegistrationStore::mark_used`] atomic here.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_event(&self, new: NewEvent) -> StoreResult<Event> {
        let event = Event::create(new, Utc::now());
        self.lock()?.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.lock()?.events.get(&id).cloned())
    }

    async fn list_events(&self, active_only: bool) -> StoreResult<Vec<Event>> {
        let events = self
            .lock()?
            .events
            .values()
            .filter(|e| !active_only || e.is_active)
            .cloned()
            .collect();
        Ok(sorted_by(events, |e: &Event| e.date))
    }

    async fn update_event(&self, id: Uuid, patch: EventPatch) -> StoreResult<Option<Event>> {
        let mut tables = self.lock()?;
        Ok(tables.events.get_mut(&id).map(|event| {
            event.apply(patch, Utc::now());
            event.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let removed = tables.events.remove(&id).is_some();
        if removed {
            tables.batches.retain(|_, b| b.event_id != id);
        }
        Ok(removed)
    }

    async fn create_batch(&self, event_id: Uuid, new: NewBatch) -> StoreResult<Batch> {
        let batch = Batch::create(event_id, new, Utc::now());
        self.lock()?.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn get_batch(&self, id: Uuid) -> StoreResult<Option<Batch>> {
        Ok(self.lock()?.batches.get(&id).cloned())
    }

    async fn list_batches(&self, event_id: Uuid) -> StoreResult<Vec<Batch>> {
        let batches = self
            .lock()?
            .batches
            .values()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect();
        Ok(sorted_by(batches, |b: &Batch| b.created_at))
    }

    async fn update_batch(&self, id: Uuid, patch: BatchPatch) -> StoreResult<Option<Batch>> {
        let mut tables = self.lock()?;
        Ok(tables.batches.get_mut(&id).map(|batch| {
            batch.apply(patch, Utc::now());
            batch.clone()
        }))
    }

    async fn delete_batch(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.batches.remove(&id).is_some())
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.registrations.contains_key(&registration.ticket_id) {
            return Err(StoreError::Unavailable(format!(
                "ticket id {} already stored",
                registration.ticket_id
            )));
        }
        tables
            .registrations
            .insert(registration.ticket_id.clone(), registration.clone());
        Ok(())
    }

    async fn registration_exists(&self, email: &str, event_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .registrations
            .values()
            .any(|r| r.email == email && r.event_id == event_id))
    }

    async fn find_by_ticket_id(&self, ticket_id: &TicketId) -> StoreResult<Option<Registration>> {
        Ok(self.lock()?.registrations.get(ticket_id).cloned())
    }

    async fn list_by_event(&self, event_id: Uuid) -> StoreResult<Vec<Registration>> {
        let registrations = self
            .lock()?
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        Ok(sorted_by(registrations, |r: &Registration| r.created_at))
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Registration>> {
        let registrations = self
            .lock()?
            .registrations
            .values()
            .filter(|r| r.email == email)
            .cloned()
            .collect();
        Ok(sorted_by(registrations, |r: &Registration| r.created_at))
    }

    async fn mark_used(&self, ticket_id: &TicketId, at: DateTime<Utc>) -> StoreResult<MarkUsed> {
        let mut tables = self.lock()?;
        let Some(registration) = tables.registrations.get_mut(ticket_id) else {
            return Ok(MarkUsed::Missing);
        };
        if registration.mark_used(at) {
            Ok(MarkUsed::Redeemed(registration.clone()))
        } else {
            Ok(MarkUsed::AlreadyUsed(registration.clone()))
        }
    }

    async fn delete_registration(&self, ticket_id: &TicketId) -> StoreResult<bool> {
        Ok(self.lock()?.registrations.remove(ticket_id).is_some())
    }
}
