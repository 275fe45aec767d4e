use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A named sub-allocation of an event, e.g. "Morning session".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_tickets: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    #[validate(length(min = 1, message = "Batch name is required"))]
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "Ticket count cannot be negative"))]
    pub max_tickets: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchPatch {
    #[validate(length(min = 1, message = "Batch name is required"))]
    pub name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "Ticket count cannot be negative"))]
    pub max_tickets: Option<i32>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

/// `true` unless both bounds are present and the window ends before it starts.
pub fn window_is_ordered(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => start <= end,
        _ => true,
    }
}

impl Batch {
    pub fn create(event_id: Uuid, new: NewBatch, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: new.name,
            start_date: new.start_date,
            end_date: new.end_date,
            max_tickets: new.max_tickets,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: BatchPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if patch.start_date.is_some() {
            self.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            self.end_date = patch.end_date;
        }
        if let Some(max_tickets) = patch.max_tickets {
            self.max_tickets = max_tickets;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        self.updated_at = now;
    }
}
