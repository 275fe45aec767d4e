use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// An occasion attendees can register for.
///
/// `total_tickets` is informational: it is reported next to roster counts but is
/// never enforced against the number of issued registrations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub total_tickets: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    #[validate(length(min = 1, message = "Event name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    #[validate(range(min = 0, message = "Ticket count cannot be negative"))]
    pub total_tickets: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial update for an event; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[validate(length(min = 1, message = "Event name is required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: Option<String>,
    #[validate(range(min = 0, message = "Ticket count cannot be negative"))]
    pub total_tickets: Option<i32>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl Event {
    pub fn create(new: NewEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            date: new.date,
            location: new.location,
            total_tickets: new.total_tickets,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: EventPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(total_tickets) = patch.total_tickets {
            self.total_tickets = total_tickets;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewEvent {
        NewEvent {
            name: "RustConf".to_string(),
            description: None,
            date: Utc::now(),
            location: "Hall A".to_string(),
            total_tickets: 200,
            is_active: true,
        }
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let created = Utc::now();
        let mut event = Event::create(sample(), created);
        let later = created + chrono::Duration::minutes(5);

        event.apply(
            EventPatch {
                location: Some("Hall B".to_string()),
                is_active: Some(false),
                ..Default::default()
            },
            later,
        );

        assert_eq!(event.name, "RustConf");
        assert_eq!(event.location, "Hall B");
        assert!(!event.is_active);
        assert_eq!(event.total_tickets, 200);
        assert_eq!(event.created_at, created);
        assert_eq!(event.updated_at, later);
    }

    #[test]
    fn test_negative_capacity_is_rejected() {
        let mut new = sample();
        new.total_tickets = -1;
        assert!(new.validate().is_err());
    }
}
