use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::registration::{Registration, TicketStatus};

/// Admin roster filter: free-text search plus an optional batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterQuery {
    pub search: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub batch_id: Option<Uuid>,
}

/// `batch_id=` (as sent by an unset filter dropdown) means no batch filter.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl RosterQuery {
    /// Name and email match case-insensitively; phone and ticket id match as typed.
    pub fn matches(&self, registration: &Registration) -> bool {
        let matches_batch = self
            .batch_id
            .map_or(true, |batch_id| registration.batch_id == batch_id);

        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let lowered = term.to_lowercase();
                registration.full_name.to_lowercase().contains(&lowered)
                    || registration.email.to_lowercase().contains(&lowered)
                    || registration.phone.contains(term)
                    || registration.ticket_id.as_str().contains(term)
            }
        };

        matches_batch && matches_search
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total: usize,
    pub used: usize,
    pub unused: usize,
    /// The event's informational ticket count; not a cap.
    pub capacity: i32,
}

impl RosterStats {
    pub fn tally(registrations: &[Registration], capacity: i32) -> Self {
        let used = registrations
            .iter()
            .filter(|r| r.status == TicketStatus::Used)
            .count();
        Self {
            total: registrations.len(),
            used,
            unused: registrations.len() - used,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketId;
    use chrono::Utc;

    fn registration(name: &str, email: &str, batch_id: Uuid) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            ticket_id: TicketId::from(format!("TKT-1-{}", name.to_uppercase())),
            event_id: Uuid::new_v4(),
            batch_id,
            full_name: name.to_string(),
            email: email.to_string(),
            phone: "+14155550100".to_string(),
            message: None,
            status: TicketStatus::Unused,
            used_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_search_is_case_insensitive_on_name_and_email() {
        let batch = Uuid::new_v4();
        let reg = registration("Alice", "alice@example.com", batch);

        let by_name = RosterQuery {
            search: Some("ALI".to_string()),
            batch_id: None,
        };
        let by_phone = RosterQuery {
            search: Some("555".to_string()),
            batch_id: None,
        };
        let miss = RosterQuery {
            search: Some("bob".to_string()),
            batch_id: None,
        };

        assert!(by_name.matches(&reg));
        assert!(by_phone.matches(&reg));
        assert!(!miss.matches(&reg));
        assert!(RosterQuery::default().matches(&reg));
    }

    #[test]
    fn test_batch_filter() {
        let batch = Uuid::new_v4();
        let reg = registration("Alice", "alice@example.com", batch);

        let same = RosterQuery {
            search: None,
            batch_id: Some(batch),
        };
        let other = RosterQuery {
            search: None,
            batch_id: Some(Uuid::new_v4()),
        };

        assert!(same.matches(&reg));
        assert!(!other.matches(&reg));
    }

    #[test]
    fn test_blank_batch_param_means_no_filter() {
        let query: RosterQuery =
            serde_json::from_value(serde_json::json!({ "search": "", "batch_id": "" })).unwrap();
        assert_eq!(query.batch_id, None);
        assert!(query.matches(&registration("Alice", "alice@example.com", Uuid::new_v4())));

        let batch = Uuid::new_v4();
        let query: RosterQuery =
            serde_json::from_value(serde_json::json!({ "batch_id": format!(" {batch} ") }))
                .unwrap();
        assert_eq!(query.batch_id, Some(batch));

        let bad = serde_json::from_value::<RosterQuery>(serde_json::json!({ "batch_id": "x" }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_tally() {
        let batch = Uuid::new_v4();
        let mut used = registration("Alice", "alice@example.com", batch);
        used.mark_used(Utc::now());
        let unused = registration("Bob", "bob@example.com", batch);

        let stats = RosterStats::tally(&[used, unused], 100);
        assert_eq!(
            stats,
            RosterStats {
                total: 2,
                used: 1,
                unused: 1,
                capacity: 100
            }
        );
    }
}
