use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use super::feed::{ChangeKind, RegistrationFeed};
use crate::models::{Registration, TicketId};
use crate::store::{bounded, MarkUsed, RegistrationStore, StoreResult};

/// Every way a scan can end. Callers must branch on all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    /// This scan redeemed the ticket.
    Valid {
        ticket_id: TicketId,
        full_name: String,
        email: String,
        used_at: DateTime<Utc>,
    },
    /// An earlier scan redeemed the ticket at `used_at`.
    AlreadyUsed {
        ticket_id: TicketId,
        full_name: String,
        used_at: DateTime<Utc>,
    },
    NotFound,
    /// Empty or missing scan payload; the store was not consulted.
    InvalidFormat,
    /// The store failed or timed out. Retrying the same scan is safe.
    SystemError { message: String },
}

impl RedemptionOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, RedemptionOutcome::Valid { .. })
    }
}

/// The only component that moves a ticket from `Unused` to `Used`.
///
/// Holds no state of its own: exactly-once redemption comes entirely from the
/// store's conditional update.
pub struct RedemptionGate {
    registrations: Arc<dyn RegistrationStore>,
    feed: RegistrationFeed,
    store_timeout: Duration,
}

impl RedemptionGate {
    pub fn new(
        registrations: Arc<dyn RegistrationStore>,
        feed: RegistrationFeed,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registrations,
            feed,
            store_timeout,
        }
    }

    #[instrument(skip(self, raw))]
    pub async fn redeem(&self, raw: Option<&str>) -> RedemptionOutcome {
        let Some(ticket_id) = TicketId::parse_scan(raw) else {
            warn!("Rejected empty scan");
            return RedemptionOutcome::InvalidFormat;
        };

        let attempt = bounded(
            self.store_timeout,
            self.registrations.mark_used(&ticket_id, Utc::now()),
        )
        .await;

        match attempt {
            Ok(MarkUsed::Redeemed(registration)) => self.admitted(registration),
            Ok(MarkUsed::AlreadyUsed(registration)) => refused(registration),
            Ok(MarkUsed::Missing) => {
                warn!(ticket_id = %ticket_id, "Scanned ticket does not exist");
                RedemptionOutcome::NotFound
            }
            Err(e) => {
                error!(ticket_id = %ticket_id, error = %e, "Redemption failed");
                RedemptionOutcome::SystemError {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Looks a ticket up without touching its status.
    pub async fn lookup(&self, raw: Option<&str>) -> StoreResult<Option<Registration>> {
        let Some(ticket_id) = TicketId::parse_scan(raw) else {
            return Ok(None);
        };
        bounded(
            self.store_timeout,
            self.registrations.find_by_ticket_id(&ticket_id),
        )
        .await
    }

    fn admitted(&self, registration: Registration) -> RedemptionOutcome {
        let Some(used_at) = registration.used_at else {
            return inconsistent(&registration);
        };
        info!(ticket_id = %registration.ticket_id, "Ticket redeemed");
        let outcome = RedemptionOutcome::Valid {
            ticket_id: registration.ticket_id.clone(),
            full_name: registration.full_name.clone(),
            email: registration.email.clone(),
            used_at,
        };
        self.feed.publish(ChangeKind::Redeemed, registration);
        outcome
    }
}

fn refused(registration: Registration) -> RedemptionOutcome {
    let Some(used_at) = registration.used_at else {
        return inconsistent(&registration);
    };
    info!(
        ticket_id = %registration.ticket_id,
        used_at = %used_at,
        "Ticket already used"
    );
    RedemptionOutcome::AlreadyUsed {
        ticket_id: registration.ticket_id,
        full_name: registration.full_name,
        used_at,
    }
}

fn inconsistent(registration: &Registration) -> RedemptionOutcome {
    error!(ticket_id = %registration.ticket_id, "Used ticket has no redemption time");
    RedemptionOutcome::SystemError {
        message: format!("ticket {} has an inconsistent record", registration.ticket_id),
    }
}
