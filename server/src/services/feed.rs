use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::Registration;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Issued,
    Redeemed,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Issued => "issued",
            ChangeKind::Redeemed => "redeemed",
            ChangeKind::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationChange {
    pub kind: ChangeKind,
    pub registration: Registration,
}

/// In-process fan-out of registration changes for live dashboards.
///
/// Publishing never blocks and never fails the caller; a subscriber that falls
/// more than `FEED_CAPACITY` changes behind misses the oldest ones.
#[derive(Debug, Clone)]
pub struct RegistrationFeed {
    sender: broadcast::Sender<RegistrationChange>,
}

impl RegistrationFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, kind: ChangeKind, registration: Registration) {
        let ticket_id = registration.ticket_id.clone();
        // Err only means nobody is listening.
        if self
            .sender
            .send(RegistrationChange { kind, registration })
            .is_err()
        {
            debug!(ticket_id = %ticket_id, ?kind, "No feed subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationChange> {
        self.sender.subscribe()
    }
}

impl Default for RegistrationFeed {
    fn default() -> Self {
        Self::new()
    }
}
