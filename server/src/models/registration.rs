use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

const TICKET_PREFIX: &str = "TKT";
const SUFFIX_LEN: usize = 9;
const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Externally visible ticket identifier, embedded verbatim in the QR code.
///
/// Generated as `TKT-<unix millis>-<9 random base36 chars>`, so identifiers are
/// neither sequential nor guessable from one another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn generate() -> Self {
        Self::generate_at(Utc::now(), &mut rand::thread_rng())
    }

    pub fn generate_at<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!(
            "{TICKET_PREFIX}-{}-{suffix}",
            now.timestamp_millis()
        ))
    }

    /// Interprets scanned or typed text as a ticket identifier.
    ///
    /// The payload is trimmed and otherwise used verbatim. `None` and blank input
    /// yield `None`.
    pub fn parse_scan(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TicketId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Redemption state of a ticket. `Unused -> Used` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Unused,
    Used,
}

#[derive(Debug, Error)]
#[error("unknown ticket status '{0}'")]
pub struct UnknownStatus(pub String);

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Unused => "Unused",
            TicketStatus::Used => "Used",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unused" => Ok(TicketStatus::Unused),
            "Used" => Ok(TicketStatus::Used),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One attendee's ticket for one event.
///
/// Everything except `status` and `used_at` is fixed at issuance. `used_at` is
/// set if and only if `status` is [`TicketStatus::Used`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub ticket_id: TicketId,
    pub event_id: Uuid,
    pub batch_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub status: TicketStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    pub fn is_used(&self) -> bool {
        self.status == TicketStatus::Used
    }

    /// Flips an unused ticket to used. Returns `false`, leaving the record
    /// untouched, when the ticket was already used.
    pub fn mark_used(&mut self, at: DateTime<Utc>) -> bool {
        match self.status {
            TicketStatus::Unused => {
                self.status = TicketStatus::Used;
                self.used_at = Some(at);
                true
            }
            TicketStatus::Used => false,
        }
    }

    /// Checks the `status`/`used_at` pairing of a record read back from storage.
    pub fn is_consistent(&self) -> bool {
        matches!(
            (self.status, self.used_at),
            (TicketStatus::Unused, None) | (TicketStatus::Used, Some(_))
        )
    }
}

/// Attendee-supplied registration form.
///
/// Missing fields deserialize as empty strings so they are reported as
/// validation failures rather than body rejections.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRequest {
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Phone number is too short"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Please select an event"))]
    pub event_id: String,
    #[validate(length(min = 1, message = "Please select a batch"))]
    pub batch_id: String,
    pub message: Option<String>,
}

impl RegistrationRequest {
    /// Trims every field, lower-cases the email and drops a blank message.
    pub fn normalized(self) -> Self {
        let message = self
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        Self {
            full_name: self.full_name.trim().to_string(),
            email: normalize_email(&self.email),
            phone: self.phone.trim().to_string(),
            event_id: self.event_id.trim().to_string(),
            batch_id: self.batch_id.trim().to_string(),
            message,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
