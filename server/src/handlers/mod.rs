use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::TicketId;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod admin;
pub mod events;
pub mod registrations;
pub mod tickets;

/// Set by the upstream identity layer to the signed-in account's email.
pub const ACCOUNT_EMAIL_HEADER: &str = "x-account-email";

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketlelo-api",
    };

    success(payload, "Health check successful").into_response()
}

pub(crate) fn validated<T: Validate>(value: T) -> Result<T, AppError> {
    value.validate().map_err(AppError::FieldErrors)?;
    Ok(value)
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::NotFound(format!("{what} with id '{raw}' was not found")))
}

pub(crate) fn parse_ticket_id(raw: &str) -> Result<TicketId, AppError> {
    TicketId::parse_scan(Some(raw))
        .ok_or_else(|| AppError::ValidationError("Ticket ID is required".to_string()))
}
