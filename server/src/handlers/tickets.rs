use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::parse_ticket_id;
use crate::models::TicketId;
use crate::services::qr::ticket_qr_svg;
use crate::services::RedemptionOutcome;
use crate::state::AppState;
use crate::store::bounded;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Flat reply consumed by door scanners.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyResponse {
    Valid {
        user: String,
        email: String,
        #[serde(rename = "ticketId")]
        ticket_id: TicketId,
    },
    AlreadyUsed {
        user: String,
        #[serde(rename = "usedAt")]
        used_at: DateTime<Utc>,
    },
    NotFound,
    Invalid,
    Error {
        message: String,
    },
}

impl VerifyResponse {
    fn status_code(&self) -> StatusCode {
        match self {
            VerifyResponse::Invalid => StatusCode::BAD_REQUEST,
            VerifyResponse::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

impl From<RedemptionOutcome> for VerifyResponse {
    fn from(outcome: RedemptionOutcome) -> Self {
        match outcome {
            RedemptionOutcome::Valid {
                ticket_id,
                full_name,
                email,
                ..
            } => VerifyResponse::Valid {
                user: full_name,
                email,
                ticket_id,
            },
            RedemptionOutcome::AlreadyUsed {
                full_name, used_at, ..
            } => VerifyResponse::AlreadyUsed {
                user: full_name,
                used_at,
            },
            RedemptionOutcome::NotFound => VerifyResponse::NotFound,
            RedemptionOutcome::InvalidFormat => VerifyResponse::Invalid,
            RedemptionOutcome::SystemError { message } => VerifyResponse::Error { message },
        }
    }
}

impl IntoResponse for VerifyResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// `POST /api/verify-ticket`. A missing, non-string or blank `ticketId`
/// (or an unreadable body) is answered with `invalid`.
pub async fn verify_ticket(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> VerifyResponse {
    let body = payload.ok().map(|Json(body)| body);
    let raw = body
        .as_ref()
        .and_then(|body| body.get("ticketId"))
        .and_then(Value::as_str);

    state.gate.redeem(raw).await.into()
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Response, AppError> {
    let registration = state
        .gate
        .lookup(Some(ticket_id.as_str()))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' was not found", ticket_id.trim())))?;
    Ok(success(registration, "Ticket"))
}

pub async fn ticket_qr(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Response, AppError> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    bounded(
        state.store_timeout,
        state.registrations.find_by_ticket_id(&ticket_id),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Ticket '{ticket_id}' was not found")))?;

    let svg = ticket_qr_svg(&ticket_id)
        .map_err(|e| AppError::InternalServerError(format!("QR encoding failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        svg,
    )
        .into_response())
}

pub async fn resend_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Response, AppError> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let registration = state.issuer.redeliver(&ticket_id).await?;
    Ok(success(registration, "Ticket email sent"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verify_wire_shapes() {
        let used_at = DateTime::parse_from_rfc3339("2026-03-01T18:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let valid = VerifyResponse::from(RedemptionOutcome::Valid {
            ticket_id: TicketId::from("TKT-1-ABC".to_string()),
            full_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            used_at,
        });
        assert_eq!(
            serde_json::to_value(&valid).unwrap(),
            json!({"status": "valid", "user": "Alice", "email": "alice@example.com", "ticketId": "TKT-1-ABC"})
        );

        let used = VerifyResponse::from(RedemptionOutcome::AlreadyUsed {
            ticket_id: TicketId::from("TKT-1-ABC".to_string()),
            full_name: "Alice".to_string(),
            used_at,
        });
        assert_eq!(
            serde_json::to_value(&used).unwrap(),
            json!({"status": "already_used", "user": "Alice", "usedAt": "2026-03-01T18:30:00Z"})
        );

        assert_eq!(
            serde_json::to_value(VerifyResponse::NotFound).unwrap(),
            json!({"status": "not_found"})
        );
        assert_eq!(
            serde_json::to_value(VerifyResponse::Invalid).unwrap(),
            json!({"status": "invalid"})
        );
    }

    #[test]
    fn test_verify_status_codes() {
        assert_eq!(VerifyResponse::Invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(VerifyResponse::NotFound.status_code(), StatusCode::OK);
        let error = VerifyResponse::Error {
            message: "down".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
