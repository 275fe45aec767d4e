use std::convert::Infallible;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use super::{parse_id, parse_ticket_id, ACCOUNT_EMAIL_HEADER};
use crate::models::{normalize_email, Registration, RegistrationRequest, RosterQuery, RosterStats};
use crate::services::ChangeKind;
use crate::state::AppState;
use crate::store::bounded;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RosterPayload {
    registrations: Vec<Registration>,
    stats: RosterStats,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let registration = state.issuer.issue(request).await?;
    Ok(created(registration, "Registration successful"))
}

/// Tickets of the signed-in attendee, keyed by the account's email.
pub async fn my_registrations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let email = headers
        .get(ACCOUNT_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(normalize_email)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::AuthError("Missing account identity".to_string()))?;

    let registrations =
        bounded(state.store_timeout, state.registrations.list_by_email(&email)).await?;
    Ok(success(registrations, "Registrations"))
}

pub async fn event_roster(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    query: Result<Query<RosterQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    let Query(query) = query?;
    let event = bounded(state.store_timeout, state.catalog.get_event(event_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with id '{event_id}' was not found")))?;

    let registrations: Vec<Registration> =
        bounded(state.store_timeout, state.registrations.list_by_event(event_id))
            .await?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
    let stats = RosterStats::tally(&registrations, event.total_tickets);

    Ok(success(
        RosterPayload {
            registrations,
            stats,
        },
        "Registrations",
    ))
}

/// Live registration changes for one event as Server-Sent Events.
pub async fn event_roster_stream(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    bounded(state.store_timeout, state.catalog.get_event(event_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with id '{event_id}' was not found")))?;

    let changes = BroadcastStream::new(state.feed.subscribe()).filter_map(move |change| {
        match change {
            Ok(change) if change.registration.event_id == event_id => SseEvent::default()
                .event(change.kind.as_str())
                .json_data(&change)
                .ok()
                .map(Ok::<_, Infallible>),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(event_id = %event_id, skipped, "Roster stream lagged");
                None
            }
        }
    });

    Ok(Sse::new(changes).keep_alive(KeepAlive::default()))
}

/// Administrative override; outside the normal ticket lifecycle.
pub async fn delete_registration(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Response, AppError> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let registration = bounded(
        state.store_timeout,
        state.registrations.find_by_ticket_id(&ticket_id),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Ticket '{ticket_id}' was not found")))?;

    if bounded(
        state.store_timeout,
        state.registrations.delete_registration(&ticket_id),
    )
    .await?
    {
        info!(ticket_id = %ticket_id, "Registration deleted by admin");
        state.feed.publish(ChangeKind::Deleted, registration);
    }
    Ok(empty_success("Registration deleted"))
}
