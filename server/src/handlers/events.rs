use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use tracing::info;

use super::{parse_id, validated};
use crate::models::{batch::window_is_ordered, BatchPatch, EventPatch, NewBatch, NewEvent};
use crate::state::AppState;
use crate::store::bounded;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn list_active_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = bounded(state.store_timeout, state.catalog.list_events(true)).await?;
    Ok(success(events, "Active events"))
}

pub async fn list_event_batches(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    bounded(state.store_timeout, state.catalog.get_event(event_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with id '{event_id}' was not found")))?;

    let batches = bounded(state.store_timeout, state.catalog.list_batches(event_id)).await?;
    Ok(success(batches, "Batches"))
}

pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(new_event) = payload?;
    let new_event = validated(new_event)?;

    let event = bounded(state.store_timeout, state.catalog.create_event(new_event)).await?;
    info!(event_id = %event.id, "Event created");
    Ok(created(event, "Event created"))
}

pub async fn list_all_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = bounded(state.store_timeout, state.catalog.list_events(false)).await?;
    Ok(success(events, "Events"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    let event = bounded(state.store_timeout, state.catalog.get_event(event_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with id '{event_id}' was not found")))?;
    Ok(success(event, "Event"))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<EventPatch>, JsonRejection>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    let Json(patch) = payload?;
    let patch = validated(patch)?;

    let event = bounded(state.store_timeout, state.catalog.update_event(event_id, patch))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with id '{event_id}' was not found")))?;
    info!(event_id = %event.id, "Event updated");
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    if !bounded(state.store_timeout, state.catalog.delete_event(event_id)).await? {
        return Err(AppError::NotFound(format!(
            "Event with id '{event_id}' was not found"
        )));
    }
    info!(event_id = %event_id, "Event deleted");
    Ok(empty_success("Event deleted"))
}

pub async fn create_batch(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<NewBatch>, JsonRejection>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    let Json(new_batch) = payload?;
    let new_batch = validated(new_batch)?;
    if !window_is_ordered(new_batch.start_date, new_batch.end_date) {
        return Err(AppError::ValidationError(
            "Batch end date must not be before its start date".to_string(),
        ));
    }

    bounded(state.store_timeout, state.catalog.get_event(event_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with id '{event_id}' was not found")))?;

    let batch = bounded(
        state.store_timeout,
        state.catalog.create_batch(event_id, new_batch),
    )
    .await?;
    info!(event_id = %event_id, batch_id = %batch.id, "Batch created");
    Ok(created(batch, "Batch created"))
}

pub async fn update_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    payload: Result<Json<BatchPatch>, JsonRejection>,
) -> Result<Response, AppError> {
    let batch_id = parse_id(&batch_id, "Batch")?;
    let Json(patch) = payload?;
    let patch = validated(patch)?;

    let current = bounded(state.store_timeout, state.catalog.get_batch(batch_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch with id '{batch_id}' was not found")))?;
    let start = patch.start_date.or(current.start_date);
    let end = patch.end_date.or(current.end_date);
    if !window_is_ordered(start, end) {
        return Err(AppError::ValidationError(
            "Batch end date must not be before its start date".to_string(),
        ));
    }

    let batch = bounded(state.store_timeout, state.catalog.update_batch(batch_id, patch))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch with id '{batch_id}' was not found")))?;
    info!(batch_id = %batch.id, "Batch updated");
    Ok(success(batch, "Batch updated"))
}

pub async fn delete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Response, AppError> {
    let batch_id = parse_id(&batch_id, "Batch")?;
    if !bounded(state.store_timeout, state.catalog.delete_batch(batch_id)).await? {
        return Err(AppError::NotFound(format!(
            "Batch with id '{batch_id}' was not found"
        )));
    }
    info!(batch_id = %batch_id, "Batch deleted");
    Ok(empty_success("Batch deleted"))
}
