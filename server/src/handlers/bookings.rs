use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{AttendeeInfo, RequestContext};
use crate::services::TicketDocument;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookEventRequest {
    pub quantity: i32,
    pub attendee: AttendeeInfo,
}

pub async fn book_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<Uuid>,
    Json(body): Json<BookEventRequest>,
) -> Result<Response, AppError> {
    let booking = state
        .bookings
        .create_booking(&ctx, event_id, body.quantity, body.attendee)
        .await?;
    Ok(created(booking, "Booking confirmed"))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, AppError> {
    let bookings = state.bookings.list_user_bookings(&ctx).await?;
    Ok(success(bookings, "Bookings retrieved"))
}

pub async fn get_booking(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.get_booking(&ctx, booking_id).await?;
    Ok(success(booking, "Booking retrieved"))
}

pub async fn get_booking_by_reference(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(reference): Path<String>,
) -> Result<Response, AppError> {
    let booking = state.bookings.find_by_reference(&ctx, &reference).await?;
    Ok(success(booking, "Booking retrieved"))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let booking = state.bookings.cancel_booking(&ctx, booking_id).await?;
    Ok(success(booking, "Booking cancelled"))
}

/// Downloads the printable ticket as an HTML attachment.
pub async fn download_ticket(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let document = state.tickets.ticket_document(&ctx, booking_id).await?;
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        document.filename
    ))
    .map_err(|e| AppError::InternalServerError(format!("ticket filename: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(TicketDocument::CONTENT_TYPE),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.html,
    )
        .into_response())
}
