use axum::extract::{Path, State};
use axum::response::Response;

use crate::models::RequestContext;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Called by the gate scanner with the ticket number read from the QR code.
pub async fn verify_ticket(
    State(state): State<AppState>,
    Path(ticket_number): Path<String>,
) -> Result<Response, AppError> {
    let verification = state.tickets.verify_ticket(&ticket_number).await?;
    let message = if verification.valid {
        "Ticket is valid"
    } else {
        "Ticket is not valid for entry"
    };
    Ok(success(verification, message))
}

pub async fn check_in(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(ticket_number): Path<String>,
) -> Result<Response, AppError> {
    let booking = state.bookings.check_in(&ctx, &ticket_number).await?;
    Ok(success(booking, "Ticket checked in"))
}
