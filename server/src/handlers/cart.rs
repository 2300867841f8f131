use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AttendeeInfo, RequestContext};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub event_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Serialize)]
struct ClearedCart {
    removed: u64,
}

pub async fn list_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, AppError> {
    let summary = state.cart.list_cart(&ctx).await?;
    Ok(success(summary, "Cart retrieved"))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<AddToCartRequest>,
) -> Result<Response, AppError> {
    let item = state
        .cart
        .add_to_cart(&ctx, body.event_id, body.quantity)
        .await?;
    Ok(created(item, "Added to cart"))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(cart_item_id): Path<Uuid>,
    Json(body): Json<UpdateCartItemRequest>,
) -> Result<Response, AppError> {
    match state
        .cart
        .update_cart_item(&ctx, cart_item_id, body.quantity)
        .await?
    {
        Some(item) => Ok(success(item, "Cart item updated")),
        None => Ok(empty_success("Cart item removed")),
    }
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(cart_item_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.cart.remove_cart_item(&ctx, cart_item_id).await?;
    Ok(empty_success("Cart item removed"))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, AppError> {
    let removed = state.cart.clear_cart(&ctx).await?;
    Ok(success(ClearedCart { removed }, "Cart cleared"))
}

/// Books every cart line. Lines that fail stay in the cart and are listed
/// under `failures`.
pub async fn checkout(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(attendee): Json<AttendeeInfo>,
) -> Result<Response, AppError> {
    let outcome = state.bookings.checkout(&ctx, attendee).await?;
    let message = if outcome.failures.is_empty() {
        "Checkout complete"
    } else {
        "Checkout partially complete"
    };
    Ok(success(outcome, message))
}
