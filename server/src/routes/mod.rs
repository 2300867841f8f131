use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{analytics, bookings, cart, health_check, tickets};
use crate::state::AppState;

/// HTTP surface options taken from [`crate::config::Config`].
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub production: bool,
    pub cors_allowed_origins: Vec<String>,
}

pub fn create_routes(state: AppState, options: &RouterOptions) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/cart",
            get(cart::list_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route("/cart/checkout", post(cart::checkout))
        .route(
            "/cart/:id",
            put(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        .route("/events/:id/book", post(bookings::book_event))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route(
            "/bookings/reference/:reference",
            get(bookings::get_booking_by_reference),
        )
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/ticket", get(bookings::download_ticket))
        .route("/tickets/:ticket_number/verify", get(tickets::verify_ticket))
        .route("/tickets/:ticket_number/check-in", post(tickets::check_in))
        .route("/admin/analytics", get(analytics::analytics_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(options.production))
        .layer(create_cors_layer(&options.cors_allowed_origins))
}
