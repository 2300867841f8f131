use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod analytics;
pub mod bookings;
pub mod cart;
pub mod tickets;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventzon-api",
    };

    success(payload, "Health check successful")
}
