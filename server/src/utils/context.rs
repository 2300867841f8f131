//! Caller identity. Authentication happens upstream; the gateway forwards the
//! authenticated user in `x-user-id` and `x-user-role`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::models::{RequestContext, Role};
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing x-user-id header".to_string()))?;
        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| AppError::AuthError("x-user-id is not a valid UUID".to_string()))?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| AppError::AuthError(e.to_string()))?,
            None => Role::User,
        };

        Ok(RequestContext::new(user_id, role))
    }
}
