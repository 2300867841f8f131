pub mod booking;
pub mod cart;
pub mod event;
pub mod user;

pub use booking::{AttendeeInfo, Booking, BookingRequest, BookingStatus, CheckInPolicy};
pub use cart::{CartItem, CartLine, CartSummary};
pub use event::{Event, EventStatus, NewEvent, CURRENCY_XAF};
pub use user::{NewUser, RequestContext, Role, User};

use thiserror::Error;

/// Raised when a stored enum column holds a value this build does not know.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
