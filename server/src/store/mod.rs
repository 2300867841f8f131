//! Persistence for users, events, cart items and bookings.
//!
//! Services talk to a [`Store`]; [`PostgresStore`] is the production backend and
//! [`MemoryStore`] backs tests and local runs without a database. Both
//! implementations run the inventory-changing operations (`create_booking`,
//! `cancel_booking`, `check_in`) as a single unit of work under a lock on the
//! event (or booking) row, so concurrent callers serialize on the same event.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::models::{
    Booking, BookingRequest, CartItem, CartLine, CheckInPolicy, Event, NewEvent, NewUser, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Inclusive date range on booking creation date. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// One non-cancelled booking joined with the event attributes analytics groups on.
#[derive(Debug, Clone, FromRow)]
pub struct BookingFact {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub event_title: String,
    pub category: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub event: Event,
    /// False when the booking had already been cancelled.
    pub changed: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> ServiceResult<User>;
    async fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>>;
    /// Removes the user together with their cart items and bookings. Tickets
    /// held by the removed bookings go back to their events in the same unit
    /// of work.
    async fn delete_user(&self, id: Uuid) -> ServiceResult<bool>;

    async fn insert_event(&self, event: NewEvent) -> ServiceResult<Event>;
    async fn get_event(&self, id: Uuid) -> ServiceResult<Option<Event>>;
    /// Removes the event together with its cart items and bookings.
    async fn delete_event(&self, id: Uuid) -> ServiceResult<bool>;

    /// Adds `quantity` to the (user, event) row, creating it if needed.
    async fn upsert_cart_item(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CartItem>;
    async fn get_cart_item(&self, id: Uuid) -> ServiceResult<Option<CartItem>>;
    async fn set_cart_quantity(&self, id: Uuid, quantity: i32) -> ServiceResult<Option<CartItem>>;
    async fn delete_cart_item(&self, id: Uuid) -> ServiceResult<bool>;
    async fn clear_cart(&self, user_id: Uuid) -> ServiceResult<u64>;
    async fn list_cart(&self, user_id: Uuid) -> ServiceResult<Vec<CartLine>>;

    /// Locks the event, checks and decrements inventory, inserts the booking and
    /// drops the user's cart row for the event, all or nothing. Returns the
    /// booking and the event as left by the booking.
    async fn create_booking(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Booking, Event)>;
    async fn cancel_booking(&self, id: Uuid, now: DateTime<Utc>) -> ServiceResult<CancelOutcome>;
    /// `today` is the venue-local date the check-in policy is judged against.
    async fn check_in(
        &self,
        ticket_number: &str,
        policy: CheckInPolicy,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Booking, Event)>;

    async fn get_booking(&self, id: Uuid) -> ServiceResult<Option<Booking>>;
    async fn find_booking_by_ticket(&self, ticket_number: &str) -> ServiceResult<Option<Booking>>;
    async fn find_booking_by_reference(&self, reference: &str) -> ServiceResult<Option<Booking>>;
    async fn list_user_bookings(&self, user_id: Uuid) -> ServiceResult<Vec<Booking>>;

    /// Events created inside the window.
    async fn count_events(&self, window: DateWindow) -> ServiceResult<u64>;
    /// Non-cancelled bookings created inside the window, oldest first.
    async fn booking_facts(&self, window: DateWindow) -> ServiceResult<Vec<BookingFact>>;
}
