use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{BookingFact, CancelOutcome, DateWindow, Store};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Booking, BookingRequest, CartItem, CartLine, CheckInPolicy, Event, NewEvent, NewUser, User,
};

const EVENT_COLUMNS: &str = "id, organizer_id, title, description, category, venue, address, \
     city, region, event_date, start_time, end_time, price, currency, image_url, \
     max_attendees, available_tickets, status, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, user_id, event_id, quantity, total_amount, currency, \
     attendee_name, attendee_email, attendee_phone, status, booking_reference, \
     ticket_number, check_in_time, created_at, updated_at";

/// SQLSTATE raised when `cart_items.quantity + EXCLUDED.quantity` leaves INTEGER.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_event(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> ServiceResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(event)
    }

    async fn write_inventory(
        tx: &mut Transaction<'_, Postgres>,
        event: &Event,
    ) -> ServiceResult<()> {
        sqlx::query(
            "UPDATE events SET available_tickets = $2, status = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(event.id)
        .bind(event.available_tickets)
        .bind(event.status.as_str())
        .bind(event.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn write_booking_state(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
    ) -> ServiceResult<()> {
        sqlx::query(
            "UPDATE bookings SET status = $2, check_in_time = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.check_in_time)
        .bind(booking.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// Maps constraint violations raised while writing a booking onto domain errors.
fn booking_write_error(err: sqlx::Error, request: &BookingRequest) -> ServiceError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return ServiceError::DuplicateReference(match db.constraint() {
                Some("bookings_ticket_number_key") => request.ticket_number.clone(),
                _ => request.booking_reference.clone(),
            });
        }
        if db.is_foreign_key_violation() {
            return ServiceError::not_found(format!("User {}", request.user_id));
        }
    }
    ServiceError::Database(err)
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_user(&self, user: NewUser) -> ServiceResult<User> {
        let user = user.into_user(Utc::now());
        let inserted = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, phone, role, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, name, email, phone, role, created_at, updated_at",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Validation(format!("email {} is already registered", user.email))
            }
            _ => ServiceError::Database(err),
        })?;
        Ok(inserted)
    }

    async fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, phone, role, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> ServiceResult<bool> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Same lock order as bookings: the event rows, by id.
        let held: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT event_id, SUM(quantity) FROM bookings
             WHERE user_id = $1 AND status <> 'cancelled'
             GROUP BY event_id
             ORDER BY event_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (event_id, quantity) in held {
            let Some(mut event) = Self::lock_event(&mut tx, event_id).await? else {
                continue;
            };
            let quantity = i32::try_from(quantity).unwrap_or(event.max_attendees);
            event.release(quantity, now);
            Self::write_inventory(&mut tx, &event).await?;
        }

        // cart_items and bookings cascade, events.organizer_id is set null.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_event(&self, event: NewEvent) -> ServiceResult<Event> {
        event.validate()?;
        let event = event.into_event(Utc::now());
        let inserted = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events ({EVENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(event.organizer_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.category)
        .bind(&event.venue)
        .bind(&event.address)
        .bind(&event.city)
        .bind(&event.region)
        .bind(event.event_date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.price)
        .bind(&event.currency)
        .bind(&event.image_url)
        .bind(event.max_attendees)
        .bind(event.available_tickets)
        .bind(event.status.as_str())
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ServiceError::not_found(format!("Organizer {:?}", event.organizer_id))
            }
            _ => ServiceError::Database(err),
        })?;
        Ok(inserted)
    }

    async fn get_event(&self, id: Uuid) -> ServiceResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_cart_item(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CartItem> {
        let item = sqlx::query_as::<_, CartItem>(
            "INSERT INTO cart_items (id, user_id, event_id, quantity)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, event_id)
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now()
             RETURNING id, user_id, event_id, quantity, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                match db.constraint() {
                    Some("cart_items_user_id_fkey") => {
                        ServiceError::not_found(format!("User {}", user_id))
                    }
                    _ => ServiceError::not_found(format!("Event {}", event_id)),
                }
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) => {
                ServiceError::Validation("Cart quantity is too large".into())
            }
            _ => ServiceError::Database(err),
        })?;
        Ok(item)
    }

    async fn get_cart_item(&self, id: Uuid) -> ServiceResult<Option<CartItem>> {
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, event_id, quantity, created_at, updated_at
             FROM cart_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn set_cart_quantity(&self, id: Uuid, quantity: i32) -> ServiceResult<Option<CartItem>> {
        let item = sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = $2, updated_at = now() WHERE id = $1
             RETURNING id, user_id, event_id, quantity, created_at, updated_at",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn delete_cart_item(&self, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_cart(&self, user_id: Uuid) -> ServiceResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT c.id, c.event_id, c.quantity, e.title, e.price, e.currency, e.image_url,
                    e.event_date, e.available_tickets, c.created_at AS added_at
             FROM cart_items c
             JOIN events e ON e.id = c.event_id
             WHERE c.user_id = $1
             ORDER BY c.created_at, c.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn create_booking(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Booking, Event)> {
        let mut tx = self.pool.begin().await?;

        // Concurrent bookings for the same event queue up on this row lock.
        let mut event = Self::lock_event(&mut tx, request.event_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Event {}", request.event_id)))?;
        event.reserve(request.quantity, now)?;
        let booking = request.confirm(&event, now);

        Self::write_inventory(&mut tx, &event).await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.event_id)
        .bind(booking.quantity)
        .bind(booking.total_amount)
        .bind(&booking.currency)
        .bind(&booking.attendee_name)
        .bind(&booking.attendee_email)
        .bind(&booking.attendee_phone)
        .bind(booking.status.as_str())
        .bind(&booking.booking_reference)
        .bind(&booking.ticket_number)
        .bind(booking.check_in_time)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| booking_write_error(err, &request))?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND event_id = $2")
            .bind(request.user_id)
            .bind(request.event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((booking, event))
    }

    async fn cancel_booking(&self, id: Uuid, now: DateTime<Utc>) -> ServiceResult<CancelOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Booking {}", id)))?;

        let mut event = Self::lock_event(&mut tx, booking.event_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Event {}", booking.event_id)))?;

        let changed = booking.cancel(now)?;
        if changed {
            event.release(booking.quantity, now);
            Self::write_booking_state(&mut tx, &booking).await?;
            Self::write_inventory(&mut tx, &event).await?;
        }

        tx.commit().await?;
        Ok(CancelOutcome {
            booking,
            event,
            changed,
        })
    }

    async fn check_in(
        &self,
        ticket_number: &str,
        policy: CheckInPolicy,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Booking, Event)> {
        let mut tx = self.pool.begin().await?;

        let mut booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE ticket_number = $1 FOR UPDATE"
        ))
        .bind(ticket_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ServiceError::InvalidTicket(format!("ticket {} does not exist", ticket_number))
        })?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(booking.event_id)
        .fetch_one(&mut *tx)
        .await?;

        booking.check_in(event.event_date, policy, today, now)?;
        Self::write_booking_state(&mut tx, &booking).await?;

        tx.commit().await?;
        Ok((booking, event))
    }

    async fn get_booking(&self, id: Uuid) -> ServiceResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn find_booking_by_ticket(&self, ticket_number: &str) -> ServiceResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE ticket_number = $1"
        ))
        .bind(ticket_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn find_booking_by_reference(&self, reference: &str) -> ServiceResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> ServiceResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn count_events(&self, window: DateWindow) -> ServiceResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events
             WHERE ($1::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date >= $1)
               AND ($2::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date <= $2)",
        )
        .bind(window.start_date)
        .bind(window.end_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn booking_facts(&self, window: DateWindow) -> ServiceResult<Vec<BookingFact>> {
        // Plain reads: analytics never takes the row locks bookings wait on.
        let facts = sqlx::query_as::<_, BookingFact>(
            "SELECT b.id AS booking_id, e.id AS event_id, e.title AS event_title, e.category,
                    e.city, e.region, b.quantity, b.total_amount, b.created_at
             FROM bookings b
             JOIN events e ON e.id = b.event_id
             WHERE b.status <> 'cancelled'
               AND ($1::date IS NULL OR (b.created_at AT TIME ZONE 'UTC')::date >= $1)
               AND ($2::date IS NULL OR (b.created_at AT TIME ZONE 'UTC')::date <= $2)
             ORDER BY b.created_at, b.id",
        )
        .bind(window.start_date)
        .bind(window.end_date)
        .fetch_all(&self.pool)
        .await?;
        Ok(facts)
    }
}
