use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::references::{RandomReferences, ReferenceGenerator};
use crate::clock::{Clock, SystemClock};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{AttendeeInfo, Booking, BookingRequest, CheckInPolicy, Event, RequestContext};
use crate::notifications::BookingNotifier;
use crate::store::Store;

/// West Africa Time, UTC+1 all year.
pub fn west_africa_time() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap_or(Utc.fix())
}

#[derive(Debug, Clone, Copy)]
pub struct BookingConfig {
    /// How many fresh reference/ticket pairs to try before giving up on collisions.
    pub reference_attempts: u32,
    pub check_in_policy: CheckInPolicy,
    /// Offset of the venues' local time from UTC; decides which date "today" is at the gate.
    pub event_utc_offset: FixedOffset,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            reference_attempts: 5,
            check_in_policy: CheckInPolicy::SameDay,
            event_utc_offset: west_africa_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutFailure {
    pub cart_item_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub bookings: Vec<Booking>,
    pub failures: Vec<CheckoutFailure>,
}

/// Turns purchase intents into confirmed bookings while guarding event inventory.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    references: Arc<dyn ReferenceGenerator>,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn BookingNotifier>>,
    config: BookingConfig,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>, config: BookingConfig) -> Self {
        Self {
            store,
            references: Arc::new(RandomReferences),
            clock: Arc::new(SystemClock),
            notifier: None,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn BookingNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_references(mut self, references: Arc<dyn ReferenceGenerator>) -> Self {
        self.references = references;
        self
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Books `quantity` tickets for the caller.
    ///
    /// The inventory check, decrement, booking insert and removal of the
    /// matching cart line commit together or not at all. Identifier collisions
    /// are retried with fresh identifiers up to `reference_attempts` times.
    /// The confirmation email is queued after commit and cannot fail the booking.
    pub async fn create_booking(
        &self,
        ctx: &RequestContext,
        event_id: Uuid,
        quantity: i32,
        attendee: AttendeeInfo,
    ) -> ServiceResult<Booking> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "Quantity must be at least 1".into(),
            ));
        }
        attendee.validate()?;

        let attempts = self.config.reference_attempts.max(1);
        let mut attempt = 0;
        let (booking, event) = loop {
            attempt += 1;
            let now = self.clock.now();
            let ids = self.references.generate(now);
            let request = BookingRequest {
                user_id: ctx.user_id,
                event_id,
                quantity,
                attendee: attendee.clone(),
                booking_reference: ids.booking_reference,
                ticket_number: ids.ticket_number,
            };

            match self.store.create_booking(request, now).await {
                Ok(created) => break created,
                Err(ServiceError::DuplicateReference(reference)) if attempt < attempts => {
                    warn!(
                        attempt,
                        reference = %reference,
                        "Booking identifier collision, retrying with fresh identifiers"
                    );
                }
                Err(err) => {
                    warn!(
                        user_id = %ctx.user_id,
                        event_id = %event_id,
                        quantity,
                        error = %err,
                        "Booking failed"
                    );
                    return Err(err);
                }
            }
        };

        info!(
            booking_id = %booking.id,
            reference = %booking.booking_reference,
            event_id = %event.id,
            quantity = booking.quantity,
            total = %booking.total_amount,
            available_tickets = event.available_tickets,
            "Booking confirmed"
        );

        self.notify(&booking, &event);
        Ok(booking)
    }

    /// Books every line in the caller's cart. Each line is its own transaction;
    /// lines that cannot be booked stay in the cart and are reported back.
    pub async fn checkout(
        &self,
        ctx: &RequestContext,
        attendee: AttendeeInfo,
    ) -> ServiceResult<CheckoutOutcome> {
        attendee.validate()?;
        let lines = self.store.list_cart(ctx.user_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::Validation("Cart is empty".into()));
        }

        let mut outcome = CheckoutOutcome::default();
        for line in lines {
            match self
                .create_booking(ctx, line.event_id, line.quantity, attendee.clone())
                .await
            {
                Ok(booking) => outcome.bookings.push(booking),
                Err(ServiceError::Database(err)) => return Err(ServiceError::Database(err)),
                Err(err) => outcome.failures.push(CheckoutFailure {
                    cart_item_id: line.id,
                    event_id: line.event_id,
                    quantity: line.quantity,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    /// Cancels a booking and puts its tickets back on sale. Cancelling twice is a no-op.
    pub async fn cancel_booking(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
    ) -> ServiceResult<Booking> {
        let existing = self.get_booking(ctx, booking_id).await?;
        let outcome = self
            .store
            .cancel_booking(existing.id, self.clock.now())
            .await?;

        if outcome.changed {
            info!(
                booking_id = %outcome.booking.id,
                event_id = %outcome.event.id,
                released = outcome.booking.quantity,
                available_tickets = outcome.event.available_tickets,
                "Booking cancelled"
            );
        }
        Ok(outcome.booking)
    }

    /// Admits a ticket holder at the gate.
    pub async fn check_in(
        &self,
        ctx: &RequestContext,
        ticket_number: &str,
    ) -> ServiceResult<Booking> {
        if !ctx.is_admin() {
            return Err(ServiceError::Forbidden(
                "only admins can check tickets in".into(),
            ));
        }
        let now = self.clock.now();
        let today = now.with_timezone(&self.config.event_utc_offset).date_naive();
        let (booking, event) = self
            .store
            .check_in(ticket_number, self.config.check_in_policy, today, now)
            .await?;
        info!(
            ticket_number = %booking.ticket_number,
            event_id = %event.id,
            "Ticket checked in"
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, ctx: &RequestContext, booking_id: Uuid) -> ServiceResult<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Booking {}", booking_id)))?;
        if !ctx.can_access(booking.user_id) {
            return Err(ServiceError::Forbidden(
                "booking belongs to another user".into(),
            ));
        }
        Ok(booking)
    }

    pub async fn find_by_reference(
        &self,
        ctx: &RequestContext,
        reference: &str,
    ) -> ServiceResult<Booking> {
        let booking = self
            .store
            .find_booking_by_reference(reference)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Booking {}", reference)))?;
        if !ctx.can_access(booking.user_id) {
            return Err(ServiceError::Forbidden(
                "booking belongs to another user".into(),
            ));
        }
        Ok(booking)
    }

    pub async fn list_user_bookings(&self, ctx: &RequestContext) -> ServiceResult<Vec<Booking>> {
        self.store.list_user_bookings(ctx.user_id).await
    }

    fn notify(&self, booking: &Booking, event: &Event) {
        if let Some(notifier) = &self.notifier {
            notifier.booking_confirmed(booking, event);
        }
    }
}
