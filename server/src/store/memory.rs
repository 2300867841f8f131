use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BookingFact, CancelOutcome, DateWindow, Store};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Booking, BookingRequest, BookingStatus, CartItem, CartLine, CheckInPolicy, Event, NewEvent,
    NewUser, User,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    cart_items: Vec<CartItem>,
    bookings: Vec<Booking>,
}

impl State {
    fn booking_index(&self, pred: impl Fn(&Booking) -> bool) -> Option<usize> {
        self.bookings.iter().position(pred)
    }

    fn event_mut(&mut self, id: Uuid) -> ServiceResult<&mut Event> {
        self.events
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(format!("Event {}", id)))
    }
}

/// In-process store. One mutex guards all tables, so every operation is
/// serialized the same way row locks serialize bookings in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> ServiceResult<User> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(ServiceError::Validation(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let user = user.into_user(Utc::now());
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> ServiceResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn delete_user(&self, id: Uuid) -> ServiceResult<bool> {
        let mut state = self.state.lock().await;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        let now = Utc::now();
        let held: Vec<(Uuid, i32)> = state
            .bookings
            .iter()
            .filter(|b| b.user_id == id && b.holds_inventory())
            .map(|b| (b.event_id, b.quantity))
            .collect();
        for (event_id, quantity) in held {
            if let Some(event) = state.events.get_mut(&event_id) {
                event.release(quantity, now);
            }
        }
        state.cart_items.retain(|item| item.user_id != id);
        state.bookings.retain(|booking| booking.user_id != id);
        for event in state.events.values_mut() {
            if event.organizer_id == Some(id) {
                event.organizer_id = None;
            }
        }
        Ok(true)
    }

    async fn insert_event(&self, event: NewEvent) -> ServiceResult<Event> {
        event.validate()?;
        let mut state = self.state.lock().await;
        if let Some(organizer_id) = event.organizer_id {
            if !state.users.contains_key(&organizer_id) {
                return Err(ServiceError::not_found(format!("User {}", organizer_id)));
            }
        }
        let event = event.into_event(Utc::now());
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> ServiceResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn delete_event(&self, id: Uuid) -> ServiceResult<bool> {
        let mut state = self.state.lock().await;
        if state.events.remove(&id).is_none() {
            return Ok(false);
        }
        state.cart_items.retain(|item| item.event_id != id);
        state.bookings.retain(|booking| booking.event_id != id);
        Ok(true)
    }

    async fn upsert_cart_item(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CartItem> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(ServiceError::not_found(format!("User {}", user_id)));
        }
        if !state.events.contains_key(&event_id) {
            return Err(ServiceError::not_found(format!("Event {}", event_id)));
        }

        let now = Utc::now();
        if let Some(item) = state
            .cart_items
            .iter_mut()
            .find(|item| item.user_id == user_id && item.event_id == event_id)
        {
            item.quantity = item
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| ServiceError::Validation("Cart quantity is too large".into()))?;
            item.updated_at = now;
            return Ok(item.clone());
        }

        let item = CartItem {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        state.cart_items.push(item.clone());
        Ok(item)
    }

    async fn get_cart_item(&self, id: Uuid) -> ServiceResult<Option<CartItem>> {
        let state = self.state.lock().await;
        Ok(state.cart_items.iter().find(|item| item.id == id).cloned())
    }

    async fn set_cart_quantity(&self, id: Uuid, quantity: i32) -> ServiceResult<Option<CartItem>> {
        let mut state = self.state.lock().await;
        Ok(state
            .cart_items
            .iter_mut()
            .find(|item| item.id == id)
            .map(|item| {
                item.quantity = quantity;
                item.updated_at = Utc::now();
                item.clone()
            }))
    }

    async fn delete_cart_item(&self, id: Uuid) -> ServiceResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|item| item.id != id);
        Ok(state.cart_items.len() != before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> ServiceResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|item| item.user_id != user_id);
        Ok((before - state.cart_items.len()) as u64)
    }

    async fn list_cart(&self, user_id: Uuid) -> ServiceResult<Vec<CartLine>> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .filter_map(|item| {
                let event = state.events.get(&item.event_id)?;
                Some(CartLine {
                    id: item.id,
                    event_id: event.id,
                    quantity: item.quantity,
                    title: event.title.clone(),
                    price: event.price,
                    currency: event.currency.clone(),
                    image_url: event.image_url.clone(),
                    event_date: event.event_date,
                    available_tickets: event.available_tickets,
                    added_at: item.created_at,
                })
            })
            .collect())
    }

    async fn create_booking(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<(Booking, Event)> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&request.user_id) {
            return Err(ServiceError::not_found(format!("User {}", request.user_id)));
        }
        if state
            .booking_index(|b| {
                b.booking_reference == request.booking_reference
                    || b.ticket_number == request.ticket_number
            })
            .is_some()
        {
            return Err(ServiceError::DuplicateReference(
                request.booking_reference.clone(),
            ));
        }

        // Work on a copy so a failed check leaves the stored event untouched.
        let mut event = state.event_mut(request.event_id)?.clone();
        event.reserve(request.quantity, now)?;
        let booking = request.confirm(&event, now);

        state.events.insert(event.id, event.clone());
        state.bookings.push(booking.clone());
        state
            .cart_items
            .retain(|item| !(item.user_id == request.user_id && item.event_id == event.id));

        Ok((booking, event))
    }

    async fn cancel_booking(&self, id: Uuid, now: DateTime<Utc>) -> ServiceResult<CancelOutcome> {
        let mut state = self.state.lock().await;
        let index = state
            .booking_index(|b| b.id == id)
            .ok_or_else(|| ServiceError::not_found(format!("Booking {}", id)))?;

        let mut booking = state.bookings[index].clone();
        let changed = booking.cancel(now)?;
        let event = state.event_mut(booking.event_id)?;
        if changed {
            event.release(booking.quantity, now);
        }
        let event = event.clone();
        state.bookings[index] = booking.clone();

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
        let mut state = self.state.lock().await;
        let index = state
            .booking_index(|b| b.ticket_number == ticket_number)
            .ok_or_else(|| {
                ServiceError::InvalidTicket(format!("ticket {} does not exist", ticket_number))
            })?;

        let mut booking = state.bookings[index].clone();
        let event = state.event_mut(booking.event_id)?.clone();
        booking.check_in(event.event_date, policy, today, now)?;
        state.bookings[index] = booking.clone();

        Ok((booking, event))
    }

    async fn get_booking(&self, id: Uuid) -> ServiceResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn find_booking_by_ticket(&self, ticket_number: &str) -> ServiceResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .find(|b| b.ticket_number == ticket_number)
            .cloned())
    }

    async fn find_booking_by_reference(&self, reference: &str) -> ServiceResult<Option<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .find(|b| b.booking_reference == reference)
            .cloned())
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> ServiceResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn count_events(&self, window: DateWindow) -> ServiceResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .values()
            .filter(|event| window.contains(event.created_at))
            .count() as u64)
    }

    async fn booking_facts(&self, window: DateWindow) -> ServiceResult<Vec<BookingFact>> {
        let state = self.state.lock().await;
        let mut facts: Vec<BookingFact> = state
            .bookings
            .iter()
            .filter(|b| b.status != BookingStatus::Cancelled && window.contains(b.created_at))
            .filter_map(|b| {
                let event = state.events.get(&b.event_id)?;
                Some(BookingFact {
                    booking_id: b.id,
                    event_id: event.id,
                    event_title: event.title.clone(),
                    category: event.category.clone(),
                    city: event.city.clone(),
                    region: event.region.clone(),
                    quantity: b.quantity,
                    total_amount: b.total_amount,
                    created_at: b.created_at,
                })
            })
            .collect();
        // Stable: equal timestamps keep insertion order.
        facts.sort_by_key(|fact| fact.created_at);
        Ok(facts)
    }
}
