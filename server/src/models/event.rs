use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;
use crate::error::{ServiceError, ServiceResult};

/// Central African CFA franc. The only currency events are priced in.
pub const CURRENCY_XAF: &str = "XAF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Active,
    Cancelled,
    SoldOut,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Cancelled => "cancelled",
            EventStatus::SoldOut => "sold_out",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EventStatus::Active),
            "cancelled" => Ok(EventStatus::Cancelled),
            "sold_out" => Ok(EventStatus::SoldOut),
            other => Err(ParseEnumError::new("event status", other)),
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub venue: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub price: Decimal,
    pub currency: String,
    pub image_url: Option<String>,
    pub max_attendees: i32,
    pub available_tickets: i32,
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn tickets_sold(&self) -> i32 {
        self.max_attendees - self.available_tickets
    }

    pub fn check_available(&self, quantity: i32) -> ServiceResult<()> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if self.status != EventStatus::Active {
            return Err(ServiceError::EventUnavailable(format!(
                "event '{}' is {}",
                self.title, self.status
            )));
        }
        if self.available_tickets < quantity {
            return Err(ServiceError::EventUnavailable(format!(
                "event '{}' has {} ticket(s) left, {} requested",
                self.title, self.available_tickets, quantity
            )));
        }
        Ok(())
    }

    /// Takes `quantity` tickets out of inventory, flipping the event to sold out at zero.
    pub fn reserve(&mut self, quantity: i32, now: DateTime<Utc>) -> ServiceResult<()> {
        self.check_available(quantity)?;

        self.available_tickets -= quantity;
        if self.available_tickets == 0 {
            self.status = EventStatus::SoldOut;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Returns tickets to inventory. A cancelled event stays cancelled.
    pub fn release(&mut self, quantity: i32, now: DateTime<Utc>) {
        self.available_tickets = (self.available_tickets + quantity).min(self.max_attendees);
        if self.status == EventStatus::SoldOut && self.available_tickets > 0 {
            self.status = EventStatus::Active;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub organizer_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub venue: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub max_attendees: i32,
}

impl NewEvent {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.title.trim().is_empty() {
            return Err(ServiceError::Validation("Event title is required".into()));
        }
        if self.max_attendees < 1 {
            return Err(ServiceError::Validation(
                "maxAttendees must be at least 1".into(),
            ));
        }
        if self.price.is_sign_negative() {
            return Err(ServiceError::Validation("Price cannot be negative".into()));
        }
        Ok(())
    }

    pub fn into_event(self, now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            organizer_id: self.organizer_id,
            title: self.title,
            description: self.description,
            category: self.category,
            venue: self.venue,
            address: self.address,
            city: self.city,
            region: self.region,
            event_date: self.event_date,
            start_time: self.start_time,
            end_time: self.end_time,
            price: self.price.round_dp(2),
            currency: CURRENCY_XAF.to_string(),
            image_url: self.image_url,
            max_attendees: self.max_attendees,
            available_tickets: self.max_attendees,
            status: EventStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(max_attendees: i32) -> Event {
        NewEvent {
            organizer_id: None,
            title: "Makossa Night".into(),
            description: None,
            category: "music".into(),
            venue: "Palais des Sports".into(),
            address: None,
            city: Some("Yaoundé".into()),
            region: Some("Centre".into()),
            event_date: NaiveDate::from_ymd_opt(2026, 12, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            end_time: None,
            price: Decimal::new(150000, 2),
            image_url: None,
            max_attendees,
        }
        .into_event(Utc::now())
    }

    #[test]
    fn test_reserve_until_sold_out() {
        let mut event = event(2);
        event.reserve(2, Utc::now()).unwrap();
        assert_eq!(event.available_tickets, 0);
        assert_eq!(event.status, EventStatus::SoldOut);
        assert_eq!(event.tickets_sold(), 2);

        let err = event.reserve(1, Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::EventUnavailable(_)));
    }

    #[test]
    fn test_reserve_rejects_overdraw_without_mutation() {
        let mut event = event(3);
        assert!(event.reserve(4, Utc::now()).is_err());
        assert_eq!(event.available_tickets, 3);
        assert_eq!(event.status, EventStatus::Active);
    }

    #[test]
    fn test_release_reactivates_sold_out_event() {
        let mut event = event(2);
        event.reserve(2, Utc::now()).unwrap();
        event.release(2, Utc::now());
        assert_eq!(event.available_tickets, 2);
        assert_eq!(event.status, EventStatus::Active);
    }

    #[test]
    fn test_release_never_exceeds_capacity() {
        let mut event = event(2);
        event.release(5, Utc::now());
        assert_eq!(event.available_tickets, 2);
    }

    #[test]
    fn test_cancelled_event_stays_cancelled() {
        let mut event = event(2);
        event.status = EventStatus::Cancelled;
        assert!(event.reserve(1, Utc::now()).is_err());
        event.release(1, Utc::now());
        assert_eq!(event.status, EventStatus::Cancelled);
    }

    #[test]
    fn test_zero_quantity_is_invalid() {
        let event = event(2);
        assert!(matches!(
            event.check_available(0),
            Err(ServiceError::Validation(_))
        ));
    }
}
