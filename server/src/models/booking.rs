use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Event, ParseEnumError};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Attended,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Attended => "attended",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "attended" => Ok(BookingStatus::Attended),
            other => Err(ParseEnumError::new("booking status", other)),
        }
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// When a ticket may be checked in relative to the event date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInPolicy {
    #[default]
    SameDay,
    AnyDay,
}

impl CheckInPolicy {
    pub fn allows(&self, event_date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            CheckInPolicy::SameDay => event_date == today,
            CheckInPolicy::AnyDay => true,
        }
    }
}

impl FromStr for CheckInPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "same_day" => Ok(CheckInPolicy::SameDay),
            "any_day" => Ok(CheckInPolicy::AnyDay),
            other => Err(ParseEnumError::new("check-in policy", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl AttendeeInfo {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::Validation("Attendee name is required".into()));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(ServiceError::Validation(format!(
                "'{}' is not a valid email address",
                email
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub currency: String,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub booking_reference: String,
    pub ticket_number: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Exact `price * quantity`, kept at two decimal places.
pub fn total_amount(price: Decimal, quantity: i32) -> Decimal {
    (price * Decimal::from(quantity)).round_dp(2)
}

impl Booking {
    /// Ticket holders may enter while the booking is confirmed and not yet used.
    pub fn is_valid_for_entry(&self) -> bool {
        self.status == BookingStatus::Confirmed && self.check_in_time.is_none()
    }

    /// Confirmed and attended bookings keep their tickets out of inventory.
    pub fn holds_inventory(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    /// `today` is the calendar date at the venue, which can differ from the
    /// UTC date of `now` around midnight.
    pub fn check_in(
        &mut self,
        event_date: NaiveDate,
        policy: CheckInPolicy,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        match self.status {
            BookingStatus::Attended => {
                return Err(ServiceError::AlreadyCheckedIn(self.ticket_number.clone()))
            }
            BookingStatus::Cancelled => {
                return Err(ServiceError::InvalidTicket(format!(
                    "ticket {} belongs to a cancelled booking",
                    self.ticket_number
                )))
            }
            BookingStatus::Confirmed => {}
        }
        if self.check_in_time.is_some() {
            return Err(ServiceError::AlreadyCheckedIn(self.ticket_number.clone()));
        }
        if !policy.allows(event_date, today) {
            return Err(ServiceError::InvalidTicket(format!(
                "ticket {} is for {}, not today",
                self.ticket_number, event_date
            )));
        }

        self.check_in_time = Some(now);
        self.status = BookingStatus::Attended;
        self.updated_at = now;
        Ok(())
    }

    /// Returns false when the booking was already cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> ServiceResult<bool> {
        match self.status {
            BookingStatus::Cancelled => Ok(false),
            BookingStatus::Attended => Err(ServiceError::Validation(format!(
                "booking {} has been used and can no longer be cancelled",
                self.booking_reference
            ))),
            BookingStatus::Confirmed => {
                self.status = BookingStatus::Cancelled;
                self.updated_at = now;
                Ok(true)
            }
        }
    }
}

/// Everything needed to write a booking once the event row is locked.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub attendee: AttendeeInfo,
    pub booking_reference: String,
    pub ticket_number: String,
}

impl BookingRequest {
    /// Builds the confirmed booking, pricing it from the event as it is right now.
    pub fn confirm(&self, event: &Event, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            event_id: event.id,
            quantity: self.quantity,
            total_amount: total_amount(event.price, self.quantity),
            currency: event.currency.clone(),
            attendee_name: self.attendee.name.trim().to_string(),
            attendee_email: self.attendee.email.trim().to_string(),
            attendee_phone: self.attendee.phone.clone(),
            status: BookingStatus::Confirmed,
            booking_reference: self.booking_reference.clone(),
            ticket_number: self.ticket_number.clone(),
            check_in_time: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            quantity: 2,
            total_amount: Decimal::new(300000, 2),
            currency: "XAF".into(),
            attendee_name: "Awa Ngono".into(),
            attendee_email: "awa@example.cm".into(),
            attendee_phone: None,
            status: BookingStatus::Confirmed,
            booking_reference: "EVZ-20261205-ABC123".into(),
            ticket_number: "TKT-0123456789AB".into(),
            check_in_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_total_amount_is_exact() {
        let price = Decimal::new(150000, 2);
        let expected = Decimal::new(450000, 2);
        for _ in 0..1000 {
            assert_eq!(total_amount(price, 3), expected);
        }
        assert_eq!(total_amount(price, 3).to_string(), "4500.00");
    }

    #[test]
    fn test_total_amount_with_fractional_price() {
        assert_eq!(
            total_amount(Decimal::new(1001, 2), 3),
            Decimal::new(3003, 2)
        );
    }

    #[test]
    fn test_check_in_same_day() {
        let now = Utc.with_ymd_and_hms(2026, 12, 5, 19, 30, 0).unwrap();
        let mut booking = booking();
        booking
            .check_in(now.date_naive(), CheckInPolicy::SameDay, now.date_naive(), now)
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Attended);
        assert_eq!(booking.check_in_time, Some(now));
        assert!(!booking.is_valid_for_entry());

        let err = booking
            .check_in(now.date_naive(), CheckInPolicy::SameDay, now.date_naive(), now)
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyCheckedIn(_)));
    }

    #[test]
    fn test_check_in_wrong_day() {
        let now = Utc.with_ymd_and_hms(2026, 12, 4, 19, 30, 0).unwrap();
        let event_date = NaiveDate::from_ymd_opt(2026, 12, 5).unwrap();
        let mut booking = booking();

        let err = booking
            .check_in(event_date, CheckInPolicy::SameDay, now.date_naive(), now)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTicket(_)));
        assert_eq!(booking.status, BookingStatus::Confirmed);

        booking
            .check_in(event_date, CheckInPolicy::AnyDay, now.date_naive(), now)
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Attended);
    }

    #[test]
    fn test_cancelled_ticket_cannot_check_in() {
        let now = Utc::now();
        let mut booking = booking();
        assert!(booking.cancel(now).unwrap());
        assert!(!booking.cancel(now).unwrap());

        let err = booking
            .check_in(now.date_naive(), CheckInPolicy::AnyDay, now.date_naive(), now)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTicket(_)));
    }

    #[test]
    fn test_attended_booking_cannot_be_cancelled() {
        let now = Utc::now();
        let mut booking = booking();
        booking
            .check_in(now.date_naive(), CheckInPolicy::AnyDay, now.date_naive(), now)
            .unwrap();
        assert!(matches!(
            booking.cancel(now),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_attendee_validation() {
        let mut attendee = AttendeeInfo {
            name: "Awa".into(),
            email: "awa@example.cm".into(),
            phone: None,
        };
        assert!(attendee.validate().is_ok());

        attendee.email = "awa.example.cm".into();
        assert!(attendee.validate().is_err());

        attendee.email = "awa@example.cm".into();
        attendee.name = "  ".into();
        assert!(attendee.validate().is_err());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "same_day".parse::<CheckInPolicy>().unwrap(),
            CheckInPolicy::SameDay
        );
        assert_eq!(
            "ANY_DAY".parse::<CheckInPolicy>().unwrap(),
            CheckInPolicy::AnyDay
        );
        assert!("weekly".parse::<CheckInPolicy>().is_err());
    }
}
