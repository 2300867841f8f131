use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ReminderLeadTime;
use crate::models::{Booking, Event, ParseEnumError};
use crate::services::tickets::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl FromStr for Locale {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "en-cm" => Ok(Locale::En),
            "fr" | "fr-fr" | "fr-cm" => Ok(Locale::Fr),
            other => Err(ParseEnumError::new("locale", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
}

struct Strings {
    confirmation_subject: &'static str,
    confirmation_heading: &'static str,
    confirmation_intro: &'static str,
    reminder_subject_24h: &'static str,
    reminder_subject_2h: &'static str,
    reminder_intro_24h: &'static str,
    reminder_intro_2h: &'static str,
    reference: &'static str,
    tickets: &'static str,
    total: &'static str,
    date: &'static str,
    venue: &'static str,
    attached: &'static str,
    footer: &'static str,
}

const EN: Strings = Strings {
    confirmation_subject: "Your tickets for",
    confirmation_heading: "Booking confirmed",
    confirmation_intro: "Thank you for your booking. Your tickets are ready.",
    reminder_subject_24h: "Tomorrow:",
    reminder_subject_2h: "Starting soon:",
    reminder_intro_24h: "Your event takes place in 24 hours.",
    reminder_intro_2h: "Your event starts in 2 hours.",
    reference: "Booking reference",
    tickets: "Tickets",
    total: "Total paid",
    date: "Date",
    venue: "Venue",
    attached: "Your ticket is attached. Show its QR code at the entrance.",
    footer: "EventZon - see you there!",
};

const FR: Strings = Strings {
    confirmation_subject: "Vos billets pour",
    confirmation_heading: "Réservation confirmée",
    confirmation_intro: "Merci pour votre réservation. Vos billets sont prêts.",
    reminder_subject_24h: "Demain :",
    reminder_subject_2h: "Bientôt :",
    reminder_intro_24h: "Votre événement a lieu dans 24 heures.",
    reminder_intro_2h: "Votre événement commence dans 2 heures.",
    reference: "Référence de réservation",
    tickets: "Billets",
    total: "Total payé",
    date: "Date",
    venue: "Lieu",
    attached: "Votre billet est en pièce jointe. Présentez son code QR à l'entrée.",
    footer: "EventZon - à bientôt !",
};

fn strings(locale: Locale) -> &'static Strings {
    match locale {
        Locale::En => &EN,
        Locale::Fr => &FR,
    }
}

fn layout(heading: &str, intro: &str, booking: &Booking, event: &Event, s: &Strings) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{heading}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">{heading}</h2>
        <p>{name},</p>
        <p>{intro}</p>
        <h3>{title}</h3>
        <table style="border-collapse: collapse;">
            <tr><td style="padding: 4px 12px 4px 0;">{date_label}</td><td>{date} {start}</td></tr>
            <tr><td style="padding: 4px 12px 4px 0;">{venue_label}</td><td>{venue}</td></tr>
            <tr><td style="padding: 4px 12px 4px 0;">{reference_label}</td><td><strong>{reference}</strong></td></tr>
            <tr><td style="padding: 4px 12px 4px 0;">{tickets_label}</td><td>{quantity}</td></tr>
            <tr><td style="padding: 4px 12px 4px 0;">{total_label}</td><td>{total} {currency}</td></tr>
        </table>
        <p style="margin-top: 24px;">{attached}</p>
        <p style="color: #666; font-size: 12px; margin-top: 40px;">{footer}</p>
    </div>
</body>
</html>
"#,
        heading = heading,
        name = escape_html(&booking.attendee_name),
        intro = intro,
        title = escape_html(&event.title),
        date_label = s.date,
        date = event.event_date.format("%Y-%m-%d"),
        start = event.start_time.format("%H:%M"),
        venue_label = s.venue,
        venue = escape_html(&event.venue),
        reference_label = s.reference,
        reference = escape_html(&booking.booking_reference),
        tickets_label = s.tickets,
        quantity = booking.quantity,
        total_label = s.total,
        total = format_amount(booking.total_amount),
        currency = escape_html(&booking.currency),
        attached = s.attached,
        footer = s.footer,
    )
}

fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub fn booking_confirmation(locale: Locale, booking: &Booking, event: &Event) -> RenderedMessage {
    let s = strings(locale);
    RenderedMessage {
        subject: format!("{} {}", s.confirmation_subject, event.title),
        html: layout(s.confirmation_heading, s.confirmation_intro, booking, event, s),
    }
}

pub fn event_reminder(
    locale: Locale,
    booking: &Booking,
    event: &Event,
    lead_time: ReminderLeadTime,
) -> RenderedMessage {
    let s = strings(locale);
    let (prefix, intro) = match lead_time {
        ReminderLeadTime::TwentyFourHours => (s.reminder_subject_24h, s.reminder_intro_24h),
        ReminderLeadTime::TwoHours => (s.reminder_subject_2h, s.reminder_intro_2h),
    };
    RenderedMessage {
        subject: format!("{} {}", prefix, event.title),
        html: layout(&event.title, intro, booking, event, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendeeInfo, BookingRequest, NewEvent};
    use chrono::{NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    fn fixture() -> (Booking, Event) {
        let event = NewEvent {
            organizer_id: None,
            title: "Ngondo Festival".into(),
            description: None,
            category: "culture".into(),
            venue: "Wouri Riverside".into(),
            address: None,
            city: Some("Douala".into()),
            region: None,
            event_date: NaiveDate::from_ymd_opt(2026, 12, 6).unwrap(),
            start_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            end_time: None,
            price: Decimal::new(500000, 2),
            image_url: None,
            max_attendees: 500,
        }
        .into_event(Utc::now());
        let booking = BookingRequest {
            user_id: Uuid::new_v4(),
            event_id: event.id,
            quantity: 2,
            attendee: AttendeeInfo {
                name: "Jean <Mbida>".into(),
                email: "jean@example.cm".into(),
                phone: None,
            },
            booking_reference: "EVZ-20261101-QWERTY".into(),
            ticket_number: "TKT-QWERTY123456".into(),
        }
        .confirm(&event, Utc::now());
        (booking, event)
    }

    #[test]
    fn test_confirmation_in_both_locales() {
        let (booking, event) = fixture();

        let en = booking_confirmation(Locale::En, &booking, &event);
        assert_eq!(en.subject, "Your tickets for Ngondo Festival");
        assert!(en.html.contains("Booking confirmed"));
        assert!(en.html.contains("10000.00 XAF"));
        assert!(en.html.contains("EVZ-20261101-QWERTY"));
        assert!(en.html.contains("Jean &lt;Mbida&gt;"));

        let fr = booking_confirmation(Locale::Fr, &booking, &event);
        assert_eq!(fr.subject, "Vos billets pour Ngondo Festival");
        assert!(fr.html.contains("Réservation confirmée"));
    }

    #[test]
    fn test_reminder_lead_times() {
        let (booking, event) = fixture();
        let day = event_reminder(Locale::En, &booking, &event, ReminderLeadTime::TwentyFourHours);
        let soon = event_reminder(Locale::Fr, &booking, &event, ReminderLeadTime::TwoHours);
        assert_eq!(day.subject, "Tomorrow: Ngondo Festival");
        assert!(day.html.contains("24 hours"));
        assert_eq!(soon.subject, "Bientôt : Ngondo Festival");
        assert!(soon.html.contains("2 heures"));
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!("fr-CM".parse::<Locale>().unwrap(), Locale::Fr);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("de".parse::<Locale>().is_err());
    }
}
