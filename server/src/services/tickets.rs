//! QR payloads, printable ticket documents and ticket verification.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode, Version};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Booking, BookingStatus, Event, RequestContext};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct TicketConfig {
    /// Base of the verification URL embedded in every QR code.
    pub public_base_url: String,
    /// Largest QR symbol version a payload may need (1-40).
    pub max_qr_version: i16,
    /// Minimum edge of the rendered QR image, in pixels.
    pub qr_min_size: u32,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3001".to_string(),
            max_qr_version: 25,
            qr_min_size: 240,
        }
    }
}

/// What the gate scanner reads back out of the QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    pub booking_id: Uuid,
    pub ticket_number: String,
    pub event_title: String,
    pub venue: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub attendee_name: String,
    pub quantity: i32,
    pub verify_url: String,
}

#[derive(Debug, Clone)]
pub struct TicketQr {
    pub payload: VerificationPayload,
    /// Compact JSON actually encoded in the symbol.
    pub encoded: String,
    pub png: Vec<u8>,
    pub svg: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDocument {
    pub filename: String,
    pub html: String,
}

impl TicketDocument {
    pub const CONTENT_TYPE: &'static str = "text/html; charset=utf-8";

    pub fn bytes(&self) -> &[u8] {
        self.html.as_bytes()
    }
}

/// Stateless ticket renderer. Safe to share across threads and bookings.
#[derive(Debug, Clone, Default)]
pub struct TicketGenerator {
    config: TicketConfig,
}

impl TicketGenerator {
    pub fn new(config: TicketConfig) -> Self {
        Self { config }
    }

    pub fn verify_url(&self, ticket_number: &str) -> String {
        format!(
            "{}/tickets/{}/verify",
            self.config.public_base_url.trim_end_matches('/'),
            ticket_number
        )
    }

    /// Encodes the booking's verification payload as a QR code at error
    /// correction level M, which survives roughly 15% symbol damage.
    pub fn generate_verification_payload(
        &self,
        booking: &Booking,
        event: &Event,
    ) -> ServiceResult<TicketQr> {
        let payload = VerificationPayload {
            booking_id: booking.id,
            ticket_number: booking.ticket_number.clone(),
            event_title: event.title.clone(),
            venue: event.venue.clone(),
            event_date: event.event_date,
            start_time: event.start_time,
            attendee_name: booking.attendee_name.clone(),
            quantity: booking.quantity,
            verify_url: self.verify_url(&booking.ticket_number),
        };
        let encoded = serde_json::to_string(&payload)
            .map_err(|e| ServiceError::Encoding(format!("payload serialization: {e}")))?;

        let code = QrCode::with_error_correction_level(encoded.as_bytes(), EcLevel::M)
            .map_err(|e| ServiceError::Encoding(format!("{} byte payload: {e}", encoded.len())))?;
        let version = match code.version() {
            Version::Normal(v) | Version::Micro(v) => v,
        };
        if version > self.config.max_qr_version {
            return Err(ServiceError::Encoding(format!(
                "payload needs QR version {version}, limit is {}",
                self.config.max_qr_version
            )));
        }

        let size = self.config.qr_min_size;
        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(size, size)
            .build();
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ServiceError::Encoding(format!("png encoding: {e}")))?;

        let svg = code
            .render::<svg::Color>()
            .min_dimensions(size, size)
            .build();

        Ok(TicketQr {
            payload,
            encoded,
            png,
            svg,
        })
    }

    /// Renders the printable single-page ticket. Output depends only on the
    /// inputs, so resending a ticket yields the same bytes.
    pub fn render_ticket_document(
        &self,
        booking: &Booking,
        event: &Event,
        qr: &TicketQr,
    ) -> TicketDocument {
        let qr_src = format!("data:image/png;base64,{}", BASE64.encode(&qr.png));
        let end_time = event
            .end_time
            .map(|t| format!(" - {}", t.format("%H:%M")))
            .unwrap_or_default();
        let location = [event.address.as_deref(), event.city.as_deref(), event.region.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        let unit_price = if booking.quantity > 0 {
            (booking.total_amount / rust_decimal::Decimal::from(booking.quantity)).round_dp(2)
        } else {
            booking.total_amount
        };

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>EventZon ticket {ticket}</title>
    <style>
        @page {{ size: A4; margin: 16mm; }}
        body {{ font-family: Arial, sans-serif; color: #1f2937; }}
        .ticket {{ border: 2px dashed #2563eb; border-radius: 8px; padding: 24px; max-width: 720px; margin: 0 auto; }}
        .row {{ display: flex; justify-content: space-between; gap: 24px; }}
        h1 {{ color: #2563eb; margin: 0 0 8px 0; }}
        h2 {{ font-size: 16px; margin: 20px 0 6px 0; text-transform: uppercase; color: #6b7280; }}
        .qr img {{ width: 200px; height: 200px; }}
        .ref {{ font-family: monospace; font-size: 14px; }}
    </style>
</head>
<body>
<div class="ticket">
    <div class="row">
        <div>
            <h1>{title}</h1>
            <p><strong>{date}</strong> at {start}{end_time}</p>
            <p>{venue}</p>
            <p>{location}</p>
        </div>
        <div class="qr"><img src="{qr_src}" alt="Ticket QR code"></div>
    </div>
    <h2>Attendee</h2>
    <p>{attendee}<br>{email}{phone}</p>
    <h2>Payment</h2>
    <p>{quantity} x {unit_price:.2} {currency}<br><strong>Total: {total:.2} {currency}</strong></p>
    <h2>Booking</h2>
    <p class="ref">Reference: {reference}<br>Ticket: {ticket}<br>Booked: {booked}</p>
    <h2>How to use this ticket</h2>
    <ol>
        <li>Bring this ticket printed or on your phone.</li>
        <li>Present the QR code at the entrance; it admits {quantity} person(s) once.</li>
        <li>The ticket can also be checked at {verify_url}</li>
    </ol>
</div>
</body>
</html>
"#,
            ticket = escape_html(&booking.ticket_number),
            title = escape_html(&event.title),
            date = event.event_date.format("%A %d %B %Y"),
            start = event.start_time.format("%H:%M"),
            end_time = end_time,
            venue = escape_html(&event.venue),
            location = escape_html(&location),
            qr_src = qr_src,
            attendee = escape_html(&booking.attendee_name),
            email = escape_html(&booking.attendee_email),
            phone = booking
                .attendee_phone
                .as_deref()
                .map(|p| format!("<br>{}", escape_html(p)))
                .unwrap_or_default(),
            quantity = booking.quantity,
            unit_price = unit_price,
            currency = escape_html(&booking.currency),
            total = booking.total_amount,
            reference = escape_html(&booking.booking_reference),
            booked = booking.created_at.format("%Y-%m-%d %H:%M UTC"),
            verify_url = escape_html(&qr.payload.verify_url),
        );

        TicketDocument {
            filename: format!("ticket-{}.html", booking.ticket_number),
            html,
        }
    }

    /// QR code and document together, as sent with confirmations.
    pub fn artifacts(
        &self,
        booking: &Booking,
        event: &Event,
    ) -> ServiceResult<(TicketQr, TicketDocument)> {
        let qr = self.generate_verification_payload(booking, event)?;
        let document = self.render_ticket_document(booking, event, &qr);
        Ok((qr, document))
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketEventSummary {
    pub id: Uuid,
    pub title: String,
    pub venue: String,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketVerification {
    pub ticket_number: String,
    pub valid: bool,
    pub status: BookingStatus,
    pub booking_reference: String,
    pub attendee_name: String,
    pub quantity: i32,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub event: TicketEventSummary,
}

#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn Store>,
    generator: TicketGenerator,
}

impl TicketService {
    pub fn new(store: Arc<dyn Store>, generator: TicketGenerator) -> Self {
        Self { store, generator }
    }

    pub fn generator(&self) -> &TicketGenerator {
        &self.generator
    }

    /// Reports whether a scanned ticket number admits its holder right now.
    pub async fn verify_ticket(&self, ticket_number: &str) -> ServiceResult<TicketVerification> {
        let booking = self
            .store
            .find_booking_by_ticket(ticket_number)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidTicket(format!("ticket {} does not exist", ticket_number))
            })?;
        let event = self
            .store
            .get_event(booking.event_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Event {}", booking.event_id)))?;

        Ok(TicketVerification {
            valid: booking.is_valid_for_entry(),
            ticket_number: booking.ticket_number,
            status: booking.status,
            booking_reference: booking.booking_reference,
            attendee_name: booking.attendee_name,
            quantity: booking.quantity,
            checked_in_at: booking.check_in_time,
            event: TicketEventSummary {
                id: event.id,
                title: event.title,
                venue: event.venue,
                event_date: event.event_date,
                start_time: event.start_time,
            },
        })
    }

    /// Printable ticket for one of the caller's bookings.
    pub async fn ticket_document(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
    ) -> ServiceResult<TicketDocument> {
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
        if booking.status == BookingStatus::Cancelled {
            return Err(ServiceError::InvalidTicket(format!(
                "booking {} was cancelled",
                booking.booking_reference
            )));
        }
        let event = self
            .store
            .get_event(booking.event_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Event {}", booking.event_id)))?;

        let generator = self.generator.clone();
        let (_, document) =
            tokio::task::spawn_blocking(move || generator.artifacts(&booking, &event))
                .await
                .map_err(|e| ServiceError::Encoding(format!("ticket rendering task: {e}")))??;
        Ok(document)
    }
}
