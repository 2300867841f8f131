//! Confirmation and reminder emails carrying the ticket.
//!
//! Delivery is best-effort: a booking is final once committed, and a failed
//! email is logged and retried by the [`NotificationQueue`] without ever
//! touching the booking.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Booking, Event};
use crate::services::tickets::{TicketDocument, TicketGenerator, TicketQr};

pub mod mailer;
pub mod queue;
pub mod templates;

pub use mailer::{
    ConsoleMailer, EmailAttachment, Mailer, OutboundEmail, RecordingMailer, SmtpMailer,
    SmtpSettings,
};
pub use queue::{NotificationQueue, RetryPolicy};
pub use templates::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderLeadTime {
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "2h")]
    TwoHours,
}

/// Hook the booking service calls after a booking commits. Must not block.
pub trait BookingNotifier: Send + Sync {
    fn booking_confirmed(&self, booking: &Booking, event: &Event);
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    generator: TicketGenerator,
    locale: Locale,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, generator: TicketGenerator, locale: Locale) -> Self {
        Self {
            mailer,
            generator,
            locale,
        }
    }

    pub fn generator(&self) -> &TicketGenerator {
        &self.generator
    }

    pub async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        event: &Event,
        ticket: &TicketDocument,
        qr: Option<&TicketQr>,
    ) -> ServiceResult<()> {
        let message = templates::booking_confirmation(self.locale, booking, event);
        let email = OutboundEmail {
            to: booking.attendee_email.clone(),
            subject: message.subject,
            html: message.html,
            attachments: attachments(booking, ticket, qr),
        };
        self.mailer.deliver(&email).await?;
        info!(
            booking_id = %booking.id,
            to = %booking.attendee_email,
            "Booking confirmation sent"
        );
        Ok(())
    }

    /// Called by the external scheduler for each booking whose event is due.
    pub async fn send_event_reminder(
        &self,
        booking: &Booking,
        event: &Event,
        lead_time: ReminderLeadTime,
    ) -> ServiceResult<()> {
        let generator = self.generator.clone();
        let (ticket_booking, ticket_event) = (booking.clone(), event.clone());
        let (qr, ticket) = tokio::task::spawn_blocking(move || {
            generator.artifacts(&ticket_booking, &ticket_event)
        })
        .await
        .map_err(|e| ServiceError::Encoding(format!("ticket rendering task: {e}")))??;

        let message = templates::event_reminder(self.locale, booking, event, lead_time);
        let email = OutboundEmail {
            to: booking.attendee_email.clone(),
            subject: message.subject,
            html: message.html,
            attachments: attachments(booking, &ticket, Some(&qr)),
        };
        self.mailer.deliver(&email).await?;
        info!(
            booking_id = %booking.id,
            lead_time = ?lead_time,
            "Event reminder sent"
        );
        Ok(())
    }
}

fn attachments(
    booking: &Booking,
    ticket: &TicketDocument,
    qr: Option<&TicketQr>,
) -> Vec<EmailAttachment> {
    let mut attachments = vec![EmailAttachment {
        filename: ticket.filename.clone(),
        content_type: TicketDocument::CONTENT_TYPE.to_string(),
        bytes: ticket.bytes().to_vec(),
    }];
    if let Some(qr) = qr {
        attachments.push(EmailAttachment {
            filename: format!("qr-{}.png", booking.ticket_number),
            content_type: "image/png".to_string(),
            bytes: qr.png.clone(),
        });
    }
    attachments
}
