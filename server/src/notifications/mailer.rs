//! Outbound mail transports.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Mutex;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A fully rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Fails with [`ServiceError::Delivery`] when the transport rejects the message.
    async fn deliver(&self, email: &OutboundEmail) -> ServiceResult<()>;
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

/// SMTP delivery through lettre's tokio transport.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Authenticated TLS relay when credentials are set, plain SMTP otherwise
    /// (local catch-all servers such as MailHog).
    pub fn new(settings: &SmtpSettings) -> ServiceResult<Self> {
        let from = format!("{} <{}>", settings.from_name, settings.from_address)
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::Delivery(format!("Invalid from address: {e}")))?;

        let transport = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                    .map_err(|e| ServiceError::Delivery(format!("SMTP relay error: {e}")))?
                    .port(settings.port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .port(settings.port)
                .build(),
        };

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutboundEmail) -> ServiceResult<Message> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::Delivery(format!("Invalid to address: {e}")))?;

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(email.html.clone()));
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                ServiceError::Delivery(format!(
                    "Invalid content type '{}': {e}",
                    attachment.content_type
                ))
            })?;
            body = body.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(body)
            .map_err(|e| ServiceError::Delivery(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &OutboundEmail) -> ServiceResult<()> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| ServiceError::Delivery(format!("Failed to send email: {e}")))?;
        Ok(())
    }
}

/// Logs messages instead of sending them. Used when no SMTP host is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn deliver(&self, email: &OutboundEmail) -> ServiceResult<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            html_bytes = email.html.len(),
            "Email (console transport, not sent)"
        );
        Ok(())
    }
}

/// Keeps every message in memory. Can be told to fail a number of times first.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failures_left: Mutex<u32>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(times),
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn deliver(&self, email: &OutboundEmail) -> ServiceResult<()> {
        let should_fail = match self.failures_left.lock() {
            Ok(mut left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };
        if should_fail {
            return Err(ServiceError::Delivery("simulated transport failure".into()));
        }

        self.sent
            .lock()
            .map_err(|_| ServiceError::Delivery("mailbox lock poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}
