use std::env;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

use crate::models::CheckInPolicy;
use crate::notifications::{Locale, RetryPolicy, SmtpSettings};
use crate::services::{BookingConfig, TicketConfig};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/eventzon";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3001";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
#[error("invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub production: bool,
    pub cors_allowed_origins: Vec<String>,
    /// `None` means emails are logged instead of sent.
    pub smtp: Option<SmtpSettings>,
    pub mail_locale: Locale,
    pub notification_retry: RetryPolicy,
    pub booking: BookingConfig,
    pub tickets: TicketConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unset or blank keys fall
    /// back to their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_or(&get, "SMTP_PORT", 587u16)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from_address: get("MAIL_FROM_ADDRESS")
                    .unwrap_or_else(|| "no-reply@eventzon.cm".to_string()),
                from_name: get("MAIL_FROM_NAME").unwrap_or_else(|| "EventZon".to_string()),
            }),
            None => None,
        };

        let booking_defaults = BookingConfig::default();
        let booking = BookingConfig {
            reference_attempts: parse_or(&get, "BOOKING_REFERENCE_ATTEMPTS", 5u32)?,
            check_in_policy: parse_or(&get, "CHECK_IN_POLICY", CheckInPolicy::SameDay)?,
            event_utc_offset: parse_or(
                &get,
                "EVENT_UTC_OFFSET",
                booking_defaults.event_utc_offset,
            )?,
        };

        let retry_defaults = RetryPolicy::default();
        let notification_retry = retry_defaults
            .clone()
            .with_max_retries(parse_or(
                &get,
                "NOTIFICATION_MAX_RETRIES",
                retry_defaults.max_retries,
            )?);

        let tickets = TicketConfig {
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            ..TicketConfig::default()
        };

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5u32)?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            production: get("RUST_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            cors_allowed_origins,
            smtp,
            mail_locale: parse_or(&get, "MAIL_LOCALE", Locale::En)?,
            notification_retry,
            booking,
            tickets,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError {
            key,
            value: raw,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
