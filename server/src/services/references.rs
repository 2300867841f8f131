use chrono::{DateTime, Utc};
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const REFERENCE_SUFFIX_LEN: usize = 6;
const TICKET_LEN: usize = 12;

/// Identifiers handed out with a new booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingIdentifiers {
    /// Human-shareable, e.g. `EVZ-20261205-4K9QZD`.
    pub booking_reference: String,
    /// Key encoded in the ticket QR code, e.g. `TKT-7Q2M0XW3KD1B`.
    pub ticket_number: String,
}

pub trait ReferenceGenerator: Send + Sync {
    fn generate(&self, now: DateTime<Utc>) -> BookingIdentifiers;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReferences;

impl ReferenceGenerator for RandomReferences {
    fn generate(&self, now: DateTime<Utc>) -> BookingIdentifiers {
        let mut rng = rand::thread_rng();
        BookingIdentifiers {
            booking_reference: format!(
                "EVZ-{}-{}",
                now.format("%Y%m%d"),
                random_code(&mut rng, REFERENCE_SUFFIX_LEN)
            ),
            ticket_number: format!("TKT-{}", random_code(&mut rng, TICKET_LEN)),
        }
    }
}

fn random_code(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
