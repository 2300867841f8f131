pub mod analytics;
pub mod booking;
pub mod cart;
pub mod references;
pub mod tickets;

pub use analytics::{AnalyticsQuery, AnalyticsReport, AnalyticsService};
pub use booking::{BookingConfig, BookingService, CheckoutOutcome};
pub use cart::CartService;
pub use references::{BookingIdentifiers, RandomReferences, ReferenceGenerator};
pub use tickets::{TicketConfig, TicketDocument, TicketGenerator, TicketQr, TicketService};
