use std::sync::Arc;

use crate::notifications::BookingNotifier;
use crate::services::{
    AnalyticsService, BookingConfig, BookingService, CartService, TicketGenerator, TicketService,
};
use crate::store::Store;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub cart: CartService,
    pub bookings: BookingService,
    pub tickets: TicketService,
    pub analytics: AnalyticsService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        booking: BookingConfig,
        generator: TicketGenerator,
        notifier: Option<Arc<dyn BookingNotifier>>,
    ) -> Self {
        let mut bookings = BookingService::new(store.clone(), booking);
        if let Some(notifier) = notifier {
            bookings = bookings.with_notifier(notifier);
        }
        Self {
            cart: CartService::new(store.clone()),
            bookings,
            tickets: TicketService::new(store.clone(), generator),
            analytics: AnalyticsService::new(store),
        }
    }
}
