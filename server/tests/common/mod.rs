#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use eventzon_server::models::{AttendeeInfo, Event, NewEvent, NewUser, RequestContext, Role, User};
use eventzon_server::store::{MemoryStore, Store};

pub struct Fixture {
    pub store: Arc<dyn Store>,
    pub user: User,
    pub admin: User,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(store: Arc<dyn Store>) -> Self {
        let user = seed_user(&store, "Awa Ndongo", "awa@example.cm", Role::User).await;
        let admin = seed_user(&store, "Gate Staff", "gate@eventzon.cm", Role::Admin).await;
        Self { store, user, admin }
    }

    pub fn user_ctx(&self) -> RequestContext {
        RequestContext::user(self.user.id)
    }

    pub fn admin_ctx(&self) -> RequestContext {
        RequestContext::admin(self.admin.id)
    }

    pub async fn event(&self, event: NewEvent) -> Event {
        self.store.insert_event(event).await.unwrap()
    }

    pub async fn reload(&self, event: &Event) -> Event {
        self.store.get_event(event.id).await.unwrap().unwrap()
    }
}

pub async fn seed_user(store: &Arc<dyn Store>, name: &str, email: &str, role: Role) -> User {
    store
        .insert_user(NewUser {
            name: name.into(),
            email: email.into(),
            phone: None,
            role,
        })
        .await
        .unwrap()
}

pub fn event_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 5).unwrap()
}

/// Noon UTC on the event day.
pub fn event_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 12, 5, 12, 0, 0).unwrap()
}

pub fn new_event(title: &str, max_attendees: i32, price: Decimal) -> NewEvent {
    NewEvent {
        organizer_id: None,
        title: title.into(),
        description: Some("Live music by the river".into()),
        category: "music".into(),
        venue: "Palais des Sports".into(),
        address: None,
        city: Some("Yaoundé".into()),
        region: Some("Centre".into()),
        event_date: event_date(),
        start_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
        end_time: None,
        price,
        image_url: None,
        max_attendees,
    }
}

pub fn attendee() -> AttendeeInfo {
    AttendeeInfo {
        name: "Awa Ndongo".into(),
        email: "awa@example.cm".into(),
        phone: Some("+237 6 99 00 11 22".into()),
    }
}

pub fn xaf(units: i64) -> Decimal {
    Decimal::new(units * 100, 2)
}
