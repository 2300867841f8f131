mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use common::{attendee, new_event, xaf, Fixture};
use eventzon_server::clock::FixedClock;
use eventzon_server::error::ServiceError;
use eventzon_server::models::{Event, RequestContext};
use eventzon_server::services::analytics::UNSPECIFIED;
use eventzon_server::services::{AnalyticsQuery, AnalyticsService, BookingConfig, BookingService};
use eventzon_server::store::DateWindow;

async fn book_on(
    fx: &Fixture,
    event: &Event,
    quantity: i32,
    year: i32,
    month: u32,
    day: u32,
) -> eventzon_server::models::Booking {
    let at = Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap();
    BookingService::new(fx.store.clone(), BookingConfig::default())
        .with_clock(Arc::new(FixedClock(at)))
        .create_booking(&fx.user_ctx(), event.id, quantity, attendee())
        .await
        .unwrap()
}

struct Seeded {
    fx: Fixture,
    yaounde: Event,
    douala: Event,
}

async fn seed() -> Seeded {
    let fx = Fixture::new().await;
    let yaounde = fx.event(new_event("Bikutsi Live", 100, xaf(2000))).await;

    let mut douala_event = new_event("Makossa Night", 100, xaf(5000));
    douala_event.city = Some("Douala".into());
    douala_event.region = Some("Littoral".into());
    douala_event.category = "nightlife".into();
    let douala = fx.event(douala_event).await;

    let mut nowhere = new_event("Online Workshop", 100, xaf(1000));
    nowhere.city = None;
    nowhere.region = None;
    nowhere.category = "education".into();
    let nowhere = fx.event(nowhere).await;

    book_on(&fx, &yaounde, 2, 2026, 1, 10).await;
    book_on(&fx, &yaounde, 1, 2026, 1, 20).await;
    book_on(&fx, &douala, 3, 2026, 3, 5).await;
    book_on(&fx, &nowhere, 1, 2026, 3, 6).await;

    let cancelled = book_on(&fx, &douala, 4, 2026, 3, 7).await;
    BookingService::new(fx.store.clone(), BookingConfig::default())
        .cancel_booking(&fx.user_ctx(), cancelled.id)
        .await
        .unwrap();

    Seeded {
        fx,
        yaounde,
        douala,
    }
}

#[tokio::test]
async fn test_report_over_all_time() {
    let Seeded {
        fx,
        yaounde,
        douala,
    } = seed().await;
    let analytics = AnalyticsService::new(fx.store.clone());

    let report = analytics
        .report(&fx.admin_ctx(), AnalyticsQuery::default())
        .await
        .unwrap();

    assert!(report.warnings.is_empty());
    assert_eq!(report.totals.total_events, 3);
    assert_eq!(report.totals.total_bookings, 4);
    assert_eq!(report.totals.total_tickets, 7);
    // 2*2000 + 1*2000 + 3*5000 + 1*1000
    assert_eq!(report.totals.total_revenue, xaf(22000));
    // Mean of per-booking unit prices: (2000 + 2000 + 5000 + 1000) / 4
    assert_eq!(report.totals.average_ticket_price, xaf(2500));

    assert_eq!(report.top_cities[0].name, "Yaoundé");
    assert_eq!(report.top_cities[0].bookings, 2);
    assert!(report.top_cities.iter().any(|c| c.name == UNSPECIFIED));
    assert!(report.top_regions.iter().any(|r| r.name == "Littoral"));

    assert_eq!(report.top_events_by_revenue[0].event_id, douala.id);
    assert_eq!(report.top_events_by_revenue[0].revenue, xaf(15000));
    assert_eq!(report.top_events_by_revenue[1].event_id, yaounde.id);

    let months: Vec<&str> = report
        .revenue_by_month
        .iter()
        .map(|m| m.month.as_str())
        .collect();
    assert_eq!(months, vec!["2026-01", "2026-03"]);
    assert!(!report.months_gap_filled);
    assert_eq!(report.revenue_by_month[0].revenue, xaf(6000));
    assert_eq!(report.revenue_by_month[1].tickets, 4);
}

#[tokio::test]
async fn test_report_respects_window() {
    let Seeded { fx, .. } = seed().await;
    let analytics = AnalyticsService::new(fx.store.clone());

    let january = AnalyticsQuery {
        window: DateWindow::new(
            NaiveDate::from_ymd_opt(2026, 1, 1),
            NaiveDate::from_ymd_opt(2026, 1, 31),
        ),
        top: 5,
    };
    let report = analytics.report(&fx.admin_ctx(), january).await.unwrap();

    assert_eq!(report.totals.total_bookings, 2);
    assert_eq!(report.totals.total_tickets, 3);
    assert_eq!(report.revenue_by_month.len(), 1);
    assert_eq!(report.top_categories.len(), 1);
    assert_eq!(report.top_categories[0].name, "music");
}

#[tokio::test]
async fn test_top_limits_groups() {
    let Seeded { fx, .. } = seed().await;
    let analytics = AnalyticsService::new(fx.store.clone());

    let report = analytics
        .report(
            &fx.admin_ctx(),
            AnalyticsQuery {
                top: 1,
                ..AnalyticsQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(report.top_cities.len(), 1);
    assert_eq!(report.top_events_by_revenue.len(), 1);
}

#[tokio::test]
async fn test_report_is_admin_only_and_validates_window() {
    let Seeded { fx, .. } = seed().await;
    let analytics = AnalyticsService::new(fx.store.clone());

    let err = analytics
        .report(&RequestContext::user(fx.user.id), AnalyticsQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let backwards = AnalyticsQuery {
        window: DateWindow::new(
            NaiveDate::from_ymd_opt(2026, 3, 1),
            NaiveDate::from_ymd_opt(2026, 1, 1),
        ),
        top: 5,
    };
    let err = analytics
        .report(&fx.admin_ctx(), backwards)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
