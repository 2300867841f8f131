mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{attendee, event_day, new_event, xaf, Fixture};
use eventzon_server::clock::FixedClock;
use eventzon_server::notifications::{
    Locale, NotificationDispatcher, NotificationQueue, RecordingMailer, ReminderLeadTime,
    RetryPolicy,
};
use eventzon_server::services::{BookingConfig, BookingService, TicketGenerator};

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn queue_with(
    mailer: Arc<RecordingMailer>,
    locale: Locale,
    retry: RetryPolicy,
) -> (NotificationQueue, tokio::task::JoinHandle<()>) {
    let dispatcher = NotificationDispatcher::new(mailer, TicketGenerator::default(), locale);
    NotificationQueue::spawn(dispatcher, retry)
}

#[tokio::test]
async fn test_confirmation_sent_with_ticket_attachments() {
    let fx = Fixture::new().await;
    let event = fx.event(new_event("Makossa Night", 10, xaf(5000))).await;
    let mailer = Arc::new(RecordingMailer::new());
    let (queue, worker) = queue_with(mailer.clone(), Locale::En, fast_retry(0));

    let service = BookingService::new(fx.store.clone(), BookingConfig::default())
        .with_clock(Arc::new(FixedClock(event_day())))
        .with_notifier(Arc::new(queue.clone()));
    let booking = service
        .create_booking(&fx.user_ctx(), event.id, 2, attendee())
        .await
        .unwrap();

    drop(service);
    drop(queue);
    worker.await.unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "awa@example.cm");
    assert_eq!(sent[0].subject, "Your tickets for Makossa Night");
    assert!(sent[0].html.contains(&booking.booking_reference));

    let names: Vec<String> = sent[0]
        .attachments
        .iter()
        .map(|a| a.filename.clone())
        .collect();
    assert_eq!(
        names,
        vec![
            format!("ticket-{}.html", booking.ticket_number),
            format!("qr-{}.png", booking.ticket_number),
        ]
    );
    assert!(sent[0].attachments[1].bytes.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_transient_delivery_failures_are_retried() {
    let fx = Fixture::new().await;
    let event = fx.event(new_event("Jazz Brunch", 10, xaf(2500))).await;
    let mailer = Arc::new(RecordingMailer::failing(2));
    let (queue, worker) = queue_with(mailer.clone(), Locale::Fr, fast_retry(3));

    let service = BookingService::new(fx.store.clone(), BookingConfig::default())
        .with_notifier(Arc::new(queue.clone()));
    service
        .create_booking(&fx.user_ctx(), event.id, 1, attendee())
        .await
        .unwrap();

    drop(service);
    drop(queue);
    worker.await.unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Vos billets pour Jazz Brunch");
}

#[tokio::test]
async fn test_failed_delivery_keeps_booking() {
    let fx = Fixture::new().await;
    let event = fx.event(new_event("Comedy Club", 10, xaf(2000))).await;
    let mailer = Arc::new(RecordingMailer::failing(100));
    let (queue, worker) = queue_with(mailer.clone(), Locale::En, fast_retry(2));

    let service = BookingService::new(fx.store.clone(), BookingConfig::default())
        .with_notifier(Arc::new(queue.clone()));
    let booking = service
        .create_booking(&fx.user_ctx(), event.id, 3, attendee())
        .await
        .unwrap();

    drop(service);
    drop(queue);
    worker.await.unwrap();

    assert!(mailer.sent().is_empty());
    assert!(fx.store.get_booking(booking.id).await.unwrap().is_some());
    assert_eq!(fx.reload(&event).await.available_tickets, 7);
}

#[tokio::test]
async fn test_reminder_uses_lead_time() {
    let fx = Fixture::new().await;
    let event = fx.event(new_event("Gospel Concert", 10, xaf(4000))).await;
    let booking = BookingService::new(fx.store.clone(), BookingConfig::default())
        .create_booking(&fx.user_ctx(), event.id, 1, attendee())
        .await
        .unwrap();

    let mailer = Arc::new(RecordingMailer::new());
    let (queue, worker) = queue_with(mailer.clone(), Locale::En, fast_retry(0));
    queue.enqueue_reminder(booking, event, ReminderLeadTime::TwentyFourHours);
    drop(queue);
    worker.await.unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Tomorrow: Gospel Concert");
    assert_eq!(sent[0].attachments.len(), 2);
}
