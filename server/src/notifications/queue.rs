//! Background delivery of booking emails with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{BookingNotifier, NotificationDispatcher, ReminderLeadTime};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Booking, Event};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of retries. Returns the last error on failure.
    pub async fn run<F, Fut>(&self, mut operation: F) -> ServiceResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<()>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt = attempt + 1, ?delay, error = %err, "Retrying delivery");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug)]
enum NotificationJob {
    Confirmation {
        booking: Booking,
        event: Event,
    },
    Reminder {
        booking: Booking,
        event: Event,
        lead_time: ReminderLeadTime,
    },
}

/// Handle to the delivery worker. Cheap to clone; the worker stops once every
/// handle is dropped and the backlog is drained.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationQueue {
    pub fn spawn(dispatcher: NotificationDispatcher, retry: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(receiver, dispatcher, retry));
        (Self { sender }, worker)
    }

    pub fn enqueue_confirmation(&self, booking: Booking, event: Event) {
        self.enqueue(NotificationJob::Confirmation { booking, event });
    }

    pub fn enqueue_reminder(&self, booking: Booking, event: Event, lead_time: ReminderLeadTime) {
        self.enqueue(NotificationJob::Reminder {
            booking,
            event,
            lead_time,
        });
    }

    fn enqueue(&self, job: NotificationJob) {
        if let Err(err) = self.sender.send(job) {
            warn!(error = %err, "Notification worker is gone, email dropped");
        }
    }
}

impl BookingNotifier for NotificationQueue {
    fn booking_confirmed(&self, booking: &Booking, event: &Event) {
        self.enqueue_confirmation(booking.clone(), event.clone());
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<NotificationJob>,
    dispatcher: NotificationDispatcher,
    retry: RetryPolicy,
) {
    while let Some(job) = receiver.recv().await {
        match job {
            NotificationJob::Confirmation { booking, event } => {
                let outcome = deliver_confirmation(&dispatcher, &retry, &booking, &event).await;
                if let Err(err) = outcome {
                    warn!(
                        booking_id = %booking.id,
                        error = %err,
                        "Booking confirmation not delivered"
                    );
                }
            }
            NotificationJob::Reminder {
                booking,
                event,
                lead_time,
            } => {
                let outcome = retry
                    .run(|| dispatcher.send_event_reminder(&booking, &event, lead_time))
                    .await;
                if let Err(err) = outcome {
                    warn!(
                        booking_id = %booking.id,
                        error = %err,
                        "Event reminder not delivered"
                    );
                }
            }
        }
    }
    debug!("Notification worker stopped");
}

async fn deliver_confirmation(
    dispatcher: &NotificationDispatcher,
    retry: &RetryPolicy,
    booking: &Booking,
    event: &Event,
) -> ServiceResult<()> {
    let generator = dispatcher.generator().clone();
    let (ticket_booking, ticket_event) = (booking.clone(), event.clone());
    let (qr, ticket) =
        tokio::task::spawn_blocking(move || generator.artifacts(&ticket_booking, &ticket_event))
            .await
            .map_err(|e| ServiceError::Encoding(format!("ticket rendering task: {e}")))??;

    retry
        .run(|| dispatcher.send_booking_confirmation(booking, event, &ticket, Some(&qr)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_run_retries_delivery_errors() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ServiceError::Delivery("timeout".into()))
                } else {
                    Ok(())
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(2)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Delivery("refused".into()))
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Delivery(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_validation() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(5)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Validation("bad address".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
