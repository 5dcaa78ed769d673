//! Background outbox dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use store::{NotificationOutbox, OutboxMessage};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{Mailer, Result};

/// Largest exponent applied to the retry base, so delays stop growing
/// after about two days with the default base.
const MAX_BACKOFF_SHIFT: u32 = 12;

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Poll period when nothing wakes the dispatcher.
    pub poll_interval: Duration,
    /// Messages claimed per round trip.
    pub batch_size: usize,
    /// Attempts before a message is parked as failed.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub retry_base: Duration,
    /// How long a claim hides a message from other dispatchers.
    pub lease: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 20,
            max_attempts: 5,
            retry_base: Duration::from_secs(30),
            lease: Duration::from_secs(60),
        }
    }
}

/// Outcome of one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub claimed: usize,
    pub sent: usize,
    /// Failed and rescheduled.
    pub retried: usize,
    /// Failed for the last time and parked.
    pub dead: usize,
}

/// Drains the notification outbox through a mailer.
pub struct NotificationDispatcher<O, M>
where
    O: NotificationOutbox,
    M: Mailer,
{
    outbox: O,
    mailer: M,
    config: DispatcherConfig,
}

impl<O, M> NotificationDispatcher<O, M>
where
    O: NotificationOutbox,
    M: Mailer,
{
    pub fn new(outbox: O, mailer: M, config: DispatcherConfig) -> Self {
        Self {
            outbox,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Delay before retrying after the given failed attempt (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.config.retry_base.saturating_mul(1 << shift)
    }

    /// Claims one batch of due messages and tries to send each.
    #[tracing::instrument(skip(self))]
    pub async fn deliver_pending(&self) -> Result<DeliveryReport> {
        let batch = self
            .outbox
            .claim_due(self.config.batch_size, self.config.lease)
            .await?;

        let mut report = DeliveryReport {
            claimed: batch.len(),
            ..DeliveryReport::default()
        };
        for message in &batch {
            self.deliver(message, &mut report).await?;
        }

        if report.claimed > 0 {
            tracing::debug!(
                claimed = report.claimed,
                sent = report.sent,
                retried = report.retried,
                dead = report.dead,
                "delivery pass finished"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, message: &OutboxMessage, report: &mut DeliveryReport) -> Result<()> {
        let kind = message.kind.as_str();

        let error = match self.mailer.send(&message.message).await {
            Ok(()) => {
                self.outbox.mark_sent(message.id).await?;
                metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
                tracing::info!(
                    notification_id = %message.id,
                    order_id = %message.order_id,
                    kind,
                    "notification sent"
                );
                report.sent += 1;
                return Ok(());
            }
            Err(e) => e.to_string(),
        };

        metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
        let attempt = message.attempts + 1;

        if attempt >= self.config.max_attempts {
            self.outbox.record_failure(message.id, &error, None).await?;
            tracing::error!(
                notification_id = %message.id,
                order_id = %message.order_id,
                kind,
                attempt,
                error = %error,
                "notification failed permanently"
            );
            report.dead += 1;
        } else {
            let delay = self.retry_delay(attempt);
            let retry_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(1));
            self.outbox
                .record_failure(message.id, &error, Some(retry_at))
                .await?;
            tracing::warn!(
                notification_id = %message.id,
                order_id = %message.order_id,
                kind,
                attempt,
                retry_in_secs = delay.as_secs(),
                error = %error,
                "notification failed, will retry"
            );
            report.retried += 1;
        }
        Ok(())
    }

    /// Delivers batches until the outbox has no more due messages.
    async fn drain(&self) {
        loop {
            match self.deliver_pending().await {
                Ok(report) if report.claimed == self.config.batch_size => continue,
                Ok(_) => break,
                Err(e) => {
                    tracing::error!(error = %e, "notification delivery pass failed");
                    break;
                }
            }
        }
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Drains the outbox on start, on every `wake` and on every poll tick.
    pub async fn run(self, shutdown: CancellationToken, wake: Arc<Notify>) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "notification dispatcher started"
        );

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("notification dispatcher shutting down");
                    break;
                }
                _ = poll.tick() => {}
                _ = wake.notified() => {}
            }
            self.drain().await;
        }

        tracing::info!("notification dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;
    use crate::InMemoryMailer;

    #[test]
    fn test_retry_delay_doubles_per_attempt() {
        let dispatcher = NotificationDispatcher::new(
            InMemoryStore::new(),
            InMemoryMailer::new(),
            DispatcherConfig {
                retry_base: Duration::from_secs(30),
                ..DispatcherConfig::default()
            },
        );

        assert_eq!(dispatcher.retry_delay(1), Duration::from_secs(30));
        assert_eq!(dispatcher.retry_delay(2), Duration::from_secs(60));
        assert_eq!(dispatcher.retry_delay(4), Duration::from_secs(240));
        assert_eq!(
            dispatcher.retry_delay(100),
            Duration::from_secs(30 * (1 << MAX_BACKOFF_SHIFT))
        );
    }

    #[tokio::test]
    async fn test_empty_outbox_reports_nothing() {
        let dispatcher = NotificationDispatcher::new(
            InMemoryStore::new(),
            InMemoryMailer::new(),
            DispatcherConfig::default(),
        );

        let report = dispatcher.deliver_pending().await.unwrap();
        assert_eq!(report, DeliveryReport::default());
    }
}
