use std::sync::Arc;
use std::time::Duration;

use futures::future::ready;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::{DeliveryError, PushTransport};
use crate::config::PushConfig;
use crate::error::Result;
use crate::models::{DispatchReport, NotificationJob, PushSubscription};
use crate::store::SubscriptionStore;

/// Outcome of one subscription in a pass.
enum Attempt {
    Delivered,
    Pruned(String),
    Failed,
}

pub struct Dispatcher {
    subscriptions: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn PushTransport>,
    timeout: Duration,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn PushTransport>,
        config: &PushConfig,
    ) -> Self {
        Self::with_limits(subscriptions, transport, config.timeout, config.concurrency)
    }

    pub fn with_limits(
        subscriptions: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn PushTransport>,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            subscriptions,
            transport,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Send `job` to every subscription and prune the ones reported gone.
    ///
    /// Fails up front on an invalid job or if `list_all` fails.
    /// Per-subscription failures are counted in the report.
    pub async fn dispatch(&self, job: &NotificationJob) -> Result<DispatchReport> {
        self.dispatch_with_cancel(job, &CancellationToken::new()).await
    }

    /// Like [`dispatch`](Self::dispatch), but stops starting new attempts once
    /// `cancel` fires. Attempts already in flight run to completion; the rest
    /// are reported as `skipped`.
    pub async fn dispatch_with_cancel(
        &self,
        job: &NotificationJob,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport> {
        let payload = job.payload()?;
        let subscriptions = self.subscriptions.list_all()?;
        let total = subscriptions.len();
        if total == 0 {
            tracing::debug!("Dispatch skipped: no subscriptions");
            return Ok(DispatchReport::default());
        }

        let outcomes: Vec<Attempt> = stream::iter(subscriptions)
            .take_while(|_| ready(!cancel.is_cancelled()))
            .map(|subscription| self.attempt(subscription, &payload))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = DispatchReport {
            skipped: total - outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Attempt::Delivered => report.succeeded += 1,
                Attempt::Pruned(endpoint) => {
                    report.failed += 1;
                    report.pruned.push(endpoint);
                }
                Attempt::Failed => report.failed += 1,
            }
        }

        tracing::info!(
            "Dispatch \"{}\": succeeded={}, failed={}, pruned={}, skipped={}",
            job.title,
            report.succeeded,
            report.failed,
            report.pruned.len(),
            report.skipped
        );

        Ok(report)
    }

    async fn attempt(&self, subscription: PushSubscription, payload: &[u8]) -> Attempt {
        let endpoint = subscription.endpoint.as_str();
        let result = match tokio::time::timeout(
            self.timeout,
            self.transport.send(&subscription, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.subscriptions.touch(endpoint) {
                    tracing::warn!("Failed to record delivery to {}: {}", endpoint, e);
                }
                Attempt::Delivered
            }
            Err(e) if e.is_permanent() => match self.subscriptions.remove(endpoint) {
                Ok(()) => {
                    tracing::info!("Pruned subscription {}: {}", endpoint, e);
                    Attempt::Pruned(subscription.endpoint)
                }
                Err(store_err) => {
                    tracing::error!("Failed to prune subscription {}: {}", endpoint, store_err);
                    Attempt::Failed
                }
            },
            Err(e) => {
                tracing::warn!("Delivery to {} failed: {}", endpoint, e);
                Attempt::Failed
            }
        }
    }
}
