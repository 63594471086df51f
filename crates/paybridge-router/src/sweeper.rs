//! Background expiry of idle payments.
//!
//! A payment that stays `PENDING` past its `expires_at` is marked `FAILED` with
//! reason `expired`, through the same transition any other caller would use.

use paybridge_types::model::PaymentKey;
use paybridge_types::store::{ConfigStore, PaymentStore};
use paybridge_types::timestamp::UnixTimestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::fees::GasEstimator;
use crate::lifecycle::{LifecycleError, PaymentLifecycle};
use crate::resolver::FeeQuoter;

pub const EXPIRED_REASON: &str = "expired";

/// Payments expired per sweep.
const SWEEP_BATCH: usize = 100;

pub struct ExpirySweeper<C, P, Q, G> {
    lifecycle: Arc<PaymentLifecycle<C, P, Q, G>>,
    payments: P,
    period: Duration,
}

impl<C, P, Q, G> ExpirySweeper<C, P, Q, G>
where
    C: ConfigStore + Clone + 'static,
    P: PaymentStore + Clone + 'static,
    Q: FeeQuoter + 'static,
    G: GasEstimator + 'static,
{
    pub fn new(
        lifecycle: Arc<PaymentLifecycle<C, P, Q, G>>,
        payments: P,
        period: Duration,
    ) -> Self {
        Self {
            lifecycle,
            payments,
            period,
        }
    }

    /// Expires every `PENDING` payment past its deadline at `now`.
    ///
    /// Payments that moved on between the scan and the transition are skipped.
    pub async fn sweep(&self, now: UnixTimestamp) -> Result<Vec<PaymentKey>, LifecycleError> {
        let mut expired = Vec::new();
        loop {
            let batch = self.payments.expired_pending_payments(now, SWEEP_BATCH).await?;
            let batch_len = batch.len();
            let mut progressed = false;
            for id in batch {
                match self.lifecycle.mark_failed(id, EXPIRED_REASON).await {
                    Ok(_) => {
                        expired.push(id);
                        progressed = true;
                    }
                    Err(
                        LifecycleError::InvalidTransition { .. } | LifecycleError::StaleState(_),
                    ) => {
                        tracing::debug!(payment = %id, "Payment changed while expiring, skipped");
                    }
                    Err(err) => return Err(err),
                }
            }
            if batch_len < SWEEP_BATCH || !progressed {
                break;
            }
        }
        Ok(expired)
    }

    /// Sweeps every period until `cancellation_token` fires.
    pub fn spawn(self, task_tracker: &TaskTracker, cancellation_token: CancellationToken) {
        task_tracker.spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        match self.sweep(UnixTimestamp::now()).await {
                            Ok(expired) if !expired.is_empty() => {
                                tracing::info!(count = expired.len(), "Expired pending payments");
                            }
                            Ok(_) => {}
                            Err(err) => tracing::warn!(error = %err, "Expiry sweep failed"),
                        }
                    }
                }
            }
            tracing::debug!("Expiry sweeper stopped");
        });
    }
}
