//! Swap status job
//!
//! The push only carries the sha256 of the swap id, so the job nudges the SDK
//! to sync and then waits for a payment event whose hashed swap id matches.

use super::{Job, JobCompleter, JobContext, JobError, JobId, JobKind, JobOutcome};
use crate::platform::{Notification, PlatformBridge};
use crate::sdk::SdkEvent;
use crate::trigger::SwapUpdatedRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hex sha256 of a swap id, as sent in `swap_updated` pushes
pub fn swap_id_hash(swap_id: &str) -> String {
    hex::encode(Sha256::digest(swap_id.as_bytes()))
}

struct Waiting {
    completer: JobCompleter,
    bridge: Arc<dyn PlatformBridge>,
}

/// Outcome decided before the job body ran
struct Resolution {
    notification: Notification,
    outcome: JobOutcome,
}

/// The job is registered (and sees events) before its body starts, so a
/// matching event can land while it is still pending.
enum Progress {
    Pending(Option<Resolution>),
    Waiting(Waiting),
    Done,
}

pub struct SwapUpdatedJob {
    id: JobId,
    swap_id_hash: String,
    status: String,
    progress: Mutex<Progress>,
}

impl SwapUpdatedJob {
    pub fn new(request: SwapUpdatedRequest) -> Self {
        Self {
            id: JobId::new(),
            swap_id_hash: request.id.to_lowercase(),
            status: request.status,
            progress: Mutex::new(Progress::Pending(None)),
        }
    }

    fn matches(&self, event: &SdkEvent) -> bool {
        event
            .swap_id()
            .map(|swap_id| swap_id_hash(swap_id) == self.swap_id_hash)
            .unwrap_or(false)
    }

    /// First resolution wins; later ones are dropped.
    fn finish(&self, notification: Notification, outcome: JobOutcome) {
        let waiting = {
            let mut progress = self.progress.lock();
            match std::mem::replace(&mut *progress, Progress::Done) {
                Progress::Pending(None) => {
                    debug!("Swap job {} resolved before start", self.id);
                    *progress = Progress::Pending(Some(Resolution {
                        notification,
                        outcome,
                    }));
                    return;
                }
                Progress::Waiting(waiting) => waiting,
                kept => {
                    *progress = kept;
                    return;
                }
            }
        };
        waiting.bridge.show_notification(notification);
        waiting.completer.complete(outcome);
    }
}

#[async_trait]
impl Job for SwapUpdatedJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn kind(&self) -> JobKind {
        JobKind::SwapUpdated
    }

    async fn start(&self, ctx: JobContext, completer: JobCompleter) -> Result<(), JobError> {
        debug!(
            "Swap job {} waiting on {} (status {})",
            self.id, self.swap_id_hash, self.status
        );
        let early = {
            let mut progress = self.progress.lock();
            match std::mem::replace(&mut *progress, Progress::Done) {
                Progress::Pending(None) => {
                    *progress = Progress::Waiting(Waiting {
                        completer,
                        bridge: ctx.bridge.clone(),
                    });
                    None
                }
                Progress::Pending(Some(resolution)) => Some((resolution, completer)),
                kept => {
                    *progress = kept;
                    warn!("Swap job {} started twice", self.id);
                    return Ok(());
                }
            }
        };

        if let Some((resolution, completer)) = early {
            ctx.bridge.show_notification(resolution.notification);
            completer.complete(resolution.outcome);
            return Ok(());
        }

        if let Err(e) = ctx.connection.sync().await {
            warn!("Swap job {} sync failed: {}", self.id, e);
            self.finish(
                Notification::new("Swap update failed", "Could not sync the wallet"),
                JobOutcome::Failed(e.to_string()),
            );
            return Err(e.into());
        }

        Ok(())
    }

    fn on_event(&self, event: &SdkEvent) {
        if !self.matches(event) {
            return;
        }

        match event {
            SdkEvent::PaymentSucceeded { amount_sat, .. } => {
                info!("Swap job {} succeeded", self.id);
                self.finish(
                    Notification::new("Payment succeeded", format!("Swap of {} sat completed", amount_sat)),
                    JobOutcome::Completed,
                );
            }
            SdkEvent::PaymentWaitingConfirmation { .. } => {
                info!("Swap job {} waiting confirmation", self.id);
                self.finish(
                    Notification::new(
                        "Payment waiting confirmation",
                        "Your swap is waiting for on-chain confirmation",
                    ),
                    JobOutcome::Completed,
                );
            }
            SdkEvent::PaymentFailed { reason, .. } => {
                warn!("Swap job {} failed: {}", self.id, reason);
                self.finish(
                    Notification::new("Swap failed", reason.clone()),
                    JobOutcome::Failed(reason.clone()),
                );
            }
            SdkEvent::Synced => {}
        }
    }

    fn on_shutdown(&self) {
        self.finish(
            Notification::new("Swap still pending", "Open the app to finish processing the swap"),
            JobOutcome::Failed("cancelled by shutdown".to_string()),
        );
    }
}
