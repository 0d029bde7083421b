//! LNURL-pay jobs (LUD-06)
//!
//! Both steps answer the payer's LNURL service by POSTing to the `reply_url`
//! carried in the push. Errors are answered with the LUD-06 error body so the
//! payer's wallet is not left hanging.

use super::{Job, JobCompleter, JobContext, JobError, JobId, JobKind, JobOutcome};
use crate::platform::Notification;
use crate::sdk::SdkEvent;
use crate::trigger::{LnurlPayInfoRequest, LnurlPayInvoiceRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const MSAT_PER_SAT: u64 = 1_000;

/// `metadata` string for a payRequest: a JSON array serialized to a string.
pub fn pay_metadata(description: &str) -> String {
    json!([["text/plain", description]]).to_string()
}

fn error_body(reason: &str) -> Value {
    json!({ "status": "ERROR", "reason": reason })
}

/// Report a failure to the payer and the user, then signal completion.
async fn settle(
    ctx: &JobContext,
    reply_url: &str,
    failure_title: &str,
    result: &Result<(), JobError>,
    completer: JobCompleter,
) {
    if let Err(e) = result {
        // A failed reply cannot be answered with another reply.
        if !matches!(e, JobError::Reply(_)) {
            if let Err(reply_err) = ctx.bridge.post_reply(reply_url, error_body(&e.to_string())).await {
                warn!("Failed to post LNURL error reply: {}", reply_err);
            }
        }
        ctx.bridge
            .show_notification(Notification::new(failure_title, e.to_string()));
    }
    completer.complete(JobOutcome::from(result));
}

// ============================================================================
// PAY INFO
// ============================================================================

pub struct LnurlPayInfoJob {
    id: JobId,
    request: LnurlPayInfoRequest,
}

impl LnurlPayInfoJob {
    pub fn new(request: LnurlPayInfoRequest) -> Self {
        Self {
            id: JobId::new(),
            request,
        }
    }

    async fn respond(&self, ctx: &JobContext) -> Result<(), JobError> {
        let limits = ctx.connection.receive_limits().await?;

        let body = json!({
            "callback": self.request.callback_url,
            "maxSendable": limits.max_sat.saturating_mul(MSAT_PER_SAT),
            "minSendable": limits.min_sat.saturating_mul(MSAT_PER_SAT),
            "metadata": pay_metadata(&ctx.lnurl.description),
            "tag": "payRequest",
        });

        ctx.bridge
            .post_reply(&self.request.reply_url, body)
            .await
            .map_err(JobError::Reply)
    }
}

#[async_trait]
impl Job for LnurlPayInfoJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn kind(&self) -> JobKind {
        JobKind::LnurlPayInfo
    }

    async fn start(&self, ctx: JobContext, completer: JobCompleter) -> Result<(), JobError> {
        let result = self.respond(&ctx).await;
        if result.is_ok() {
            info!("Pay info job {} replied", self.id);
        }
        settle(&ctx, &self.request.reply_url, "Receive payment failed", &result, completer).await;
        result
    }

    fn on_event(&self, _event: &SdkEvent) {}

    fn on_shutdown(&self) {
        debug!("Pay info job {} asked to shut down", self.id);
    }
}

// ============================================================================
// PAY INVOICE
// ============================================================================

pub struct LnurlPayInvoiceJob {
    id: JobId,
    request: LnurlPayInvoiceRequest,
}

impl LnurlPayInvoiceJob {
    pub fn new(request: LnurlPayInvoiceRequest) -> Self {
        Self {
            id: JobId::new(),
            request,
        }
    }

    async fn respond(&self, ctx: &JobContext) -> Result<(), JobError> {
        let amount_sat = self.request.amount / MSAT_PER_SAT;
        let limits = ctx.connection.receive_limits().await?;

        if amount_sat < limits.min_sat || amount_sat > limits.max_sat {
            return Err(JobError::InvalidRequest(format!(
                "Amount {} sat outside of [{}, {}]",
                amount_sat, limits.min_sat, limits.max_sat
            )));
        }

        let invoice = ctx
            .connection
            .receive_payment(amount_sat, &ctx.lnurl.description)
            .await?;

        ctx.bridge
            .post_reply(
                &self.request.reply_url,
                json!({ "pr": invoice.bolt11, "routes": [] }),
            )
            .await
            .map_err(JobError::Reply)
    }
}

#[async_trait]
impl Job for LnurlPayInvoiceJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn kind(&self) -> JobKind {
        JobKind::LnurlPayInvoice
    }

    async fn start(&self, ctx: JobContext, completer: JobCompleter) -> Result<(), JobError> {
        let result = self.respond(&ctx).await;
        if result.is_ok() {
            info!("Invoice job {} replied", self.id);
        }
        settle(&ctx, &self.request.reply_url, "Invoice request failed", &result, completer).await;
        result
    }

    fn on_event(&self, _event: &SdkEvent) {}

    fn on_shutdown(&self) {
        debug!("Invoice job {} asked to shut down", self.id);
    }
}
