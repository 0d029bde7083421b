//! Decoded push triggers
//!
//! The push transport delivers `{ kind, payload }`. Payloads often arrive as a
//! JSON document serialized into a string field, so both shapes are accepted.

use crate::job::JobKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const KIND_SWAP_UPDATED: &str = "swap_updated";
pub const KIND_LNURLPAY_INFO: &str = "lnurlpay_info";
pub const KIND_LNURLPAY_INVOICE: &str = "lnurlpay_invoice";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Unrecognized trigger kind: {0}")]
    UnknownKind(String),

    #[error("Malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },
}

/// Raw trigger as handed over by the push transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMessage {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl TriggerMessage {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, TriggerError> {
        serde_json::from_str(json).map_err(|e| TriggerError::Malformed {
            kind: "message".to_string(),
            reason: e.to_string(),
        })
    }
}

/// A swap changed state; `id` is the hex sha256 of the swap id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapUpdatedRequest {
    pub id: String,
    pub status: String,
}

/// LNURL-pay first step (LUD-06): the payer wants our pay parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LnurlPayInfoRequest {
    pub callback_url: String,
    pub reply_url: String,
}

/// LNURL-pay second step: the payer wants an invoice for `amount` msat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LnurlPayInvoiceRequest {
    pub amount: u64,
    pub reply_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    SwapUpdated(SwapUpdatedRequest),
    LnurlPayInfo(LnurlPayInfoRequest),
    LnurlPayInvoice(LnurlPayInvoiceRequest),
}

impl Trigger {
    pub fn decode(message: &TriggerMessage) -> Result<Self, TriggerError> {
        match message.kind.as_str() {
            KIND_SWAP_UPDATED => Ok(Self::SwapUpdated(payload(&message.kind, &message.payload)?)),
            KIND_LNURLPAY_INFO => Ok(Self::LnurlPayInfo(payload(&message.kind, &message.payload)?)),
            KIND_LNURLPAY_INVOICE => Ok(Self::LnurlPayInvoice(payload(
                &message.kind,
                &message.payload,
            )?)),
            other => Err(TriggerError::UnknownKind(other.to_string())),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::SwapUpdated(_) => JobKind::SwapUpdated,
            Self::LnurlPayInfo(_) => JobKind::LnurlPayInfo,
            Self::LnurlPayInvoice(_) => JobKind::LnurlPayInvoice,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwapUpdated(req) => write!(f, "{} ({})", KIND_SWAP_UPDATED, req.status),
            Self::LnurlPayInfo(_) => write!(f, "{}", KIND_LNURLPAY_INFO),
            Self::LnurlPayInvoice(req) => {
                write!(f, "{} ({} msat)", KIND_LNURLPAY_INVOICE, req.amount)
            }
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &str, value: &Value) -> Result<T, TriggerError> {
    let parsed = match value {
        Value::String(inner) => serde_json::from_str(inner),
        other => serde_json::from_value(other.clone()),
    };

    parsed.map_err(|e| TriggerError::Malformed {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_object_payload() {
        let message = TriggerMessage::new(
            KIND_LNURLPAY_INVOICE,
            json!({ "amount": 21000, "reply_url": "https://lnurl.example/reply" }),
        );

        let trigger = Trigger::decode(&message).unwrap();
        assert_eq!(trigger.kind(), JobKind::LnurlPayInvoice);
        assert_eq!(
            trigger,
            Trigger::LnurlPayInvoice(LnurlPayInvoiceRequest {
                amount: 21000,
                reply_url: "https://lnurl.example/reply".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_stringified_payload() {
        let message = TriggerMessage::from_json(
            r#"{"kind":"swap_updated","payload":"{\"id\":\"abc\",\"status\":\"confirmed\"}"}"#,
        )
        .unwrap();

        match Trigger::decode(&message).unwrap() {
            Trigger::SwapUpdated(req) => {
                assert_eq!(req.id, "abc");
                assert_eq!(req.status, "confirmed");
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind() {
        let message = TriggerMessage::new("address_txs_confirmed", json!({}));
        assert_eq!(
            Trigger::decode(&message),
            Err(TriggerError::UnknownKind("address_txs_confirmed".to_string()))
        );
    }

    #[test]
    fn test_malformed_payload() {
        let message = TriggerMessage::new(KIND_LNURLPAY_INFO, json!({ "reply_url": 5 }));
        assert!(matches!(
            Trigger::decode(&message),
            Err(TriggerError::Malformed { kind, .. }) if kind == KIND_LNURLPAY_INFO
        ));
    }

    #[test]
    fn test_display() {
        let trigger = Trigger::SwapUpdated(SwapUpdatedRequest {
            id: "x".to_string(),
            status: "pending".to_string(),
        });
        assert_eq!(trigger.to_string(), "swap_updated (pending)");
    }
}
