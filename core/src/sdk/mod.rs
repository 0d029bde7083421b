//! Wallet SDK boundary
//!
//! The SDK itself is an external collaborator. The coordinator only needs to
//! open one session, subscribe to its event stream and hand the session to jobs
//! for the handful of business calls they make.

pub mod credentials;

pub use credentials::{CredentialStore, Credentials, StaticCredentials};

use crate::config::ConnectionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Not connected")]
    NotConnected,

    #[error("SDK call failed: {0}")]
    Generic(String),
}

/// Event emitted by a live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SdkEvent {
    Synced,
    PaymentWaitingConfirmation { swap_id: String },
    PaymentSucceeded { swap_id: String, amount_sat: u64 },
    PaymentFailed { swap_id: String, reason: String },
}

impl SdkEvent {
    /// Swap the event refers to, if any
    pub fn swap_id(&self) -> Option<&str> {
        match self {
            Self::Synced => None,
            Self::PaymentWaitingConfirmation { swap_id }
            | Self::PaymentSucceeded { swap_id, .. }
            | Self::PaymentFailed { swap_id, .. } => Some(swap_id),
        }
    }
}

/// Receiver for connection events. Called synchronously, in emission order.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: SdkEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLimits {
    pub min_sat: u64,
    pub max_sat: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub bolt11: String,
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub config: ConnectionConfig,
    pub credentials: Credentials,
}

/// A live SDK session
#[async_trait]
pub trait SdkConnection: Send + Sync {
    /// Returns an id usable with [`SdkConnection::remove_event_listener`].
    fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> Result<String, SdkError>;

    fn remove_event_listener(&self, id: &str) -> Result<(), SdkError>;

    async fn disconnect(&self) -> Result<(), SdkError>;

    async fn sync(&self) -> Result<(), SdkError>;

    async fn receive_limits(&self) -> Result<ReceiveLimits, SdkError>;

    async fn receive_payment(&self, amount_sat: u64, description: &str)
        -> Result<Invoice, SdkError>;
}

/// Entry point of the wallet SDK
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletSdk: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> Result<Arc<dyn SdkConnection>, SdkError>;
}
