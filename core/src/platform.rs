//! Host platform bridge
//!
//! Implemented by the platform layer (Android foreground service, iOS
//! notification service extension, the CLI simulator). Covers the three things
//! jobs and the shutdown path need from the host: user-visible notifications,
//! HTTP replies to LNURL callbacks, and process teardown.

use crate::service::ShutdownReason;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait PlatformBridge: Send + Sync {
    fn show_notification(&self, notification: Notification);

    /// POST `body` as JSON to `url`
    async fn post_reply(&self, url: &str, body: serde_json::Value) -> Result<(), String>;

    /// Stop foreground presentation and let the process exit.
    fn on_shutdown_requested(&self, reason: ShutdownReason);
}
