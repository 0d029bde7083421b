//! Fakes shared by unit tests

use crate::connection::Connection;
use crate::platform::{Notification, PlatformBridge};
use crate::sdk::{EventListener, Invoice, ReceiveLimits, SdkConnection, SdkError, SdkEvent};
use crate::service::ShutdownReason;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct FakeSession {
    pub listeners: Mutex<Vec<(String, Arc<dyn EventListener>)>>,
    pub next_listener: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub syncs: AtomicUsize,
    pub invoices: Mutex<Vec<(u64, String)>>,
    pub limits: ReceiveLimits,
    pub fail_calls: bool,
    pub reject_listener: bool,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            syncs: AtomicUsize::new(0),
            invoices: Mutex::new(Vec::new()),
            limits: ReceiveLimits {
                min_sat: 1,
                max_sat: 100_000,
            },
            fail_calls: false,
            reject_listener: false,
        }
    }
}

impl FakeSession {
    pub fn emit(&self, event: SdkEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.on_event(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn check(&self) -> Result<(), SdkError> {
        if self.fail_calls {
            return Err(SdkError::Generic("node unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SdkConnection for FakeSession {
    fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> Result<String, SdkError> {
        if self.reject_listener {
            return Err(SdkError::Generic("listener rejected".to_string()));
        }
        let id = format!("listener-{}", self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id.clone(), listener));
        Ok(id)
    }

    fn remove_event_listener(&self, id: &str) -> Result<(), SdkError> {
        self.listeners.lock().retain(|(existing, _)| existing != id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SdkError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self) -> Result<(), SdkError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn receive_limits(&self) -> Result<ReceiveLimits, SdkError> {
        self.check()?;
        Ok(self.limits)
    }

    async fn receive_payment(&self, amount_sat: u64, description: &str) -> Result<Invoice, SdkError> {
        self.check()?;
        self.invoices.lock().push((amount_sat, description.to_string()));
        Ok(Invoice {
            bolt11: format!("lnbc{}fake", amount_sat),
        })
    }
}

pub(crate) fn connection(session: &Arc<FakeSession>) -> Connection {
    Connection::new(session.clone() as Arc<dyn SdkConnection>)
}

#[derive(Default)]
pub(crate) struct RecordingBridge {
    pub notifications: Mutex<Vec<Notification>>,
    pub replies: Mutex<Vec<(String, serde_json::Value)>>,
    pub shutdowns: Mutex<Vec<ShutdownReason>>,
    pub fail_replies: bool,
}

#[async_trait]
impl PlatformBridge for RecordingBridge {
    fn show_notification(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }

    async fn post_reply(&self, url: &str, body: serde_json::Value) -> Result<(), String> {
        if self.fail_replies {
            return Err("connection refused".to_string());
        }
        self.replies.lock().push((url.to_string(), body));
        Ok(())
    }

    fn on_shutdown_requested(&self, reason: ShutdownReason) {
        self.shutdowns.lock().push(reason);
    }
}
