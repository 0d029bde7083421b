//! Shared fakes for the integration tests
//!
//! Every fake appends to one [`Journal`] so tests can assert the order in
//! which collaborators were called.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use walletnotify_core::job::swap_id_hash;
use walletnotify_core::{
    ConnectRequest, Connection, Coordinator, Credentials, EventListener, Invoice, Notification,
    PlatformBridge, Plugin, PluginConfig, PluginError, PluginFactory, PluginKind, PluginRegistry,
    ReceiveLimits, SdkConnection, SdkError, SdkEvent, ServiceConfig, ShutdownReason,
    ShutdownTimeouts, StaticCredentials, TriggerMessage, WalletSdk,
};

#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == entry).count()
    }
}

// ============================================================================
// SDK
// ============================================================================

pub struct FakeSession {
    journal: Arc<Journal>,
    listeners: Mutex<Vec<(String, Arc<dyn EventListener>)>>,
    next_listener: AtomicUsize,
}

impl FakeSession {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicUsize::new(0),
        }
    }

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
}

#[async_trait]
impl SdkConnection for FakeSession {
    fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> Result<String, SdkError> {
        let id = format!("listener-{}", self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id.clone(), listener));
        Ok(id)
    }

    fn remove_event_listener(&self, id: &str) -> Result<(), SdkError> {
        self.listeners.lock().retain(|(existing, _)| existing != id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SdkError> {
        self.journal.record("sdk.disconnect");
        Ok(())
    }

    async fn sync(&self) -> Result<(), SdkError> {
        self.journal.record("sdk.sync");
        Ok(())
    }

    async fn receive_limits(&self) -> Result<ReceiveLimits, SdkError> {
        Ok(ReceiveLimits {
            min_sat: 1,
            max_sat: 1_000_000,
        })
    }

    async fn receive_payment(&self, amount_sat: u64, _description: &str) -> Result<Invoice, SdkError> {
        Ok(Invoice {
            bolt11: format!("lnbc{}test", amount_sat),
        })
    }
}

pub struct FakeSdk {
    pub session: Arc<FakeSession>,
    pub connects: AtomicUsize,
    pub connect_delay: Duration,
    pub failures_left: AtomicUsize,
}

impl FakeSdk {
    pub fn new(session: Arc<FakeSession>) -> Self {
        Self {
            session,
            connects: AtomicUsize::new(0),
            connect_delay: Duration::ZERO,
            failures_left: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSdk for FakeSdk {
    async fn connect(&self, request: ConnectRequest) -> Result<Arc<dyn SdkConnection>, SdkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.credentials.mnemonic(), "abandon abandon about");

        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SdkError::Connect("node offline".to_string()));
        }
        Ok(self.session.clone() as Arc<dyn SdkConnection>)
    }
}

// ============================================================================
// HOST
// ============================================================================

pub struct RecordingBridge {
    journal: Arc<Journal>,
    pub notifications: Mutex<Vec<Notification>>,
    pub replies: Mutex<Vec<(String, Value)>>,
    pub shutdowns: Mutex<Vec<ShutdownReason>>,
}

impl RecordingBridge {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            notifications: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            shutdowns: Mutex::new(Vec::new()),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

#[async_trait]
impl PlatformBridge for RecordingBridge {
    fn show_notification(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }

    async fn post_reply(&self, url: &str, body: Value) -> Result<(), String> {
        self.replies.lock().push((url.to_string(), body));
        Ok(())
    }

    fn on_shutdown_requested(&self, reason: ShutdownReason) {
        self.journal.record("host.shutdown");
        self.shutdowns.lock().push(reason);
    }
}

// ============================================================================
// PLUGIN
// ============================================================================

pub struct JournalPlugin {
    journal: Arc<Journal>,
}

#[async_trait]
impl Plugin for JournalPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Nwc
    }

    fn on_event(&self, _event: &SdkEvent) {}

    async fn stop(&self) -> Result<(), PluginError> {
        self.journal.record("plugin.stop");
        Ok(())
    }
}

pub struct JournalPluginFactory {
    journal: Arc<Journal>,
}

#[async_trait]
impl PluginFactory for JournalPluginFactory {
    fn kind(&self) -> PluginKind {
        PluginKind::Nwc
    }

    async fn create(
        &self,
        _connection: &Connection,
        _config: &PluginConfig,
    ) -> Result<Arc<dyn Plugin>, PluginError> {
        self.journal.record("plugin.start");
        Ok(Arc::new(JournalPlugin {
            journal: self.journal.clone(),
        }))
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct Harness {
    pub coordinator: Coordinator,
    pub sdk: Arc<FakeSdk>,
    pub session: Arc<FakeSession>,
    pub bridge: Arc<RecordingBridge>,
    pub journal: Arc<Journal>,
}

pub struct HarnessBuilder {
    config: ServiceConfig,
    connect_delay: Duration,
    connect_failures: usize,
    with_plugin: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
            connect_delay: Duration::ZERO,
            connect_failures: 0,
            with_plugin: false,
        }
    }

    pub fn timeouts(mut self, service_timeout_ms: u64, empty_delay_ms: u64) -> Self {
        self.config.timeouts = ShutdownTimeouts {
            service_timeout_ms,
            empty_delay_ms,
        };
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn connect_failures(mut self, failures: usize) -> Self {
        self.connect_failures = failures;
        self
    }

    pub fn with_nwc_plugin(mut self) -> Self {
        self.with_plugin = true;
        self.config.plugins.nwc = Some(walletnotify_core::NwcConfig {
            relay_urls: vec!["wss://relay.test".to_string()],
            secret_key: None,
        });
        self
    }

    pub fn build(self) -> Harness {
        let journal = Arc::new(Journal::default());
        let session = Arc::new(FakeSession::new(journal.clone()));
        let mut sdk = FakeSdk::new(session.clone());
        sdk.connect_delay = self.connect_delay;
        sdk.failures_left = AtomicUsize::new(self.connect_failures);
        let sdk = Arc::new(sdk);
        let bridge = Arc::new(RecordingBridge::new(journal.clone()));

        let mut plugins = PluginRegistry::new();
        if self.with_plugin {
            plugins.register(Arc::new(JournalPluginFactory {
                journal: journal.clone(),
            }));
        }

        let coordinator = Coordinator::new(
            self.config,
            sdk.clone(),
            Arc::new(StaticCredentials::new(Credentials::new("abandon abandon about"))),
            bridge.clone(),
            plugins,
        )
        .expect("valid test config");

        Harness {
            coordinator,
            sdk,
            session,
            bridge,
            journal,
        }
    }
}

// ============================================================================
// TRIGGERS & EVENTS
// ============================================================================

pub fn swap_trigger(swap_id: &str) -> TriggerMessage {
    TriggerMessage::new(
        "swap_updated",
        json!({ "id": swap_id_hash(swap_id), "status": "transaction_confirmed" }),
    )
}

pub fn pay_info_trigger() -> TriggerMessage {
    TriggerMessage::new(
        "lnurlpay_info",
        json!({
            "callback_url": "https://lnurl.test/callback",
            "reply_url": "https://lnurl.test/reply"
        }),
    )
}

pub fn swap_succeeded(swap_id: &str) -> SdkEvent {
    SdkEvent::PaymentSucceeded {
        swap_id: swap_id.to_string(),
        amount_sat: 50_000,
    }
}

/// Let spawned job bodies and reapers run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
