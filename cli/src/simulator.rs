// Simulated wallet SDK, demo NWC plugin and the script format that drives them

use crate::config::SimulatorConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use walletnotify_core::{
    ConnectRequest, Connection, EventListener, Invoice, Plugin, PluginConfig, PluginError,
    PluginFactory, PluginKind, ReceiveLimits, SdkConnection, SdkError, SdkEvent, TriggerMessage,
    WalletSdk,
};

// ============================================================================
// SCRIPT
// ============================================================================

/// One line of a simulation script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptLine {
    Sleep { sleep_ms: u64 },
    Event { event: SdkEvent },
    Trigger(TriggerMessage),
}

impl ScriptLine {
    /// `None` for blank lines and `#` comments
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let parsed = serde_json::from_str(line)
            .with_context(|| format!("Unrecognized script line: {}", line))?;
        Ok(Some(parsed))
    }
}

// ============================================================================
// SDK
// ============================================================================

pub struct SimulatedSession {
    settings: SimulatorConfig,
    listeners: Mutex<Vec<(String, Arc<dyn EventListener>)>>,
    next_listener: AtomicUsize,
    invoices: AtomicUsize,
    me: Weak<SimulatedSession>,
}

impl SimulatedSession {
    pub fn new(settings: SimulatorConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            settings,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicUsize::new(0),
            invoices: AtomicUsize::new(0),
            me: me.clone(),
        })
    }

    /// Deliver `event` to every registered listener, in registration order.
    pub fn emit(&self, event: SdkEvent) -> usize {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener.on_event(event.clone());
        }
        listeners.len()
    }

    fn schedule_settlements(&self) {
        if self.settings.settle_swaps.is_empty() {
            return;
        }
        let Some(session) = self.me.upgrade() else {
            return;
        };
        let delay = Duration::from_millis(self.settings.settle_delay_ms);
        let swaps = self.settings.settle_swaps.clone();
        let amount_sat = self.settings.settle_amount_sat;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for swap_id in swaps {
                info!("Simulated settlement of swap {}", swap_id);
                session.emit(SdkEvent::PaymentSucceeded {
                    swap_id,
                    amount_sat,
                });
            }
        });
    }
}

#[async_trait]
impl SdkConnection for SimulatedSession {
    fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> Result<String, SdkError> {
        let id = format!("sim-{}", self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id.clone(), listener));
        Ok(id)
    }

    fn remove_event_listener(&self, id: &str) -> Result<(), SdkError> {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| existing != id);
        if listeners.len() == before {
            return Err(SdkError::Generic(format!("unknown listener {}", id)));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SdkError> {
        info!("Simulated wallet disconnected");
        Ok(())
    }

    async fn sync(&self) -> Result<(), SdkError> {
        debug!("Simulated sync");
        self.emit(SdkEvent::Synced);
        self.schedule_settlements();
        Ok(())
    }

    async fn receive_limits(&self) -> Result<ReceiveLimits, SdkError> {
        Ok(ReceiveLimits {
            min_sat: self.settings.min_receive_sat,
            max_sat: self.settings.max_receive_sat,
        })
    }

    async fn receive_payment(&self, amount_sat: u64, description: &str) -> Result<Invoice, SdkError> {
        let n = self.invoices.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated invoice #{} for {} sat ({})", n, amount_sat, description);
        Ok(Invoice {
            bolt11: format!("lnbcrt{}n1psim{:04}", amount_sat, n),
        })
    }
}

pub struct SimulatedSdk {
    session: Arc<SimulatedSession>,
}

impl SimulatedSdk {
    pub fn new(session: Arc<SimulatedSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl WalletSdk for SimulatedSdk {
    async fn connect(&self, request: ConnectRequest) -> Result<Arc<dyn SdkConnection>, SdkError> {
        if request.credentials.mnemonic().split_whitespace().count() < 3 {
            return Err(SdkError::Connect("mnemonic too short".to_string()));
        }
        info!(
            "Simulated wallet connected ({}, {})",
            request.config.network, request.config.working_dir
        );
        Ok(self.session.clone() as Arc<dyn SdkConnection>)
    }
}

// ============================================================================
// DEMO NWC PLUGIN
// ============================================================================

pub struct NwcDemoPlugin {
    relays: Vec<String>,
}

#[async_trait]
impl Plugin for NwcDemoPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Nwc
    }

    fn on_event(&self, event: &SdkEvent) {
        info!("NWC relay {:?} saw {:?}", self.relays, event);
    }

    async fn stop(&self) -> Result<(), PluginError> {
        info!("NWC relay connections closed");
        Ok(())
    }
}

pub struct NwcDemoFactory;

#[async_trait]
impl PluginFactory for NwcDemoFactory {
    fn kind(&self) -> PluginKind {
        PluginKind::Nwc
    }

    async fn create(
        &self,
        connection: &Connection,
        config: &PluginConfig,
    ) -> Result<Arc<dyn Plugin>, PluginError> {
        let PluginConfig::Nwc(nwc) = config;
        if nwc.relay_urls.iter().any(|url| !url.starts_with("wss://")) {
            warn!("NWC relays must use wss://");
            return Err(PluginError::Start("non-wss relay url".to_string()));
        }
        info!(
            "NWC plugin bound to connection {} ({} relay(s))",
            connection.id(),
            nwc.relay_urls.len()
        );
        Ok(Arc::new(NwcDemoPlugin {
            relays: nwc.relay_urls.clone(),
        }))
    }
}
