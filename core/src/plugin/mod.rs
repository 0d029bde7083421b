//! Auxiliary services bound to the connection
//!
//! Plugins (e.g. the Nostr Wallet Connect relay) are singletons per kind with
//! a lifecycle independent of jobs: started lazily once a connection exists,
//! stopped before the connection is torn down. Stopping is terminal: a
//! registry that has been stopped starts nothing again. Their business logic
//! lives behind [`PluginFactory`]; this module only owns start/stop.

use crate::config::{NwcConfig, PluginConfigs};
use crate::connection::Connection;
use crate::sdk::{EventListener, SdkError, SdkEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Plugin start failed: {0}")]
    Start(String),

    #[error("Listener registration failed: {0}")]
    Listener(#[from] SdkError),
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    Nwc,
}

impl PluginKind {
    pub const ALL: [PluginKind; 1] = [PluginKind::Nwc];
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nwc => write!(f, "nwc"),
        }
    }
}

/// Sub-config selected for one plugin kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginConfig {
    Nwc(NwcConfig),
}

impl PluginConfigs {
    pub fn get(&self, kind: PluginKind) -> Option<PluginConfig> {
        match kind {
            PluginKind::Nwc => self.nwc.clone().map(PluginConfig::Nwc),
        }
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn kind(&self) -> PluginKind;

    fn on_event(&self, event: &SdkEvent);

    async fn stop(&self) -> Result<(), PluginError>;
}

/// Builds a plugin against a live connection
#[async_trait]
pub trait PluginFactory: Send + Sync {
    fn kind(&self) -> PluginKind;

    async fn create(
        &self,
        connection: &Connection,
        config: &PluginConfig,
    ) -> Result<Arc<dyn Plugin>, PluginError>;
}

struct PluginListener(Arc<dyn Plugin>);

impl EventListener for PluginListener {
    fn on_event(&self, event: SdkEvent) {
        self.0.on_event(&event);
    }
}

/// A running plugin
#[derive(Clone)]
pub struct PluginHandle {
    kind: PluginKind,
    plugin: Arc<dyn Plugin>,
    connection: Connection,
    listener_id: String,
}

impl PluginHandle {
    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// Whether both handles point at the same plugin instance
    pub fn same_as(&self, other: &PluginHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.plugin) as *const (),
            Arc::as_ptr(&other.plugin) as *const (),
        )
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("kind", &self.kind)
            .field("connection", &self.connection)
            .field("listener_id", &self.listener_id)
            .finish()
    }
}

// ============================================================================
// PLUGIN REGISTRY
// ============================================================================

#[derive(Default)]
struct Running {
    handles: HashMap<PluginKind, PluginHandle>,
    stopped: bool,
}

pub struct PluginRegistry {
    factories: HashMap<PluginKind, Arc<dyn PluginFactory>>,
    running: Mutex<Running>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            running: Mutex::new(Running::default()),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn register(&mut self, factory: Arc<dyn PluginFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    /// Start the plugin of `kind` unless it is already running.
    ///
    /// A running plugin is returned as is; the config passed here is then
    /// ignored. Returns `None` when there is no sub-config or factory for the
    /// kind, when the factory fails, or once the registry has been stopped.
    pub async fn start(
        &self,
        kind: PluginKind,
        connection: &Connection,
        configs: &PluginConfigs,
    ) -> Option<PluginHandle> {
        let mut running = self.running.lock().await;

        if running.stopped {
            debug!("Plugins stopped, not starting {}", kind);
            return None;
        }
        if let Some(handle) = running.handles.get(&kind) {
            debug!("Plugin {} already started", kind);
            return Some(handle.clone());
        }

        let Some(config) = configs.get(kind) else {
            debug!("No config for plugin {}, not starting", kind);
            return None;
        };
        let Some(factory) = self.factories.get(&kind) else {
            debug!("No factory registered for plugin {}", kind);
            return None;
        };

        match Self::create(factory.as_ref(), kind, connection, &config).await {
            Ok(handle) => {
                info!("Plugin {} started", kind);
                running.handles.insert(kind, handle.clone());
                Some(handle)
            }
            Err(e) => {
                warn!("Plugin {} failed to start: {}", kind, e);
                None
            }
        }
    }

    async fn create(
        factory: &dyn PluginFactory,
        kind: PluginKind,
        connection: &Connection,
        config: &PluginConfig,
    ) -> Result<PluginHandle, PluginError> {
        let plugin = factory.create(connection, config).await?;

        let listener = Arc::new(PluginListener(plugin.clone()));
        let listener_id = match connection.add_event_listener(listener) {
            Ok(id) => id,
            Err(e) => {
                if let Err(stop_err) = plugin.stop().await {
                    warn!("Plugin {} stop after listener failure: {}", kind, stop_err);
                }
                return Err(e.into());
            }
        };

        Ok(PluginHandle {
            kind,
            plugin,
            connection: connection.clone(),
            listener_id,
        })
    }

    /// Start every plugin kind that has a factory
    pub async fn start_all(
        &self,
        connection: &Connection,
        configs: &PluginConfigs,
    ) -> Vec<PluginHandle> {
        let mut started = Vec::new();
        for kind in PluginKind::ALL {
            if !self.factories.contains_key(&kind) {
                continue;
            }
            if let Some(handle) = self.start(kind, connection, configs).await {
                started.push(handle);
            }
        }
        started
    }

    /// Stop and forget every running plugin (idempotent)
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        running.stopped = true;
        if running.handles.is_empty() {
            return;
        }

        let handles: Vec<PluginHandle> = running.handles.drain().map(|(_, handle)| handle).collect();
        futures::future::join_all(handles.iter().map(stop_handle)).await;
    }

    pub async fn handle(&self, kind: PluginKind) -> Option<PluginHandle> {
        self.running.lock().await.handles.get(&kind).cloned()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn stop_handle(handle: &PluginHandle) {
    if let Err(e) = handle.connection.remove_event_listener(&handle.listener_id) {
        warn!("Plugin {} listener removal failed: {}", handle.kind, e);
    }
    match handle.plugin.stop().await {
        Ok(()) => info!("Plugin {} stopped", handle.kind),
        Err(e) => warn!("Plugin {} stop failed: {}", handle.kind, e),
    }
}
