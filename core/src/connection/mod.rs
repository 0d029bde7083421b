//! Shared SDK connection
//!
//! At most one live session exists per process. `connect` is idempotent: the
//! check and the create happen inside the same critical section, so callers
//! racing on a cold start cause exactly one underlying SDK connect. After
//! [`ConnectionManager::close`] no new session is created.

use crate::config::ConnectionConfig;
use crate::sdk::{ConnectRequest, CredentialStore, EventListener, SdkConnection, SdkError, WalletSdk};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("No wallet credentials available")]
    MissingCredentials,

    #[error("Credential storage error: {0}")]
    Credentials(String),

    #[error("SDK error: {0}")]
    Sdk(#[from] SdkError),

    #[error("Failed to register event listener: {0}")]
    Listener(SdkError),

    #[error("Connection manager is closed")]
    Closed,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

// ============================================================================
// CONNECTION HANDLE
// ============================================================================

/// Cloneable handle to the live session. Clones share identity.
#[derive(Clone)]
pub struct Connection {
    id: Uuid,
    inner: Arc<dyn SdkConnection>,
}

impl Connection {
    pub fn new(inner: Arc<dyn SdkConnection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Deref for Connection {
    type Target = dyn SdkConnection;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

struct LiveConnection {
    connection: Connection,
    listener_id: String,
}

#[derive(Default)]
struct Slot {
    live: Option<LiveConnection>,
    closed: bool,
}

// ============================================================================
// CONNECTION MANAGER
// ============================================================================

pub struct ConnectionManager {
    sdk: Arc<dyn WalletSdk>,
    credentials: Arc<dyn CredentialStore>,
    slot: Mutex<Slot>,
    state: AtomicU8,
}

impl ConnectionManager {
    pub fn new(sdk: Arc<dyn WalletSdk>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            sdk,
            credentials,
            slot: Mutex::new(Slot::default()),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
        }
    }

    /// Return the shared connection, connecting first if there is none.
    ///
    /// `listener` is registered only when a new session is created. A failed
    /// connect leaves the manager `Disconnected` and is not retried. Fails
    /// with [`ConnectionError::Closed`] once the manager is closed.
    pub async fn connect(
        &self,
        config: &ConnectionConfig,
        listener: Arc<dyn EventListener>,
    ) -> Result<Connection, ConnectionError> {
        let mut slot = self.slot.lock().await;

        if slot.closed {
            debug!("Connect refused, connection manager closed");
            return Err(ConnectionError::Closed);
        }
        if let Some(live) = slot.live.as_ref() {
            info!("Already connected ({})", live.connection.id());
            return Ok(live.connection.clone());
        }

        self.set_state(ConnectionState::Connecting);
        debug!("Connecting to wallet SDK ({})", config.network);

        match self.establish(config, listener).await {
            Ok(live) => {
                let connection = live.connection.clone();
                slot.live = Some(live);
                self.set_state(ConnectionState::Connected);
                info!("Connected ({})", connection.id());
                Ok(connection)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                error!("Failed to connect: {}", e);
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        config: &ConnectionConfig,
        listener: Arc<dyn EventListener>,
    ) -> Result<LiveConnection, ConnectionError> {
        let credentials = self
            .credentials
            .load()
            .map_err(ConnectionError::Credentials)?
            .ok_or(ConnectionError::MissingCredentials)?;

        let session = self
            .sdk
            .connect(ConnectRequest {
                config: config.clone(),
                credentials,
            })
            .await?;

        let listener_id = match session.add_event_listener(listener) {
            Ok(id) => id,
            Err(e) => {
                if let Err(disconnect_err) = session.disconnect().await {
                    warn!("Disconnect after listener failure: {}", disconnect_err);
                }
                return Err(ConnectionError::Listener(e));
            }
        };

        Ok(LiveConnection {
            connection: Connection::new(session),
            listener_id,
        })
    }

    /// Tear down the session if there is one (idempotent)
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        Self::disconnect_slot(&mut slot).await;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Disconnect and refuse every later `connect`.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        slot.closed = true;
        Self::disconnect_slot(&mut slot).await;
        self.set_state(ConnectionState::Disconnected);
    }

    async fn disconnect_slot(slot: &mut Slot) {
        let Some(live) = slot.live.take() else {
            debug!("Disconnect requested while not connected");
            return;
        };

        if let Err(e) = live.connection.remove_event_listener(&live.listener_id) {
            warn!("Failed to remove event listener: {}", e);
        }
        if let Err(e) = live.connection.disconnect().await {
            warn!("SDK disconnect failed: {}", e);
        }
        info!("Disconnected ({})", live.connection.id());
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Current connection without connecting
    pub async fn current(&self) -> Option<Connection> {
        self.slot
            .lock()
            .await
            .live
            .as_ref()
            .map(|live| live.connection.clone())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}
