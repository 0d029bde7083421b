use super::scheduler::ShutdownReason;
use crate::connection::ConnectionManager;
use crate::platform::PlatformBridge;
use crate::plugin::PluginRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Ordered, run-once shutdown: plugins, then connection, then the host.
pub(crate) struct Teardown {
    connection: Arc<ConnectionManager>,
    plugins: Arc<PluginRegistry>,
    bridge: Arc<dyn PlatformBridge>,
    started: AtomicBool,
    terminated: watch::Sender<Option<ShutdownReason>>,
}

impl Teardown {
    pub(crate) fn new(
        connection: Arc<ConnectionManager>,
        plugins: Arc<PluginRegistry>,
        bridge: Arc<dyn PlatformBridge>,
    ) -> Self {
        let (terminated, _) = watch::channel(None);
        Self {
            connection,
            plugins,
            bridge,
            started: AtomicBool::new(false),
            terminated,
        }
    }

    /// Returns `false` if a shutdown already ran or is running.
    pub(crate) async fn shutdown(&self, reason: ShutdownReason) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Shutdown ({}) ignored, already shutting down", reason);
            return false;
        }

        info!("Shutting down ({})", reason);
        self.plugins.stop().await;
        self.connection.close().await;
        self.bridge.on_shutdown_requested(reason);
        self.terminated.send_replace(Some(reason));
        info!("Shutdown complete");
        true
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.terminated.subscribe()
    }
}
