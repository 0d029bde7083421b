//! Background service coordinator
//!
//! Wires the shared connection, plugins, job registry and shutdown scheduler
//! together and turns host triggers into running jobs.
//!
//! ```text
//! trigger ──> decode ──> connect (once) ──> plugins ──> job ──> registry
//!                                                                  │
//!   connection events ──> EventFanout ──> broadcast ───────────────┘
//!
//! registry membership ──> Reset / ArmEmptyDelay ──> ShutdownScheduler
//!                                                        │
//!                     Teardown: plugins ─> connection ─> host
//! ```

pub mod fanout;
pub mod registry;
pub mod scheduler;
mod teardown;

pub use fanout::EventFanout;
pub use registry::{JobRegistry, JobSummary};
pub use scheduler::{SchedulerHandle, SchedulerState, ShutdownReason};

use crate::config::{ConfigError, ServiceConfig};
use crate::connection::{ConnectionError, ConnectionManager, ConnectionState};
use crate::job::{build_job, JobContext, JobId};
use crate::platform::PlatformBridge;
use crate::plugin::PluginRegistry;
use crate::sdk::{CredentialStore, WalletSdk};
use crate::trigger::{Trigger, TriggerError, TriggerMessage};
use scheduler::ShutdownScheduler;
use std::sync::Arc;
use teardown::Teardown;
use thiserror::Error;
use tracing::{error, info, warn};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error("Connection unavailable: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Service is shut down")]
    ShutDown,
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct Coordinator {
    config: ServiceConfig,
    connection: Arc<ConnectionManager>,
    plugins: Arc<PluginRegistry>,
    registry: Arc<JobRegistry>,
    fanout: Arc<EventFanout>,
    scheduler: SchedulerHandle,
    teardown: Arc<Teardown>,
    bridge: Arc<dyn PlatformBridge>,
}

impl Coordinator {
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: ServiceConfig,
        sdk: Arc<dyn WalletSdk>,
        credentials: Arc<dyn CredentialStore>,
        bridge: Arc<dyn PlatformBridge>,
        plugins: PluginRegistry,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;

        let connection = Arc::new(ConnectionManager::new(sdk, credentials));
        let plugins = Arc::new(plugins);
        let (scheduler, inbox) = scheduler::channel();
        let registry = Arc::new(JobRegistry::new(scheduler.clone()));
        let fanout = Arc::new(EventFanout::new(registry.clone()));
        let teardown = Arc::new(Teardown::new(
            connection.clone(),
            plugins.clone(),
            bridge.clone(),
        ));

        ShutdownScheduler::new(config.timeouts, inbox, registry.clone(), teardown.clone()).spawn();

        info!(
            "Coordinator ready (service timeout {:?}, empty delay {:?})",
            config.timeouts.service_timeout(),
            config.timeouts.empty_delay()
        );

        Ok(Self {
            config,
            connection,
            plugins,
            registry,
            fanout,
            scheduler,
            teardown,
            bridge,
        })
    }

    /// Handle one host trigger. Returns the id of the job it started.
    pub async fn on_trigger(&self, message: &TriggerMessage) -> Result<JobId, CoordinatorError> {
        if self.teardown.is_started() {
            warn!("Ignoring {} trigger, service is shut down", message.kind);
            return Err(CoordinatorError::ShutDown);
        }

        self.scheduler.reset();

        let trigger = match Trigger::decode(message) {
            Ok(trigger) => trigger,
            Err(e) => {
                warn!("Ignoring trigger: {}", e);
                self.registry.arm_if_empty();
                return Err(e.into());
            }
        };
        info!("Received {} trigger", trigger);

        let connection = match self
            .connection
            .connect(&self.config.connection, self.fanout.clone())
            .await
        {
            Ok(connection) => connection,
            Err(ConnectionError::Closed) => {
                warn!("Dropping {} trigger, service shut down while connecting", trigger.kind());
                return Err(CoordinatorError::ShutDown);
            }
            Err(e) => {
                error!("Cannot run {} job: {}", trigger.kind(), e);
                self.registry.arm_if_empty();
                return Err(e.into());
            }
        };
        if self.teardown.is_started() {
            warn!("Dropping {} trigger, service shut down while connecting", trigger.kind());
            return Err(CoordinatorError::ShutDown);
        }

        self.plugins.start_all(&connection, &self.config.plugins).await;
        if self.teardown.is_started() {
            warn!("Dropping {} trigger, service shut down while starting plugins", trigger.kind());
            return Err(CoordinatorError::ShutDown);
        }

        let job = build_job(trigger);
        let id = job.id();
        // A closed registry means shutdown has begun.
        let Some(completer) = self.registry.add(job.clone()) else {
            warn!("Dropping {} job, service is shutting down", job.kind());
            return Err(CoordinatorError::ShutDown);
        };

        let ctx = JobContext {
            connection,
            bridge: self.bridge.clone(),
            lnurl: self.config.lnurl.clone(),
        };
        let registry = self.registry.clone();
        tokio::spawn(async move {
            registry.mark_running(id);
            if let Err(e) = job.start(ctx, completer).await {
                warn!("Job {} ({}) errored: {}", id, job.kind(), e);
            }
        });

        Ok(id)
    }

    /// Host-requested shutdown (idempotent)
    pub async fn shutdown(&self) {
        if self.teardown.is_started() {
            return;
        }
        self.registry.force_shutdown_signal();
        self.scheduler.cancel();
        self.teardown.shutdown(ShutdownReason::Requested).await;
    }

    /// Resolves once the service has shut down, with the reason.
    pub async fn terminated(&self) -> ShutdownReason {
        let mut terminated = self.teardown.subscribe();
        loop {
            if let Some(reason) = *terminated.borrow_and_update() {
                return reason;
            }
            if terminated.changed().await.is_err() {
                return ShutdownReason::Requested;
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.teardown.is_started()
    }

    pub fn active_jobs(&self) -> Vec<JobSummary> {
        self.registry.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Connection events received since start
    pub fn events_dispatched(&self) -> u64 {
        self.fanout.dispatched()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}
