//! Dual-timer shutdown watchdog
//!
//! Two independent deadlines decide when the background process may end:
//!
//! - **ServiceTimeout**: hard limit, re-armed by every trigger. When it fires,
//!   active jobs get a cooperative shutdown signal and the service shuts down
//!   regardless of their state.
//! - **EmptyDelay**: grace period armed when the job set becomes empty and
//!   cancelled by the next reset.
//!
//! Both live inside a single actor task. Commands arrive over an unbounded
//! channel in the order the registry and coordinator issue them, so timer
//! state always follows job-set membership.

use super::registry::JobRegistry;
use super::teardown::Teardown;
use crate::config::ShutdownTimeouts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// Hard service timeout elapsed
    ServiceTimeout,
    /// No jobs for the grace period
    EmptyDelay,
    /// Host asked for shutdown
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceTimeout => write!(f, "service timeout"),
            Self::EmptyDelay => write!(f, "empty delay"),
            Self::Requested => write!(f, "requested"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Reset,
    ArmEmptyDelay,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed {
        service_deadline: Instant,
        empty_deadline: Option<Instant>,
    },
    Fired(ShutdownReason),
    Cancelled,
}

// ============================================================================
// HANDLE
// ============================================================================

/// Cheap, cloneable front of the scheduler actor
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    state: watch::Receiver<SchedulerState>,
}

/// Receiving half, consumed by [`ShutdownScheduler::new`]
pub struct SchedulerInbox {
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    state: watch::Sender<SchedulerState>,
}

pub fn channel() -> (SchedulerHandle, SchedulerInbox) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
    (
        SchedulerHandle {
            commands: command_tx,
            state: state_rx,
        },
        SchedulerInbox {
            commands: command_rx,
            state: state_tx,
        },
    )
}

impl SchedulerHandle {
    /// New work arrived: cancel EmptyDelay, re-arm ServiceTimeout.
    pub fn reset(&self) {
        self.send(SchedulerCommand::Reset);
    }

    /// The job set became empty.
    pub fn arm_empty_delay(&self) {
        self.send(SchedulerCommand::ArmEmptyDelay);
    }

    /// Stop the actor without shutting down.
    pub fn cancel(&self) {
        self.send(SchedulerCommand::Cancel);
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    fn send(&self, command: SchedulerCommand) {
        if self.commands.send(command).is_err() {
            trace!("Scheduler gone, dropping {:?}", command);
        }
    }
}

#[cfg(test)]
impl SchedulerInbox {
    pub(crate) fn try_recv(&mut self) -> Option<SchedulerCommand> {
        self.commands.try_recv().ok()
    }
}

// ============================================================================
// ACTOR
// ============================================================================

pub struct ShutdownScheduler {
    timeouts: ShutdownTimeouts,
    inbox: SchedulerInbox,
    registry: Arc<JobRegistry>,
    teardown: Arc<Teardown>,
    service_deadline: Option<Instant>,
    empty_deadline: Option<Instant>,
}

impl ShutdownScheduler {
    pub(crate) fn new(
        timeouts: ShutdownTimeouts,
        inbox: SchedulerInbox,
        registry: Arc<JobRegistry>,
        teardown: Arc<Teardown>,
    ) -> Self {
        Self {
            timeouts,
            inbox,
            registry,
            teardown,
            service_deadline: None,
            empty_deadline: None,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            let service_deadline = self.service_deadline;
            let empty_deadline = self.empty_deadline;

            tokio::select! {
                biased;

                command = self.inbox.commands.recv() => match command {
                    Some(SchedulerCommand::Reset) => self.reset(),
                    Some(SchedulerCommand::ArmEmptyDelay) => self.arm_empty_delay(),
                    Some(SchedulerCommand::Cancel) | None => {
                        debug!("Shutdown scheduler cancelled");
                        self.publish(SchedulerState::Cancelled);
                        return;
                    }
                },
                _ = wait_until(service_deadline) => {
                    self.fire_service_timeout().await;
                    return;
                }
                _ = wait_until(empty_deadline) => {
                    if self.fire_empty_delay().await {
                        return;
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        if self.empty_deadline.take().is_some() {
            debug!("Delayed shutdown cancelled by new work");
        }
        self.service_deadline = Some(Instant::now() + self.timeouts.service_timeout());
        trace!("Service timeout armed ({:?})", self.timeouts.service_timeout());
        self.publish_armed();
    }

    fn arm_empty_delay(&mut self) {
        if self.service_deadline.is_none() {
            debug!("Service timeout not pending, not arming empty delay");
            return;
        }
        self.empty_deadline = Some(Instant::now() + self.timeouts.empty_delay());
        debug!("No active jobs, shutting down in {:?}", self.timeouts.empty_delay());
        self.publish_armed();
    }

    async fn fire_service_timeout(&mut self) {
        info!(
            "Service timeout reached with {} active job(s)",
            self.registry.len()
        );
        self.registry.force_shutdown_signal();
        self.publish(SchedulerState::Fired(ShutdownReason::ServiceTimeout));
        self.teardown.shutdown(ShutdownReason::ServiceTimeout).await;
    }

    /// Returns `true` once the service has been shut down.
    async fn fire_empty_delay(&mut self) -> bool {
        self.empty_deadline = None;

        if !self.registry.close_if_empty() {
            debug!("Empty delay elapsed but jobs are active or shutdown is underway");
            self.publish_armed();
            return false;
        }

        info!("No jobs for {:?}, shutting down", self.timeouts.empty_delay());
        self.publish(SchedulerState::Fired(ShutdownReason::EmptyDelay));
        self.teardown.shutdown(ShutdownReason::EmptyDelay).await;
        true
    }

    fn publish_armed(&self) {
        if let Some(service_deadline) = self.service_deadline {
            self.publish(SchedulerState::Armed {
                service_deadline,
                empty_deadline: self.empty_deadline,
            });
        }
    }

    fn publish(&self, state: SchedulerState) {
        self.inbox.state.send_replace(state);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
