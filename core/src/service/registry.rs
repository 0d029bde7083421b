//! Active job set
//!
//! Membership changes and the scheduler commands they imply are issued inside
//! the same critical section, so the scheduler sees `Reset` / `ArmEmptyDelay`
//! in exactly the order jobs entered and left the set.
//!
//! The set is closed once shutdown begins. A closed set refuses new jobs, so
//! no job can slip in behind the shutdown signal or the teardown.

use super::scheduler::SchedulerHandle;
use crate::job::{Job, JobCompleter, JobId, JobKind, JobOutcome, JobState};
use crate::sdk::SdkEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
}

struct JobEntry {
    id: JobId,
    kind: JobKind,
    state: JobState,
    job: Arc<dyn Job>,
}

#[derive(Default)]
struct JobSet {
    entries: Vec<JobEntry>,
    closed: bool,
}

pub struct JobRegistry {
    jobs: Mutex<JobSet>,
    scheduler: SchedulerHandle,
}

impl JobRegistry {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            jobs: Mutex::new(JobSet::default()),
            scheduler,
        }
    }

    /// Register `job` and hand back its completer, or `None` once the set
    /// is closed.
    ///
    /// The job leaves the set when the completer fires (or is dropped).
    pub fn add(self: &Arc<Self>, job: Arc<dyn Job>) -> Option<JobCompleter> {
        let id = job.id();
        let kind = job.kind();
        let (completer, completion) = JobCompleter::new(id);

        {
            let mut jobs = self.jobs.lock();
            if jobs.closed {
                debug!("Job {} ({}) refused, shutting down", id, kind);
                return None;
            }
            jobs.entries.push(JobEntry {
                id,
                kind,
                state: JobState::Pending,
                job,
            });
            self.scheduler.reset();
            debug!("Job {} ({}) registered, {} active", id, kind, jobs.entries.len());
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = completion
                .await
                .unwrap_or_else(|_| JobOutcome::Failed("completion channel closed".to_string()));
            registry.remove(id, outcome);
        });

        Some(completer)
    }

    pub fn mark_running(&self, id: JobId) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) if entry.state == JobState::Pending => {
                entry.state = JobState::Running;
                true
            }
            _ => false,
        }
    }

    /// Drop a finished job. Arms EmptyDelay when the set becomes empty.
    pub fn remove(&self, id: JobId, outcome: JobOutcome) -> bool {
        let mut jobs = self.jobs.lock();

        let Some(position) = jobs.entries.iter().position(|entry| entry.id == id) else {
            debug!("Job {} already removed", id);
            return false;
        };
        let mut entry = jobs.entries.remove(position);
        entry.state = outcome.final_state();

        match &outcome {
            JobOutcome::Completed => info!("Job {} ({}) completed", entry.id, entry.kind),
            JobOutcome::Failed(reason) => {
                warn!("Job {} ({}) failed: {}", entry.id, entry.kind, reason)
            }
        }

        if jobs.entries.is_empty() && !jobs.closed {
            self.scheduler.arm_empty_delay();
        }
        true
    }

    /// Arm EmptyDelay if no job is active. Used when a trigger produced no job.
    pub fn arm_if_empty(&self) -> bool {
        let jobs = self.jobs.lock();
        if jobs.entries.is_empty() && !jobs.closed {
            self.scheduler.arm_empty_delay();
            true
        } else {
            false
        }
    }

    /// Deliver a connection event to every registered job.
    pub fn broadcast(&self, event: &SdkEvent) {
        let jobs = self.jobs.lock();
        trace!("Dispatching {:?} to {} job(s)", event, jobs.entries.len());
        for entry in jobs.entries.iter() {
            entry.job.on_event(event);
        }
    }

    /// Close the set and ask every active job to wind down.
    ///
    /// Only the call that closes the set signals, so each job sees the
    /// signal at most once. Returns `false` if the set was already closed.
    pub fn force_shutdown_signal(&self) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.closed {
            return false;
        }
        jobs.closed = true;
        if !jobs.entries.is_empty() {
            info!("Signalling shutdown to {} job(s)", jobs.entries.len());
        }
        for entry in jobs.entries.iter() {
            entry.job.on_shutdown();
        }
        true
    }

    /// Close the set if it holds no job. Returns whether it was closed here.
    pub fn close_if_empty(&self) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.closed || !jobs.entries.is_empty() {
            return false;
        }
        jobs.closed = true;
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<JobSummary> {
        self.jobs
            .lock()
            .entries
            .iter()
            .map(|entry| JobSummary {
                id: entry.id,
                kind: entry.kind,
                state: entry.state,
            })
            .collect()
    }
}
