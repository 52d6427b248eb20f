use crate::error::{Error, Result};
use crate::models::domain::{FailureKind, JobId, JobStatus};
use crate::models::dto::{JobSnapshot, StatusReport};
use crate::packets::PacketGraph;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

#[derive(Debug, Clone)]
pub enum JobState {
    Pending,
    Running,
    Completed(Arc<PacketGraph>),
    Failed { kind: FailureKind, message: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Running => JobStatus::Running,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Error,
        }
    }

    fn can_become(&self, next: &JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Completed(_))
                | (JobState::Running, JobState::Failed { .. })
        )
    }
}

#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub id: JobId,
    pub duration_secs: u64,
    pub interface: Option<String>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CaptureJob {
    pub fn new(duration_secs: u64, interface: Option<String>) -> Self {
        Self {
            id: JobId::new(),
            duration_secs,
            interface,
            state: JobState::Pending,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let (failure, error) = match &self.state {
            JobState::Failed { kind, message } => (Some(*kind), Some(message.clone())),
            _ => (None, None),
        };
        JobSnapshot {
            id: self.id,
            status: self.status(),
            duration_seconds: self.duration_secs,
            interface: self.interface.clone(),
            failure,
            error,
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// In-memory job table shared between the manager and its capture tasks.
///
/// Every method takes the lock for one map access and releases it before
/// returning. Only the crate moves jobs between states; everything public
/// is a read.
///
/// ```compile_fail
/// use netmapper::models::domain::JobId;
/// use netmapper::registry::JobRegistry;
///
/// let registry = JobRegistry::new();
/// registry.mark_running(JobId::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, CaptureJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, CaptureJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, job: CaptureJob) {
        self.lock().insert(job.id, job);
    }

    pub(crate) fn mark_running(&self, id: JobId) -> bool {
        self.transition(id, JobState::Running)
    }

    pub(crate) fn complete(&self, id: JobId, graph: Arc<PacketGraph>) -> bool {
        self.transition(id, JobState::Completed(graph))
    }

    pub(crate) fn fail(&self, id: JobId, error: &Error) -> bool {
        self.transition(
            id,
            JobState::Failed {
                kind: error.failure_kind(),
                message: error.to_string(),
            },
        )
    }

    /// Applies `next` if it follows from the job's current state.
    fn transition(&self, id: JobId, next: JobState) -> bool {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(&id) else {
            warn!(job = %id, "Transition to {} for unknown job", next.status());
            return false;
        };
        if !job.state.can_become(&next) {
            warn!(
                job = %id,
                "Ignoring transition {} -> {}",
                job.status(),
                next.status()
            );
            return false;
        }
        if matches!(next, JobState::Completed(_) | JobState::Failed { .. }) {
            job.finished_at = Some(Utc::now());
        }
        job.state = next;
        true
    }

    pub fn status(&self, id: JobId) -> Result<StatusReport> {
        let jobs = self.lock();
        let job = jobs.get(&id).ok_or(Error::JobNotFound(id))?;
        Ok(StatusReport {
            status: job.status(),
            error: job.error().map(str::to_string),
        })
    }

    pub fn result(&self, id: JobId) -> Result<Arc<PacketGraph>> {
        let jobs = self.lock();
        let job = jobs.get(&id).ok_or(Error::JobNotFound(id))?;
        match &job.state {
            JobState::Completed(graph) => Ok(Arc::clone(graph)),
            other => Err(Error::JobNotReady {
                id,
                status: other.status(),
            }),
        }
    }

    pub fn snapshot(&self, id: JobId) -> Result<JobSnapshot> {
        self.lock()
            .get(&id)
            .map(CaptureJob::snapshot)
            .ok_or(Error::JobNotFound(id))
    }
}
