use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------- SSE event type ----------

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Progress { stage: String },
    Result { data: serde_json::Value },
    Error { message: String },
    Done,
}

impl TaskEvent {
    pub fn to_sse_event(&self) -> Result<Event, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Event::default().data(json))
    }
}

/// How long a finished job stays available for polling.
pub const FINISHED_JOB_TTL: Duration = Duration::from_secs(60 * 60);

// ---------- job status ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Import,
    Delete,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "import",
            JobKind::Delete => "delete",
        }
    }
}

// ---------- job ----------

pub struct Job {
    pub id: String,
    pub kind: JobKind,
    /// Set for imports; at most one running import per layer.
    pub layer_id: Option<Uuid>,
    pub status: JobStatus,
    pub tx: broadcast::Sender<TaskEvent>,
    pub created_at: Instant,
    pub finished_at: Option<Instant>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(kind: JobKind, layer_id: Option<Uuid>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            id: Uuid::now_v7().to_string(),
            kind,
            layer_id,
            status: JobStatus::Running,
            tx,
            created_at: Instant::now(),
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub fn import(layer_id: Uuid) -> Self {
        Self::new(JobKind::Import, Some(layer_id))
    }

    pub fn delete() -> Self {
        Self::new(JobKind::Delete, None)
    }
}

// ---------- job store ----------

/// In-memory registry of import and delete jobs.
/// Enforces one running import per layer.
#[derive(Default)]
pub struct JobStore {
    /// All jobs, running and finished. Finished jobs are kept for polling
    /// until [`FINISHED_JOB_TTL`] has passed.
    jobs: HashMap<String, Job>,
    /// layer_id → job_id for currently running imports.
    active_by_layer: HashMap<Uuid, String>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and return its id.
    /// Returns `Err(existing_job_id)` if an import is already running for the same layer.
    pub fn try_register(&mut self, job: Job) -> Result<String, String> {
        self.evict_finished(Instant::now());

        if let Some(layer_id) = job.layer_id {
            if let Some(existing_id) = self.active_by_layer.get(&layer_id) {
                let is_running = self
                    .jobs
                    .get(existing_id.as_str())
                    .is_some_and(|j| j.status == JobStatus::Running);

                if is_running {
                    return Err(existing_id.clone());
                }
            }
            self.active_by_layer.insert(layer_id, job.id.clone());
        }

        let job_id = job.id.clone();
        self.jobs.insert(job_id.clone(), job);
        Ok(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    /// The running import for a layer, if any.
    pub fn active_for_layer(&self, layer_id: Uuid) -> Option<&Job> {
        self.active_by_layer
            .get(&layer_id)
            .and_then(|id| self.jobs.get(id))
            .filter(|j| j.status == JobStatus::Running)
    }

    /// Mark a job as completed with a result value.
    pub fn complete(&mut self, job_id: &str, result: serde_json::Value) {
        self.finish(job_id, JobStatus::Completed, Some(result), None);
    }

    /// Mark a job as failed. `result` carries the structured outcome when there is one.
    pub fn fail(&mut self, job_id: &str, error: String, result: Option<serde_json::Value>) {
        self.finish(job_id, JobStatus::Failed, result, Some(error));
    }

    fn finish(
        &mut self,
        job_id: &str,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if let Some(job) = self.jobs.get_mut(job_id) {
            job.status = status;
            job.finished_at = Some(Instant::now());
            job.result = result;
            job.error = error;
            if let Some(layer_id) = job.layer_id
                && self.active_by_layer.get(&layer_id).map(String::as_str) == Some(job_id)
            {
                self.active_by_layer.remove(&layer_id);
            }
        }
    }

    /// Drop jobs that finished more than [`FINISHED_JOB_TTL`] before `now`.
    fn evict_finished(&mut self, now: Instant) {
        self.jobs.retain(|_, job| {
            job.finished_at
                .is_none_or(|at| now.saturating_duration_since(at) < FINISHED_JOB_TTL)
        });
    }

    /// Get a broadcast receiver for a job.
    pub fn subscribe(&self, job_id: &str) -> Option<broadcast::Receiver<TaskEvent>> {
        self.jobs.get(job_id).map(|j| j.tx.subscribe())
    }
}
