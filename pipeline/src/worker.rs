//! Bounded in-process worker pool for import and delete jobs.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore, broadcast};
use uuid::Uuid;

use crate::jobs::{Job, JobStore, TaskEvent};
use crate::tasks::{ImportStage, Pipeline};

#[derive(Clone)]
pub struct TaskQueue {
    pipeline: Arc<Pipeline>,
    jobs: Arc<Mutex<JobStore>>,
    permits: Arc<Semaphore>,
}

impl TaskQueue {
    pub fn new(pipeline: Arc<Pipeline>, workers: usize) -> Self {
        Self {
            pipeline,
            jobs: Arc::new(Mutex::new(JobStore::new())),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn jobs(&self) -> &Arc<Mutex<JobStore>> {
        &self.jobs
    }

    /// Queue an import and return its job id immediately.
    /// Returns `Err(existing_job_id)` while another import of the layer is running.
    pub async fn enqueue_import(&self, layer_id: Uuid) -> Result<String, String> {
        let job = Job::import(layer_id);
        let tx = job.tx.clone();
        let job_id = self.jobs.lock().await.try_register(job)?;

        tracing::info!(job_id = %job_id, layer_id = %layer_id, "import queued");

        let queue = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            queue.run_import_job(id, layer_id, tx).await;
        });

        Ok(job_id)
    }

    /// Queue teardown of a table and/or catalog entry and return its job id.
    pub async fn enqueue_delete(
        &self,
        table_name: Option<String>,
        catalog_entry: Option<String>,
    ) -> String {
        let job = Job::delete();
        let tx = job.tx.clone();
        // Delete jobs carry no layer key, so registration cannot conflict.
        let job_id = match self.jobs.lock().await.try_register(job) {
            Ok(id) | Err(id) => id,
        };

        tracing::info!(
            job_id = %job_id,
            table = ?table_name,
            entry = ?catalog_entry,
            "delete queued"
        );

        let queue = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            queue
                .run_delete_job(id, table_name, catalog_entry, tx)
                .await;
        });

        job_id
    }

    async fn run_import_job(&self, job_id: String, layer_id: Uuid, tx: broadcast::Sender<TaskEvent>) {
        let send = |event: TaskEvent| {
            let _ = tx.send(event);
        };

        let Ok(_permit) = self.permits.acquire().await else {
            self.fail(&job_id, "worker pool closed".to_string(), None, &tx).await;
            return;
        };

        let progress = |stage: ImportStage| {
            send(TaskEvent::Progress {
                stage: stage.as_str().to_string(),
            });
        };
        let outcome = self.pipeline.run_import(layer_id, &progress).await;
        let data = serde_json::to_value(&outcome).unwrap_or_default();

        if outcome.success {
            tracing::info!(job_id = %job_id, layer_id = %layer_id, geoserver = outcome.geoserver, "import finished");
            send(TaskEvent::Result { data: data.clone() });
            send(TaskEvent::Done);
            self.jobs.lock().await.complete(&job_id, data);
        } else {
            self.fail(&job_id, outcome.message, Some(data), &tx).await;
        }
    }

    async fn run_delete_job(
        &self,
        job_id: String,
        table_name: Option<String>,
        catalog_entry: Option<String>,
        tx: broadcast::Sender<TaskEvent>,
    ) {
        let Ok(_permit) = self.permits.acquire().await else {
            self.fail(&job_id, "worker pool closed".to_string(), None, &tx).await;
            return;
        };

        let outcome = self
            .pipeline
            .run_delete(table_name.as_deref(), catalog_entry.as_deref())
            .await;
        let data = serde_json::to_value(&outcome).unwrap_or_default();

        if outcome.success() {
            let _ = tx.send(TaskEvent::Result { data: data.clone() });
            let _ = tx.send(TaskEvent::Done);
            self.jobs.lock().await.complete(&job_id, data);
        } else {
            let message = [&outcome.catalog, &outcome.table]
                .into_iter()
                .flatten()
                .filter(|s| !s.success)
                .map(|s| s.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            self.fail(&job_id, message, Some(data), &tx).await;
        }
    }

    async fn fail(
        &self,
        job_id: &str,
        message: String,
        data: Option<serde_json::Value>,
        tx: &broadcast::Sender<TaskEvent>,
    ) {
        tracing::warn!(job_id = %job_id, error = %message, "job failed");
        let _ = tx.send(TaskEvent::Error {
            message: message.clone(),
        });
        self.jobs.lock().await.fail(job_id, message, data);
    }
}
