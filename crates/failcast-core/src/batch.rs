//! Concurrent predictions with per-request cancellation

use failcast_predict::RequestId;
use futures::future::{abortable, AbortHandle, Aborted};
use tokio::task::JoinHandle;

use crate::error::FailcastError;
use crate::pipeline::{Pipeline, Prediction};

/// Handle to one spawned prediction
#[derive(Debug)]
pub struct PredictionHandle {
    request_id: RequestId,
    job_name: String,
    abort: AbortHandle,
    task: JoinHandle<Result<Result<Prediction, FailcastError>, Aborted>>,
}

impl PredictionHandle {
    /// Request id of the prediction
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Job being assessed
    #[inline]
    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Canceller that can outlive the handle
    #[inline]
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Cancel the prediction; the request is recorded as failed
    #[inline]
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Wait for the outcome
    ///
    /// # Errors
    /// - `Cancelled` if the prediction was cancelled
    /// - `Task` if the task panicked
    /// - whatever the pipeline returned
    pub async fn join(self) -> Result<Prediction, FailcastError> {
        match self.task.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(Aborted)) => Err(FailcastError::Cancelled(self.request_id)),
            Err(err) if err.is_cancelled() => Err(FailcastError::Cancelled(self.request_id)),
            Err(err) => Err(FailcastError::Task {
                job: self.job_name,
                reason: err.to_string(),
            }),
        }
    }
}

/// Spawn one prediction on the runtime
#[must_use]
pub fn spawn_prediction(pipeline: &Pipeline, job_name: impl Into<String>) -> PredictionHandle {
    let request_id = RequestId::new();
    let job_name = job_name.into();

    let worker = pipeline.clone();
    let job = job_name.clone();
    let (future, abort) =
        abortable(async move { worker.assess_with_id(request_id, &job).await });

    tracing::debug!(request = %request_id, job = %job_name, "Spawned prediction");
    PredictionHandle {
        request_id,
        job_name,
        abort,
        task: tokio::spawn(future),
    }
}

/// Spawn a prediction per job
#[must_use]
pub fn spawn_batch<I, S>(pipeline: &Pipeline, jobs: I) -> Vec<PredictionHandle>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    jobs.into_iter()
        .map(|job| spawn_prediction(pipeline, job))
        .collect()
}

/// Outcome of one batch entry
#[derive(Debug)]
pub struct BatchEntry {
    /// Job assessed
    pub job_name: String,
    /// Request id
    pub request_id: RequestId,
    /// Outcome
    pub outcome: Result<Prediction, FailcastError>,
}

/// Wait for every handle, in submission order
pub async fn join_batch(handles: Vec<PredictionHandle>) -> Vec<BatchEntry> {
    let mut entries = Vec::with_capacity(handles.len());
    for handle in handles {
        let job_name = handle.job_name.clone();
        let request_id = handle.request_id;
        let outcome = handle.join().await;
        if let Err(err) = &outcome {
            tracing::warn!(job = %job_name, stage = %err.stage(), error = %err, "Batch entry failed");
        }
        entries.push(BatchEntry {
            job_name,
            request_id,
            outcome,
        });
    }
    entries
}
