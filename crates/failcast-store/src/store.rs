//! Record store contract

use failcast_model::{ClusterState, ExecutionRecord, JobConfig};

use crate::error::StoreError;

/// Read-only source of job configs, execution history and cluster capacity
///
/// Implementations never mutate during prediction, so one store can be
/// shared by any number of concurrent requests.
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Look up a job by name
    ///
    /// # Errors
    /// - `StoreError::NotFound` if no job has that name
    /// - `StoreError::Unavailable` if the source cannot be read
    fn get_job_config(&self, name: &str) -> Result<JobConfig, StoreError>;

    /// All jobs, in source order
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the source cannot be read
    fn list_jobs(&self) -> Result<Vec<JobConfig>, StoreError>;

    /// Up to `limit` runs of a job, most recent first
    ///
    /// Each call returns a fresh sequence; an unknown job yields an empty one.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the source cannot be read
    fn list_history(&self, job_name: &str, limit: usize)
        -> Result<Vec<ExecutionRecord>, StoreError>;

    /// Every run of every job, most recent first
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the source cannot be read
    fn all_history(&self) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// Current cluster capacity
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the source cannot be read
    fn cluster_state(&self) -> Result<ClusterState, StoreError>;
}

/// Sort runs most recent first; ties keep their input order
pub(crate) fn most_recent_first(records: &mut [ExecutionRecord]) {
    records.sort_by(|a, b| b.execution_date.cmp(&a.execution_date));
}

/// Runs of one job, most recent first, truncated to `limit`
pub(crate) fn select_history(
    records: &[ExecutionRecord],
    job_name: &str,
    limit: usize,
) -> Vec<ExecutionRecord> {
    let mut selected: Vec<_> = records
        .iter()
        .filter(|r| r.job_name == job_name)
        .cloned()
        .collect();
    most_recent_first(&mut selected);
    selected.truncate(limit);
    selected
}
