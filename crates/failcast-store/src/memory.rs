//! In-memory record store

use failcast_model::{ClusterState, ExecutionRecord, JobConfig};

use crate::error::{RecordKind, StoreError};
use crate::store::{most_recent_first, select_history, RecordStore};

/// Store backed by owned vectors
///
/// Built once, then read-only.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    jobs: Vec<JobConfig>,
    history: Vec<ExecutionRecord>,
    cluster: ClusterState,
}

impl InMemoryStore {
    /// Empty store with the default cluster snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a job
    #[inline]
    #[must_use]
    pub fn with_job(mut self, job: JobConfig) -> Self {
        self.jobs.push(job);
        self
    }

    /// With a historical run
    #[inline]
    #[must_use]
    pub fn with_record(mut self, record: ExecutionRecord) -> Self {
        self.history.push(record);
        self
    }

    /// With several historical runs
    #[inline]
    #[must_use]
    pub fn with_records(mut self, records: impl IntoIterator<Item = ExecutionRecord>) -> Self {
        self.history.extend(records);
        self
    }

    /// With cluster snapshot
    #[inline]
    #[must_use]
    pub fn with_cluster(mut self, cluster: ClusterState) -> Self {
        self.cluster = cluster;
        self
    }

    /// Assemble from loaded parts
    #[inline]
    #[must_use]
    pub fn from_parts(
        jobs: Vec<JobConfig>,
        history: Vec<ExecutionRecord>,
        cluster: ClusterState,
    ) -> Self {
        Self {
            jobs,
            history,
            cluster,
        }
    }
}

impl RecordStore for InMemoryStore {
    fn get_job_config(&self, name: &str) -> Result<JobConfig, StoreError> {
        self.jobs
            .iter()
            .find(|j| j.job_name == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::JobConfig, name))
    }

    fn list_jobs(&self) -> Result<Vec<JobConfig>, StoreError> {
        Ok(self.jobs.clone())
    }

    fn list_history(
        &self,
        job_name: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(select_history(&self.history, job_name, limit))
    }

    fn all_history(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        let mut all = self.history.clone();
        most_recent_first(&mut all);
        Ok(all)
    }

    fn cluster_state(&self) -> Result<ClusterState, StoreError> {
        Ok(self.cluster.clone())
    }
}
