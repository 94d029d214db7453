//! File-backed record store
//!
//! Reads three exports once at open time:
//! - job configurations: JSON `{"jobs": [...]}`
//! - execution history: JSON `{"job_execution_history": [...]}`
//! - cluster capacity: YAML with `cluster_info` and `node_groups`
//!
//! The cluster file is optional. When it is missing the store falls back to
//! [`ClusterState::default`] and logs a warning.

use std::fs;
use std::path::{Path, PathBuf};

use failcast_model::{ClusterState, ExecutionRecord, JobConfig};
use serde::{Deserialize, Serialize};

use crate::error::{RecordKind, StoreError};
use crate::memory::InMemoryStore;
use crate::store::RecordStore;

/// Default job config file name
pub const JOBS_FILE: &str = "job_configs.json";
/// Default history file name
pub const HISTORY_FILE: &str = "job_history.json";
/// Default cluster file name
pub const CLUSTER_FILE: &str = "cluster.yaml";

/// Locations of the store's source files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    /// Job configurations (JSON)
    pub jobs: PathBuf,
    /// Execution history (JSON)
    pub history: PathBuf,
    /// Cluster capacity (YAML)
    pub cluster: PathBuf,
}

impl DataPaths {
    /// Default file names inside a directory
    #[inline]
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            jobs: dir.join(JOBS_FILE),
            history: dir.join(HISTORY_FILE),
            cluster: dir.join(CLUSTER_FILE),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::in_dir("data")
    }
}

#[derive(Debug, Deserialize)]
struct JobsFile {
    jobs: Vec<JobConfig>,
}

/// Execution history export layout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryFile {
    /// Runs, in any order
    pub job_execution_history: Vec<ExecutionRecord>,
}

/// Cluster export layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterFile {
    /// Cluster identity
    pub cluster_info: ClusterInfo,
    /// Node groups with free capacity
    #[serde(default)]
    pub node_groups: Vec<NodeGroup>,
}

/// Cluster identity block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name
    pub cluster_name: String,
    /// Region
    #[serde(default)]
    pub region: String,
}

/// Free capacity of one node group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    /// Node group name
    pub name: String,
    /// Free CPU cores
    pub available_cpu: f64,
    /// Free memory in GiB
    pub available_memory_gi: f64,
}

impl ClusterFile {
    /// Collapse into a snapshot
    ///
    /// A job's pods land in one node group, so each resource is the largest
    /// amount any single group has free, not the cluster total.
    #[must_use]
    pub fn into_state(self) -> ClusterState {
        let cpu = self.node_groups.iter().map(|g| g.available_cpu).fold(0.0, f64::max);
        let memory = self
            .node_groups
            .iter()
            .map(|g| g.available_memory_gi)
            .fold(0.0, f64::max);
        ClusterState::new(
            self.cluster_info.cluster_name,
            self.cluster_info.region,
            cpu,
            memory,
        )
    }

    /// Single node group file for a snapshot
    #[must_use]
    pub fn from_state(state: &ClusterState, node_group: impl Into<String>) -> Self {
        Self {
            cluster_info: ClusterInfo {
                cluster_name: state.cluster_name.clone(),
                region: state.region.clone(),
            },
            node_groups: vec![NodeGroup {
                name: node_group.into(),
                available_cpu: state.available_cpu,
                available_memory_gi: state.available_memory_gb,
            }],
        }
    }
}

/// Store loaded from exported files
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: DataPaths,
    inner: InMemoryStore,
}

impl FileStore {
    /// Load all source files
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the job or history file is missing
    /// or malformed, or if the cluster file exists but is malformed
    pub fn open(paths: DataPaths) -> Result<Self, StoreError> {
        let jobs: JobsFile = read_json(&paths.jobs, RecordKind::JobConfig)?;
        let history: HistoryFile = read_json(&paths.history, RecordKind::History)?;
        let cluster = read_cluster(&paths.cluster)?;

        tracing::info!(
            jobs = jobs.jobs.len(),
            executions = history.job_execution_history.len(),
            cluster = %cluster.cluster_name,
            "Loaded record store"
        );

        Ok(Self {
            inner: InMemoryStore::from_parts(jobs.jobs, history.job_execution_history, cluster),
            paths,
        })
    }

    /// Source file locations
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }
}

impl RecordStore for FileStore {
    fn get_job_config(&self, name: &str) -> Result<JobConfig, StoreError> {
        self.inner.get_job_config(name)
    }

    fn list_jobs(&self) -> Result<Vec<JobConfig>, StoreError> {
        self.inner.list_jobs()
    }

    fn list_history(
        &self,
        job_name: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.inner.list_history(job_name, limit)
    }

    fn all_history(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.inner.all_history()
    }

    fn cluster_state(&self) -> Result<ClusterState, StoreError> {
        self.inner.cluster_state()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, kind: RecordKind) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::unavailable(kind, path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::unavailable(kind, path, e))
}

fn read_cluster(path: &Path) -> Result<ClusterState, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "Cluster file not found, using default cluster snapshot"
            );
            return Ok(ClusterState::default());
        }
        Err(e) => return Err(StoreError::unavailable(RecordKind::Cluster, path, e)),
    };

    let file: ClusterFile = serde_yaml::from_str(&content)
        .map_err(|e| StoreError::unavailable(RecordKind::Cluster, path, e))?;
    Ok(file.into_state())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_file_uses_largest_node_group() {
        let yaml = r"
cluster_info:
  cluster_name: prod
  region: eu-west-1
node_groups:
  - name: a
    available_cpu: 12
    available_memory_gi: 100
  - name: b
    available_cpu: 8
    available_memory_gi: 60.5
";
        let file: ClusterFile = serde_yaml::from_str(yaml).unwrap();
        let state = file.into_state();
        assert_eq!(state.cluster_name, "prod");
        assert_eq!(state.available_cpu, 12.0);
        assert_eq!(state.available_memory_gb, 100.0);
    }

    #[test]
    fn cluster_file_roundtrip_through_state() {
        let state = ClusterState::new("c", "r", 5.0, 64.0);
        let file = ClusterFile::from_state(&state, "ng");
        assert_eq!(file.into_state(), state);
    }

    #[test]
    fn data_paths_in_dir() {
        let paths = DataPaths::in_dir("/srv/failcast");
        assert_eq!(paths.jobs, PathBuf::from("/srv/failcast/job_configs.json"));
        assert_eq!(paths.cluster, PathBuf::from("/srv/failcast/cluster.yaml"));
    }
}
