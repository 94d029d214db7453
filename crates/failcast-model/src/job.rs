//! Job configurations, execution records and cluster snapshots
//!
//! Field names follow the JSON files the record store reads, so these types
//! deserialize directly from job and history exports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A job that can be assessed before it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job name
    pub job_name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Cron-style schedule
    #[serde(default)]
    pub schedule: String,
    /// Requested resources
    pub resources: ResourceRequests,
    /// Graph structure
    #[serde(default)]
    pub graph: GraphShape,
    /// Shared storage the job mounts, if any
    #[serde(default)]
    pub storage_mount: Option<StorageMount>,
    /// Service identity the pod runs as
    #[serde(default)]
    pub service_account: Option<String>,
    /// Cloud actions the job needs (e.g. `s3:GetObject`)
    #[serde(default)]
    pub required_permissions: Vec<String>,
    /// Whether the graph deduplicates its input
    #[serde(default)]
    pub dedup_enabled: bool,
}

impl JobConfig {
    /// Create a config with the given name and resources, other fields empty
    #[inline]
    #[must_use]
    pub fn new(job_name: impl Into<String>, resources: ResourceRequests) -> Self {
        Self {
            job_name: job_name.into(),
            description: String::new(),
            schedule: String::new(),
            resources,
            graph: GraphShape::default(),
            storage_mount: None,
            service_account: None,
            required_permissions: Vec::new(),
            dedup_enabled: false,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With schedule
    #[inline]
    #[must_use]
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = schedule.into();
        self
    }

    /// With graph shape
    #[inline]
    #[must_use]
    pub fn with_graph(mut self, components: u32, parallelism: u32) -> Self {
        self.graph = GraphShape {
            components,
            parallelism,
        };
        self
    }

    /// With storage mount
    #[inline]
    #[must_use]
    pub fn with_storage_mount(mut self, mount: StorageMount) -> Self {
        self.storage_mount = Some(mount);
        self
    }

    /// With service account
    #[inline]
    #[must_use]
    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    /// With required permission
    #[inline]
    #[must_use]
    pub fn requires_permission(mut self, action: impl Into<String>) -> Self {
        self.required_permissions.push(action.into());
        self
    }

    /// With deduplication flag
    #[inline]
    #[must_use]
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup_enabled = enabled;
        self
    }
}

/// Resource requests of a job
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequests {
    /// CPU cores requested
    pub cpu_request: f64,
    /// Memory requested in GB
    pub memory_request_gb: f64,
    /// Hard memory limit in GB
    pub memory_limit_gb: f64,
    /// Storage requested in GB
    #[serde(default)]
    pub storage_gb: f64,
}

impl ResourceRequests {
    /// Create requests; the memory limit defaults to the request
    #[inline]
    #[must_use]
    pub fn new(cpu_request: f64, memory_request_gb: f64) -> Self {
        Self {
            cpu_request,
            memory_request_gb,
            memory_limit_gb: memory_request_gb,
            storage_gb: 0.0,
        }
    }

    /// With memory limit
    #[inline]
    #[must_use]
    pub fn with_memory_limit(mut self, limit_gb: f64) -> Self {
        self.memory_limit_gb = limit_gb;
        self
    }

    /// With storage
    #[inline]
    #[must_use]
    pub fn with_storage(mut self, storage_gb: f64) -> Self {
        self.storage_gb = storage_gb;
        self
    }
}

/// Structural metadata of a processing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphShape {
    /// Number of components in the graph
    pub components: u32,
    /// Degree of data parallelism
    pub parallelism: u32,
}

impl Default for GraphShape {
    fn default() -> Self {
        Self {
            components: 1,
            parallelism: 1,
        }
    }
}

/// Shared filesystem mounted into the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMount {
    /// Mount path inside the container
    pub mount_path: String,
    /// Filesystem identifier
    #[serde(default)]
    pub filesystem_id: Option<String>,
}

impl StorageMount {
    /// Create mount at path
    #[inline]
    #[must_use]
    pub fn new(mount_path: impl Into<String>) -> Self {
        Self {
            mount_path: mount_path.into(),
            filesystem_id: None,
        }
    }
}

/// Result of a historical run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Run completed
    Success,
    /// Run failed
    Failed,
}

/// One historical run of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Job the run belongs to
    pub job_name: String,
    /// Start time of the run
    pub execution_date: DateTime<Utc>,
    /// Outcome
    pub status: Outcome,
    /// Failure reason, for failed runs
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Wall-clock duration
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    /// Observed resource usage
    #[serde(default)]
    pub resources_used: ResourceUsage,
    /// Input data characteristics
    #[serde(default)]
    pub input_data: InputProfile,
    /// Free-form diagnostics attached to a failure (exit code, pod, events)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub error_details: BTreeMap<String, serde_json::Value>,
}

impl ExecutionRecord {
    /// Successful run
    #[inline]
    #[must_use]
    pub fn success(job_name: impl Into<String>, execution_date: DateTime<Utc>) -> Self {
        Self {
            job_name: job_name.into(),
            execution_date,
            status: Outcome::Success,
            failure_reason: None,
            duration_minutes: None,
            resources_used: ResourceUsage::default(),
            input_data: InputProfile::default(),
            error_details: BTreeMap::new(),
        }
    }

    /// Failed run with reason
    #[inline]
    #[must_use]
    pub fn failure(
        job_name: impl Into<String>,
        execution_date: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: Outcome::Failed,
            failure_reason: Some(reason.into()),
            ..Self::success(job_name, execution_date)
        }
    }

    /// With observed usage
    #[inline]
    #[must_use]
    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.resources_used = usage;
        self
    }

    /// With input profile
    #[inline]
    #[must_use]
    pub fn with_input(mut self, input: InputProfile) -> Self {
        self.input_data = input;
        self
    }

    /// With one diagnostic entry
    #[inline]
    #[must_use]
    pub fn with_error_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.error_details.insert(key.into(), value.into());
        self
    }

    /// Whether the run failed
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == Outcome::Failed
    }
}

/// Resource usage observed during a run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Peak resident memory in GB
    #[serde(default)]
    pub peak_memory_gb: f64,
    /// Peak CPU cores in use
    #[serde(default, alias = "avg_cpu_cores")]
    pub peak_cpu_cores: f64,
    /// Storage used in GB
    #[serde(default)]
    pub storage_used_gb: f64,
}

impl ResourceUsage {
    /// Create usage snapshot
    #[inline]
    #[must_use]
    pub fn new(peak_memory_gb: f64, peak_cpu_cores: f64, storage_used_gb: f64) -> Self {
        Self {
            peak_memory_gb,
            peak_cpu_cores,
            storage_used_gb,
        }
    }
}

/// Characteristics of a run's input
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputProfile {
    /// Rows read
    #[serde(default)]
    pub row_count: u64,
    /// Fraction of duplicate rows (0.0 - 1.0)
    #[serde(default)]
    pub duplicate_rate: f64,
}

impl InputProfile {
    /// Create input profile
    #[inline]
    #[must_use]
    pub fn new(row_count: u64, duplicate_rate: f64) -> Self {
        Self {
            row_count,
            duplicate_rate,
        }
    }
}

/// Capacity snapshot of the target cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    /// Cluster name
    pub cluster_name: String,
    /// Cloud region
    pub region: String,
    /// CPU cores currently free
    pub available_cpu: f64,
    /// Memory currently free, in GB
    pub available_memory_gb: f64,
}

impl ClusterState {
    /// Create snapshot
    #[inline]
    #[must_use]
    pub fn new(
        cluster_name: impl Into<String>,
        region: impl Into<String>,
        available_cpu: f64,
        available_memory_gb: f64,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            region: region.into(),
            available_cpu,
            available_memory_gb,
        }
    }
}

impl Default for ClusterState {
    /// Single data-processing node group of the production cluster
    fn default() -> Self {
        Self::new("bi-abi-apps-prod", "us-east-1", 20.0, 280.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_config_from_json() {
        let json = r#"{
            "job_name": "customer_dedup",
            "description": "Deduplicate customers",
            "schedule": "0 2 * * *",
            "resources": {"cpu_request": 4, "memory_request_gb": 8, "memory_limit_gb": 16},
            "graph": {"components": 12, "parallelism": 4},
            "storage_mount": {"mount_path": "/data/shared"},
            "required_permissions": ["s3:GetObject"]
        }"#;

        let job: JobConfig = serde_json::from_str(json).unwrap();
        assert_eq!(job.job_name, "customer_dedup");
        assert_eq!(job.resources.memory_limit_gb, 16.0);
        assert_eq!(job.resources.storage_gb, 0.0);
        assert_eq!(job.graph.parallelism, 4);
        assert!(job.service_account.is_none());
        assert!(!job.dedup_enabled);
    }

    #[test]
    fn execution_record_from_json() {
        let json = r#"{
            "job_name": "customer_dedup",
            "execution_date": "2024-10-01T02:00:00Z",
            "status": "FAILED",
            "failure_reason": "OOMKilled",
            "resources_used": {"peak_memory_gb": 16.2, "avg_cpu_cores": 3.5, "storage_used_gb": 40},
            "error_details": {"exit_code": 137, "container": "dedup"}
        }"#;

        let record: ExecutionRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_failure());
        assert_eq!(record.resources_used.peak_cpu_cores, 3.5);
        assert_eq!(record.input_data.duplicate_rate, 0.0);
        assert_eq!(record.error_details["exit_code"], 137);

        let success = ExecutionRecord::success("x", record.execution_date);
        let json = serde_json::to_value(&success).unwrap();
        assert!(json.get("error_details").is_none());
    }

    #[test]
    fn unknown_outcome_rejected() {
        let json = r#"{"job_name": "x", "execution_date": "2024-10-01T02:00:00Z", "status": "RUNNING"}"#;
        assert!(serde_json::from_str::<ExecutionRecord>(json).is_err());
    }

    #[test]
    fn builders() {
        let job = JobConfig::new("etl", ResourceRequests::new(2.0, 4.0).with_memory_limit(6.0))
            .with_graph(8, 2)
            .with_service_account("etl-sa")
            .requires_permission("s3:PutObject")
            .with_dedup(true);

        assert_eq!(job.resources.memory_limit_gb, 6.0);
        assert_eq!(job.required_permissions.len(), 1);
        assert!(job.dedup_enabled);
    }
}
