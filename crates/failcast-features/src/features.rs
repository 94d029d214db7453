//! Feature set types

use chrono::{DateTime, Utc};
use failcast_model::{ClusterState, Confidence, Dimension, Fingerprint, JobConfig, ModelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a predictor may look at for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Job being assessed
    pub job: JobConfig,
    /// Cluster capacity at assessment time
    pub cluster: ClusterState,
    /// Aggregates over the job's history
    pub history: HistoryFeatures,
    /// History coverage
    pub confidence: Confidence,
}

impl FeatureSet {
    /// Fewer records than needed for history-based probabilities
    #[inline]
    #[must_use]
    pub fn is_cold_start(&self) -> bool {
        self.confidence.low_historical_confidence
    }

    /// Largest of requested/available for CPU and memory
    ///
    /// Above 1.0 the request does not fit the free capacity. Zero capacity
    /// with a non-zero request yields infinity.
    #[must_use]
    pub fn capacity_ratio(&self) -> f64 {
        let cpu = ratio(self.job.resources.cpu_request, self.cluster.available_cpu);
        let memory = ratio(
            self.job.resources.memory_request_gb,
            self.cluster.available_memory_gb,
        );
        cpu.max(memory)
    }

    /// Historical peak memory over the configured limit
    #[must_use]
    pub fn memory_limit_ratio(&self) -> Option<f64> {
        if self.is_cold_start() || self.history.peak_memory_max_gb <= 0.0 {
            return None;
        }
        Some(ratio(
            self.history.peak_memory_max_gb,
            self.job.resources.memory_limit_gb,
        ))
    }

    /// Historical peak storage over requested storage
    #[must_use]
    pub fn storage_ratio(&self) -> Option<f64> {
        if self.is_cold_start()
            || self.job.resources.storage_gb <= 0.0
            || self.history.peak_storage_gb <= 0.0
        {
            return None;
        }
        Some(ratio(
            self.history.peak_storage_gb,
            self.job.resources.storage_gb,
        ))
    }

    /// Failures attributed to a dimension
    #[inline]
    #[must_use]
    pub fn failures_in(&self, dimension: Dimension) -> usize {
        self.history
            .failures_by_dimension
            .get(&dimension)
            .copied()
            .unwrap_or(0)
    }

    /// Content fingerprint; equal for equal feature sets
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn fingerprint(&self) -> Result<Fingerprint, ModelError> {
        Fingerprint::of(self)
    }
}

/// Aggregates over a job's execution history
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryFeatures {
    /// Runs considered
    pub records: usize,
    /// Successful runs
    pub successes: usize,
    /// Failed runs
    pub failures: usize,
    /// Failed runs per classified dimension
    pub failures_by_dimension: BTreeMap<Dimension, usize>,
    /// Failed runs whose reason matched no dimension
    pub unclassified_failures: usize,
    /// Highest peak memory of any run, GB
    pub peak_memory_max_gb: f64,
    /// Highest peak CPU of any run, cores
    pub peak_cpu_max: f64,
    /// Highest storage use of any run, GB
    pub peak_storage_gb: f64,
    /// Mean peak memory of successful runs, GB
    pub avg_memory_gb: Option<f64>,
    /// Mean CPU of successful runs, cores
    pub avg_cpu_cores: Option<f64>,
    /// Mean storage of successful runs, GB
    pub avg_storage_gb: Option<f64>,
    /// Highest duplicate rate of any run
    pub max_duplicate_rate: f64,
    /// Mean duplicate rate over all runs
    pub avg_duplicate_rate: f64,
    /// Most recent failures, newest first
    pub recent_failures: Vec<RecentFailure>,
}

/// One recent failure, for context in reports and prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentFailure {
    /// Run start
    pub date: DateTime<Utc>,
    /// Failure reason (or "unknown")
    pub reason: String,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else if numerator > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}
