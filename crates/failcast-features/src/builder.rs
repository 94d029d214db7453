//! Feature builder
//!
//! Pure function of (config, history, cluster). Records belonging to other
//! jobs are ignored, so callers may pass an unfiltered history.

use failcast_model::{
    ClusterState, Confidence, ExecutionRecord, JobConfig, Outcome, MIN_HISTORY_RECORDS,
};

use crate::classify::classify_failure;
use crate::features::{FeatureSet, HistoryFeatures, RecentFailure};

/// Number of recent failures kept for context
pub const RECENT_FAILURES: usize = 3;

/// Builds [`FeatureSet`]s
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder {
    recent_failures: usize,
}

impl FeatureBuilder {
    /// Create builder with default limits
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `n` recent failures
    #[inline]
    #[must_use]
    pub fn with_recent_failures(mut self, n: usize) -> Self {
        self.recent_failures = n;
        self
    }

    /// Derive features for a job
    ///
    /// `history` is expected most recent first (as the record store returns
    /// it); the recent-failure list follows that order.
    #[must_use]
    pub fn build(
        &self,
        config: &JobConfig,
        history: &[ExecutionRecord],
        cluster: &ClusterState,
    ) -> FeatureSet {
        let runs: Vec<&ExecutionRecord> = history
            .iter()
            .filter(|r| r.job_name == config.job_name)
            .collect();

        let features = FeatureSet {
            job: config.clone(),
            cluster: cluster.clone(),
            history: self.history_features(&runs),
            confidence: Confidence::from_record_count(runs.len()),
        };

        if runs.len() < MIN_HISTORY_RECORDS {
            tracing::debug!(
                job = %config.job_name,
                records = runs.len(),
                "Cold start: history features not used for probabilities"
            );
        }

        features
    }

    fn history_features(&self, runs: &[&ExecutionRecord]) -> HistoryFeatures {
        let mut h = HistoryFeatures {
            records: runs.len(),
            ..HistoryFeatures::default()
        };

        let mut success_memory = 0.0;
        let mut success_cpu = 0.0;
        let mut success_storage = 0.0;
        let mut duplicate_sum = 0.0;

        for run in runs {
            let usage = run.resources_used;
            h.peak_memory_max_gb = h.peak_memory_max_gb.max(usage.peak_memory_gb);
            h.peak_cpu_max = h.peak_cpu_max.max(usage.peak_cpu_cores);
            h.peak_storage_gb = h.peak_storage_gb.max(usage.storage_used_gb);
            h.max_duplicate_rate = h.max_duplicate_rate.max(run.input_data.duplicate_rate);
            duplicate_sum += run.input_data.duplicate_rate;

            match run.status {
                Outcome::Success => {
                    h.successes += 1;
                    success_memory += usage.peak_memory_gb;
                    success_cpu += usage.peak_cpu_cores;
                    success_storage += usage.storage_used_gb;
                }
                Outcome::Failed => {
                    h.failures += 1;
                    let reason = run.failure_reason.as_deref().unwrap_or_default();
                    match classify_failure(reason) {
                        Some(dimension) => {
                            *h.failures_by_dimension.entry(dimension).or_insert(0) += 1;
                        }
                        None => h.unclassified_failures += 1,
                    }
                    if h.recent_failures.len() < self.recent_failures {
                        h.recent_failures.push(RecentFailure {
                            date: run.execution_date,
                            reason: run
                                .failure_reason
                                .clone()
                                .unwrap_or_else(|| "unknown".to_string()),
                        });
                    }
                }
            }
        }

        if h.successes > 0 {
            #[allow(clippy::cast_precision_loss)]
            let n = h.successes as f64;
            h.avg_memory_gb = Some(success_memory / n);
            h.avg_cpu_cores = Some(success_cpu / n);
            h.avg_storage_gb = Some(success_storage / n);
        }
        if !runs.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let n = runs.len() as f64;
            h.avg_duplicate_rate = duplicate_sum / n;
        }

        h
    }
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self {
            recent_failures: RECENT_FAILURES,
        }
    }
}

/// Derive features with the default builder
#[inline]
#[must_use]
pub fn build_features(
    config: &JobConfig,
    history: &[ExecutionRecord],
    cluster: &ClusterState,
) -> FeatureSet {
    FeatureBuilder::default().build(config, history, cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use failcast_model::{Dimension, InputProfile, ResourceRequests, ResourceUsage};

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, d, 2, 0, 0).unwrap()
    }

    fn job() -> JobConfig {
        JobConfig::new(
            "customer_dedup",
            ResourceRequests::new(4.0, 12.0).with_memory_limit(16.0),
        )
    }

    fn history() -> Vec<ExecutionRecord> {
        vec![
            ExecutionRecord::failure("customer_dedup", day(5), "OOMKilled")
                .with_usage(ResourceUsage::new(16.2, 3.9, 40.0)),
            ExecutionRecord::success("customer_dedup", day(4))
                .with_usage(ResourceUsage::new(14.0, 3.0, 30.0))
                .with_input(InputProfile::new(1_000_000, 0.02)),
            ExecutionRecord::failure("customer_dedup", day(3), "EFS mount timeout"),
            ExecutionRecord::success("other_job", day(2))
                .with_usage(ResourceUsage::new(99.0, 99.0, 99.0)),
            ExecutionRecord::success("customer_dedup", day(1))
                .with_usage(ResourceUsage::new(12.0, 2.0, 20.0))
                .with_input(InputProfile::new(900_000, 0.04)),
        ]
    }

    #[test]
    fn aggregates_matching_runs_only() {
        let f = build_features(&job(), &history(), &ClusterState::default());

        assert_eq!(f.history.records, 4);
        assert_eq!(f.history.successes, 2);
        assert_eq!(f.history.failures, 2);
        assert_eq!(f.history.peak_memory_max_gb, 16.2);
        assert_eq!(f.history.avg_memory_gb, Some(13.0));
        assert_eq!(f.history.max_duplicate_rate, 0.04);
        assert_eq!(f.failures_in(Dimension::Memory), 1);
        assert_eq!(f.failures_in(Dimension::StorageMount), 1);
        assert_eq!(f.failures_in(Dimension::Permissions), 0);
        assert!(!f.is_cold_start());
    }

    #[test]
    fn recent_failures_newest_first_and_bounded() {
        let f = FeatureBuilder::new()
            .with_recent_failures(1)
            .build(&job(), &history(), &ClusterState::default());
        assert_eq!(f.history.recent_failures.len(), 1);
        assert_eq!(f.history.recent_failures[0].reason, "OOMKilled");
    }

    #[test]
    fn cold_start_marks_low_confidence() {
        let f = build_features(&job(), &[], &ClusterState::default());
        assert!(f.is_cold_start());
        assert_eq!(f.confidence.score, 0.0);
        assert_eq!(f.history.avg_memory_gb, None);
        assert_eq!(f.memory_limit_ratio(), None);
    }

    #[test]
    fn single_record_is_still_cold_start() {
        let one = vec![ExecutionRecord::success("customer_dedup", day(1))
            .with_usage(ResourceUsage::new(20.0, 1.0, 1.0))];
        let f = build_features(&job(), &one, &ClusterState::default());
        assert!(f.is_cold_start());
        assert_eq!(f.memory_limit_ratio(), None);
    }

    #[test]
    fn capacity_ratio_uses_tighter_resource() {
        let job = JobConfig::new("j", ResourceRequests::new(8.0, 16.0));
        let cluster = ClusterState::new("c", "r", 5.0, 280.0);
        let f = build_features(&job, &[], &cluster);
        assert!((f.capacity_ratio() - 1.6).abs() < 1e-9);

        let empty = ClusterState::new("c", "r", 0.0, 0.0);
        assert!(build_features(&job, &[], &empty).capacity_ratio().is_infinite());
    }

    #[test]
    fn fingerprint_stable() {
        let a = build_features(&job(), &history(), &ClusterState::default());
        let b = build_features(&job(), &history(), &ClusterState::default());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
