//! Rule-based predictor
//!
//! Deterministic: the same feature set always yields the same assessment.
//! History terms are only applied outside cold start; a cold-start job is
//! judged on its configuration and the cluster snapshot alone.

use async_trait::async_trait;
use failcast_features::FeatureSet;
use failcast_model::{
    AssessmentSource, Dimension, DimensionAssessment, Probability, RiskAssessment,
};
use std::collections::BTreeMap;

use crate::error::PredictError;
use crate::predictor::Predictor;

/// Working set assumed per component per parallel task, GB
pub const COLD_START_GB_PER_TASK: f64 = 0.25;

/// Assesses jobs with fixed rules
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl HeuristicPredictor {
    /// Create predictor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Assess synchronously
    ///
    /// # Errors
    /// Returns error only if the assessment violates a model invariant
    pub fn assess(&self, features: &FeatureSet) -> Result<RiskAssessment, PredictError> {
        let mut dimensions = BTreeMap::new();
        dimensions.insert(Dimension::Scheduling, scheduling(features));
        dimensions.insert(Dimension::StorageMount, storage_mount(features));
        dimensions.insert(Dimension::Memory, memory(features));
        dimensions.insert(Dimension::Permissions, permissions(features));
        dimensions.insert(Dimension::DataQuality, data_quality(features));

        let assessment = RiskAssessment::from_dimensions(
            features.job.job_name.clone(),
            dimensions,
            features.confidence,
            AssessmentSource::Heuristic,
        )?;

        tracing::debug!(
            job = %assessment.job_name,
            severity = %assessment.overall.severity,
            probability = %assessment.overall.probability,
            "Heuristic assessment"
        );
        Ok(assessment)
    }
}

#[async_trait]
impl Predictor for HeuristicPredictor {
    async fn predict(&self, features: &FeatureSet) -> Result<RiskAssessment, PredictError> {
        self.assess(features)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

#[allow(clippy::cast_precision_loss)]
fn per_failure(features: &FeatureSet, dimension: Dimension, step: f64, cap: f64) -> f64 {
    if features.is_cold_start() {
        return 0.0;
    }
    (features.failures_in(dimension) as f64 * step).min(cap)
}

fn scheduling(f: &FeatureSet) -> DimensionAssessment {
    let ratio = f.capacity_ratio();
    let base = if ratio > 1.0 {
        (55.0 + (ratio - 1.0) * 60.0).min(95.0)
    } else {
        ratio.powi(2) * 40.0
    };
    let failures = f.failures_in(Dimension::Scheduling);
    let p = Probability::clamped(base + per_failure(f, Dimension::Scheduling, 10.0, 30.0));

    let res = &f.job.resources;
    let cause = if ratio > 1.0 {
        format!(
            "Requested {:.1} CPU / {:.1} GB exceeds free capacity of {:.1} CPU / {:.1} GB on {}",
            res.cpu_request,
            res.memory_request_gb,
            f.cluster.available_cpu,
            f.cluster.available_memory_gb,
            f.cluster.cluster_name
        )
    } else {
        format!(
            "Request uses {:.0}% of free capacity on {}",
            ratio * 100.0,
            f.cluster.cluster_name
        )
    };

    let mut a = DimensionAssessment::from_probability(p, cause);
    if ratio > 1.0 {
        a = a
            .recommend(format!(
                "Reduce cpu_request to at most {:.1} cores or memory_request to {:.1} GB",
                f.cluster.available_cpu, f.cluster.available_memory_gb
            ))
            .recommend("Scale out the node group or schedule outside peak hours");
    } else if ratio > 0.75 {
        a = a.recommend("Run when cluster load is lower to leave scheduling headroom");
    }
    if !f.is_cold_start() && failures > 0 {
        a = a.recommend(format!(
            "Investigate {failures} previous scheduling failure(s) before rerunning"
        ));
    }
    a
}

/// Failure probability for a usage-to-limit ratio
fn memory_curve(r: f64) -> f64 {
    if r >= 1.0 {
        (75.0 + (r - 1.0) * 200.0).min(95.0)
    } else if r >= 0.9 {
        50.0 + (r - 0.9) * 250.0
    } else if r >= 0.75 {
        20.0 + (r - 0.75) * 120.0
    } else {
        r * 26.0
    }
}

fn memory(f: &FeatureSet) -> DimensionAssessment {
    let limit = f.job.resources.memory_limit_gb;
    let (usage, observed) = match f.memory_limit_ratio() {
        Some(_) => (f.history.peak_memory_max_gb, true),
        None => (
            f64::from(f.job.graph.components)
                * f64::from(f.job.graph.parallelism)
                * COLD_START_GB_PER_TASK,
            false,
        ),
    };
    let r = if limit > 0.0 {
        usage / limit
    } else if usage > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let failures = f.failures_in(Dimension::Memory);
    let p = Probability::clamped(memory_curve(r) + per_failure(f, Dimension::Memory, 10.0, 20.0));

    let cause = if observed {
        format!(
            "Historical peak memory {usage:.1} GB is {:.0}% of the {limit:.1} GB limit",
            r * 100.0
        )
    } else {
        format!(
            "Estimated working set {usage:.1} GB ({} components x {} parallel) is {:.0}% of the {limit:.1} GB limit",
            f.job.graph.components,
            f.job.graph.parallelism,
            r * 100.0
        )
    };

    let mut a = DimensionAssessment::from_probability(p, cause);
    if r >= 0.9 {
        a = a.recommend(format!(
            "Raise memory_limit to at least {:.1} GB",
            (usage * 1.2 * 10.0).ceil() / 10.0
        ));
        a = a.recommend("Lower parallelism or process input in smaller batches");
    } else if r >= 0.75 {
        a = a.recommend("Monitor memory usage; headroom is under 25%");
    }
    if !f.is_cold_start() && failures > 0 {
        a = a.recommend(format!("{failures} previous run(s) were OOM-killed"));
    }
    a
}

fn storage_mount(f: &FeatureSet) -> DimensionAssessment {
    let Some(mount) = &f.job.storage_mount else {
        return DimensionAssessment::from_probability(
            Probability::clamped(5.0),
            "No shared storage mount configured",
        );
    };

    if f.is_cold_start() {
        return DimensionAssessment::from_probability(
            Probability::clamped(15.0),
            format!("Mount {} has no run history", mount.mount_path),
        )
        .recommend("Verify the mount target is reachable from the job's node group");
    }

    let failures = f.failures_in(Dimension::StorageMount);
    #[allow(clippy::cast_precision_loss)]
    let mut raw = (10.0 + failures as f64 * 15.0).min(90.0);
    let pressure = f.storage_ratio().filter(|r| *r >= 0.9);
    if pressure.is_some() {
        raw += 25.0;
    }
    let p = Probability::clamped(raw.min(95.0));

    let cause = match (failures, pressure) {
        (0, None) => format!("Mount {} has been reliable", mount.mount_path),
        (0, Some(r)) => format!("Peak storage at {:.0}% of requested", r * 100.0),
        (n, None) => format!("{n} previous mount failure(s) on {}", mount.mount_path),
        (n, Some(r)) => format!(
            "{n} previous mount failure(s); peak storage at {:.0}% of requested",
            r * 100.0
        ),
    };

    let mut a = DimensionAssessment::from_probability(p, cause);
    if failures > 0 {
        a = a
            .recommend("Check mount target health and security group rules")
            .recommend("Increase mount timeout or add a retry on mount");
    }
    if pressure.is_some() {
        a = a.recommend(format!(
            "Increase storage request above {:.1} GB",
            f.history.peak_storage_gb
        ));
    }
    a
}

fn permissions(f: &FeatureSet) -> DimensionAssessment {
    let job = &f.job;
    if !job.required_permissions.is_empty() && job.service_account.is_none() {
        return DimensionAssessment::from_probability(
            Probability::clamped(80.0),
            format!(
                "Job needs {} but has no service account",
                job.required_permissions.join(", ")
            ),
        )
        .recommend("Attach a service account with the required role")
        .recommend("Verify the role trust policy allows the job's namespace");
    }

    let failures = f.failures_in(Dimension::Permissions);
    let p = Probability::clamped(5.0 + per_failure(f, Dimension::Permissions, 20.0, 90.0));
    let cause = if !f.is_cold_start() && failures > 0 {
        format!("{failures} previous access-denied failure(s)")
    } else {
        "Service account configured for required permissions".to_string()
    };

    let mut a = DimensionAssessment::from_probability(p, cause);
    if !f.is_cold_start() && failures > 0 {
        a = a.recommend("Audit the service account role against the actions the job performs");
    }
    a
}

fn data_quality(f: &FeatureSet) -> DimensionAssessment {
    let dedup = f.job.dedup_enabled;

    if f.is_cold_start() {
        let (p, cause) = if dedup {
            (10.0, "No history; deduplication enabled")
        } else {
            (25.0, "No history; deduplication disabled")
        };
        let a = DimensionAssessment::from_probability(Probability::clamped(p), cause);
        return if dedup {
            a
        } else {
            a.recommend("Enable deduplication or validate input keys before loading")
        };
    }

    let d = f.history.max_duplicate_rate;
    let failures = f.failures_in(Dimension::DataQuality);
    let mut raw = (d * 400.0).min(90.0) + per_failure(f, Dimension::DataQuality, 10.0, f64::MAX);
    if !dedup {
        raw += 10.0;
    }
    let p = Probability::clamped(raw);

    let cause = format!(
        "Duplicate rate up to {:.1}% with deduplication {}",
        d * 100.0,
        if dedup { "enabled" } else { "disabled" }
    );
    let mut a = DimensionAssessment::from_probability(p, cause);
    if !dedup && d > 0.0 {
        a = a.recommend("Enable deduplication on the load step");
    }
    if failures > 0 {
        a = a.recommend(format!(
            "Add input validation; {failures} previous data-quality failure(s)"
        ));
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use failcast_features::build_features;
    use failcast_model::{
        ClusterState, ExecutionRecord, InputProfile, JobConfig, ResourceRequests, ResourceUsage,
        Severity, StorageMount,
    };

    fn runs(job: &str, n: usize, usage: ResourceUsage) -> Vec<ExecutionRecord> {
        let start = Utc.with_ymd_and_hms(2024, 10, 1, 2, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                ExecutionRecord::success(job, start + Duration::days(i as i64))
                    .with_usage(usage)
                    .with_input(InputProfile::new(1_000, 0.0))
            })
            .collect()
    }

    #[test]
    fn cpu_over_capacity_flags_scheduling() {
        let job = JobConfig::new("big", ResourceRequests::new(8.0, 16.0));
        let cluster = ClusterState::new("c", "r", 5.0, 280.0);
        let f = build_features(&job, &[], &cluster);

        let a = HeuristicPredictor.assess(&f).unwrap();
        let s = a.dimension(Dimension::Scheduling).unwrap();
        assert!(s.probability.value() > 50.0);
        assert!(s.severity >= Severity::Medium);
        assert!(!s.recommendations.is_empty());
    }

    #[test]
    fn peak_over_limit_flags_memory() {
        let job = JobConfig::new("mem", ResourceRequests::new(2.0, 12.0).with_memory_limit(16.0));
        let history = runs("mem", 5, ResourceUsage::new(16.2, 1.5, 0.0));
        let f = build_features(&job, &history, &ClusterState::default());

        let a = HeuristicPredictor.assess(&f).unwrap();
        let m = a.dimension(Dimension::Memory).unwrap();
        assert_eq!(m.severity, Severity::High);
        assert!(m.probability.value() >= 70.0);
        assert!(!a.overall.should_execute);
    }

    #[test]
    fn healthy_job_runs() {
        let job = JobConfig::new("ok", ResourceRequests::new(1.0, 4.0).with_memory_limit(8.0));
        let history = runs("ok", 5, ResourceUsage::new(3.0, 0.5, 0.0));
        let f = build_features(&job, &history, &ClusterState::default());

        let a = HeuristicPredictor.assess(&f).unwrap();
        assert_eq!(a.overall.severity, Severity::Low);
        assert!(a.overall.should_execute);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn missing_service_account() {
        let job = JobConfig::new("s3", ResourceRequests::new(1.0, 1.0))
            .requires_permission("s3:PutObject");
        let f = build_features(&job, &[], &ClusterState::default());

        let a = HeuristicPredictor.assess(&f).unwrap();
        let p = a.dimension(Dimension::Permissions).unwrap();
        assert_eq!(p.probability.value(), 80.0);
        assert_eq!(p.severity, Severity::High);
    }

    #[test]
    fn cold_start_ignores_failures() {
        let job = JobConfig::new("new", ResourceRequests::new(1.0, 2.0).with_memory_limit(4.0))
            .with_storage_mount(StorageMount::new("/mnt/efs"))
            .with_dedup(false);
        let one = vec![ExecutionRecord::failure(
            "new",
            Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap(),
            "EFS mount timeout",
        )];
        let f = build_features(&job, &one, &ClusterState::default());
        assert!(f.is_cold_start());

        let a = HeuristicPredictor.assess(&f).unwrap();
        assert_eq!(a.dimension(Dimension::StorageMount).unwrap().probability.value(), 15.0);
        assert_eq!(a.dimension(Dimension::DataQuality).unwrap().probability.value(), 25.0);
        assert!(a.confidence.low_historical_confidence);
        assert!(a.overall.recommendation.contains("low historical confidence"));
    }

    #[test]
    fn memory_curve_monotone_at_band_edges() {
        assert!(memory_curve(0.74) < memory_curve(0.75));
        assert!(memory_curve(0.89) < memory_curve(0.9));
        assert!(memory_curve(0.99) < memory_curve(1.0));
        assert_eq!(memory_curve(5.0), 95.0);
        assert_eq!(memory_curve(f64::INFINITY), 95.0);
    }

    #[test]
    fn deterministic() {
        let job = JobConfig::new("d", ResourceRequests::new(3.0, 10.0));
        let history = runs("d", 3, ResourceUsage::new(9.0, 2.0, 1.0));
        let f = build_features(&job, &history, &ClusterState::default());
        assert_eq!(
            HeuristicPredictor.assess(&f).unwrap(),
            HeuristicPredictor.assess(&f).unwrap()
        );
    }
}
