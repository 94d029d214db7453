//! Historical failure analysis
//!
//! A deterministic local summary over every recorded run, plus an optional
//! narrative from the reasoning service.

use chrono::{DateTime, Utc};
use failcast_features::classify_failure;
use failcast_model::{Dimension, ExecutionRecord};
use failcast_predict::prompt::failure_analysis_prompt;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::FailcastError;
use crate::pipeline::Pipeline;

/// Most common reasons kept
pub const TOP_REASONS: usize = 5;

/// Recent failures kept
pub const RECENT_FAILURES: usize = 10;

/// One failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    /// Job name
    pub job: String,
    /// Run start
    pub date: DateTime<Utc>,
    /// Failure reason
    pub reason: String,
    /// Classified dimension
    pub dimension: Option<Dimension>,
}

/// Summary of all recorded failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureAnalysis {
    /// Runs considered
    pub total_runs: usize,
    /// Failed runs
    pub failures: usize,
    /// Failures per job
    pub failures_by_job: BTreeMap<String, usize>,
    /// Failures per classified dimension
    pub failures_by_dimension: BTreeMap<Dimension, usize>,
    /// Failures matching no dimension
    pub unclassified: usize,
    /// Most frequent reasons with counts, most frequent first
    pub common_reasons: Vec<(String, usize)>,
    /// Most recent failures, newest first
    pub recent: Vec<FailureSummary>,
}

impl FailureAnalysis {
    /// No failures recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures == 0
    }
}

/// Summarize failures in `history`
#[must_use]
pub fn analyze_failures(history: &[ExecutionRecord]) -> FailureAnalysis {
    let mut failed: Vec<FailureSummary> = history
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| {
            let reason = r
                .failure_reason
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            FailureSummary {
                job: r.job_name.clone(),
                date: r.execution_date,
                dimension: classify_failure(&reason),
                reason,
            }
        })
        .collect();
    failed.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.job.cmp(&b.job)));

    let mut analysis = FailureAnalysis {
        total_runs: history.len(),
        failures: failed.len(),
        ..FailureAnalysis::default()
    };

    let mut reasons: HashMap<&str, usize> = HashMap::new();
    for failure in &failed {
        *analysis
            .failures_by_job
            .entry(failure.job.clone())
            .or_insert(0) += 1;
        match failure.dimension {
            Some(d) => *analysis.failures_by_dimension.entry(d).or_insert(0) += 1,
            None => analysis.unclassified += 1,
        }
        *reasons.entry(failure.reason.as_str()).or_insert(0) += 1;
    }

    let mut common: Vec<(String, usize)> = reasons
        .into_iter()
        .map(|(reason, n)| (reason.to_string(), n))
        .collect();
    common.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    common.truncate(TOP_REASONS);
    analysis.common_reasons = common;

    failed.truncate(RECENT_FAILURES);
    analysis.recent = failed;
    analysis
}

impl Pipeline {
    /// Every recorded run, for [`analyze_failures`] and
    /// [`Pipeline::narrate_failures`]
    ///
    /// # Errors
    /// Returns `Store` if history is unavailable
    pub fn run_history(&self) -> Result<Vec<ExecutionRecord>, FailcastError> {
        let history = self.store().all_history()?;
        tracing::info!(runs = history.len(), "Loaded run history");
        Ok(history)
    }

    /// Narrative analysis of the failures in `history` from the reasoning
    /// service
    ///
    /// Each failure is sent with its job, date, reason and error details.
    /// Returns `None` when no reasoning predictor is configured or there is
    /// nothing to analyze.
    ///
    /// # Errors
    /// Returns `Predict` if the service call fails
    pub async fn narrate_failures(
        &self,
        history: &[ExecutionRecord],
    ) -> Result<Option<String>, FailcastError> {
        let Some(narrator) = self.narrator() else {
            return Ok(None);
        };

        let failures: Vec<serde_json::Value> = history
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| {
                serde_json::json!({
                    "job": r.job_name,
                    "date": r.execution_date,
                    "reason": r.failure_reason,
                    "details": r.error_details,
                })
            })
            .collect();
        if failures.is_empty() {
            return Ok(None);
        }

        let payload = serde_json::to_string_pretty(&failures)
            .map_err(|e| FailcastError::config(format!("serializing failures: {e}")))?;
        tracing::info!(failures = failures.len(), "Requesting failure narrative");
        let text = narrator
            .narrate(failure_analysis_prompt(&payload))
            .await?;
        Ok(Some(text))
    }
}
