//! Store inputs derived from `kubectl` output
//!
//! Cluster capacity comes from `kubectl top nodes --no-headers`. Each line
//! reads `NAME CPU(cores) CPU% MEMORY(bytes) MEMORY%`, for example
//! `ip-10-0-1-17  1250m  31%  12034Mi  40%`. Usage and utilisation together
//! give each node's free capacity: `free = used * (100 - pct) / pct`.
//!
//! Execution history comes from `kubectl get jobs -o json`: finished jobs
//! become [`ExecutionRecord`]s, running ones are skipped.

use chrono::{DateTime, Utc};
use failcast_model::{ClusterState, ExecutionRecord};
use serde::Deserialize;

use crate::error::StoreError;

/// Usage of one node as reported by `kubectl top`
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUsage {
    /// Node name
    pub name: String,
    /// CPU cores in use
    pub cpu_cores: f64,
    /// CPU utilisation percent, if reported
    pub cpu_percent: Option<f64>,
    /// Memory in use, GiB
    pub memory_gi: f64,
    /// Memory utilisation percent, if reported
    pub memory_percent: Option<f64>,
}

impl NodeUsage {
    /// Free CPU cores, if utilisation is known
    #[must_use]
    pub fn free_cpu(&self) -> Option<f64> {
        free_from_usage(self.cpu_cores, self.cpu_percent)
    }

    /// Free memory in GiB, if utilisation is known
    #[must_use]
    pub fn free_memory_gi(&self) -> Option<f64> {
        free_from_usage(self.memory_gi, self.memory_percent)
    }
}

/// Parse `kubectl top nodes --no-headers` output
///
/// Blank lines are skipped.
///
/// # Errors
/// Returns `StoreError::InvalidInput` for a line with fewer than five
/// columns or an unparsable quantity
pub fn parse_top_nodes(output: &str) -> Result<Vec<NodeUsage>, StoreError> {
    let mut nodes = Vec::new();

    for (idx, line) in output.lines().enumerate() {
        let line_no = idx + 1;
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() {
            continue;
        }
        if cols.len() < 5 {
            return Err(StoreError::InvalidInput {
                line: line_no,
                reason: format!("expected 5 columns, got {}", cols.len()),
            });
        }

        nodes.push(NodeUsage {
            name: cols[0].to_string(),
            cpu_cores: parse_cpu(cols[1]).ok_or_else(|| invalid(line_no, "cpu", cols[1]))?,
            cpu_percent: parse_percent(cols[2]),
            memory_gi: parse_memory_gi(cols[3]).ok_or_else(|| invalid(line_no, "memory", cols[3]))?,
            memory_percent: parse_percent(cols[4]),
        });
    }

    Ok(nodes)
}

/// Largest free capacity on a single node with known utilisation
///
/// A pod runs on one node, so free capacity spread over many nodes does not
/// add up to room for one large request.
#[must_use]
pub fn cluster_state_from_usage(
    cluster_name: impl Into<String>,
    region: impl Into<String>,
    nodes: &[NodeUsage],
) -> ClusterState {
    let cpu = nodes.iter().filter_map(NodeUsage::free_cpu).fold(0.0, f64::max);
    let memory = nodes
        .iter()
        .filter_map(NodeUsage::free_memory_gi)
        .fold(0.0, f64::max);
    ClusterState::new(
        cluster_name,
        region,
        (cpu * 100.0).round() / 100.0,
        (memory * 100.0).round() / 100.0,
    )
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    items: Vec<KubeJob>,
}

#[derive(Debug, Deserialize)]
struct KubeJob {
    metadata: JobMetadata,
    #[serde(default)]
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobMetadata {
    name: String,
    creation_timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    succeeded: u32,
    #[serde(default)]
    failed: u32,
    start_time: Option<DateTime<Utc>>,
    completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    conditions: Vec<JobCondition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCondition {
    #[serde(rename = "type")]
    kind: String,
    reason: Option<String>,
    message: Option<String>,
    last_transition_time: Option<DateTime<Utc>>,
}

impl JobStatus {
    fn failed_condition(&self) -> Option<&JobCondition> {
        self.conditions.iter().find(|c| c.kind == "Failed")
    }
}

/// Parse `kubectl get jobs -o json` into execution records
///
/// A job with a succeeded pod is a success, one with only failed pods a
/// failure; jobs with neither are still running and skipped. The run starts
/// at `startTime` (falling back to `creationTimestamp`) and ends at
/// `completionTime` or, for failures, when the `Failed` condition was set.
/// Generated name suffixes are stripped so runs group under their job.
///
/// # Errors
/// Returns `StoreError::InvalidInput` if the output is not a job list
pub fn parse_job_list(output: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
    let list: JobList = serde_json::from_str(output).map_err(|e| StoreError::InvalidInput {
        line: e.line(),
        reason: e.to_string(),
    })?;

    let mut records = Vec::with_capacity(list.items.len());
    for job in list.items {
        let name = base_job_name(&job.metadata.name);
        let status = &job.status;
        let started = status.start_time.unwrap_or(job.metadata.creation_timestamp);

        let (mut record, finished) = if status.succeeded > 0 {
            (ExecutionRecord::success(name, started), status.completion_time)
        } else if status.failed > 0 {
            let condition = status.failed_condition();
            let reason = condition
                .and_then(|c| c.message.clone().or_else(|| c.reason.clone()))
                .unwrap_or_else(|| "Job failed".to_string());
            let finished = status
                .completion_time
                .or_else(|| condition.and_then(|c| c.last_transition_time));
            (ExecutionRecord::failure(name, started, reason), finished)
        } else {
            tracing::debug!(job = %job.metadata.name, "Skipping running job");
            continue;
        };

        record.duration_minutes = finished.map(|end| {
            #[allow(clippy::cast_precision_loss)]
            let minutes = (end - started).num_seconds() as f64 / 60.0;
            (minutes * 10.0).round() / 10.0
        });
        records.push(record);
    }

    Ok(records)
}

/// `customer-dedup-28391820` -> `customer-dedup`
///
/// Only a trailing segment containing a digit counts as generated, so
/// `daily-report` keeps its name.
fn base_job_name(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_alphanumeric())
                && suffix.chars().any(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

fn invalid(line: usize, column: &str, value: &str) -> StoreError {
    StoreError::InvalidInput {
        line,
        reason: format!("invalid {column} quantity '{value}'"),
    }
}

fn free_from_usage(used: f64, percent: Option<f64>) -> Option<f64> {
    match percent {
        Some(pct) if pct > 0.0 && pct <= 100.0 => Some(used * (100.0 - pct) / pct),
        _ => None,
    }
}

fn parse_cpu(value: &str) -> Option<f64> {
    if let Some(milli) = value.strip_suffix('m') {
        milli.parse::<f64>().ok().map(|m| m / 1000.0)
    } else {
        value.parse::<f64>().ok()
    }
}

fn parse_memory_gi(value: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 4] = [
        ("Ki", 1.0 / (1024.0 * 1024.0)),
        ("Mi", 1.0 / 1024.0),
        ("Gi", 1.0),
        ("Ti", 1024.0),
    ];
    UNITS.iter().find_map(|(suffix, factor)| {
        value
            .strip_suffix(suffix)
            .and_then(|n| n.parse::<f64>().ok())
            .map(|n| n * factor)
    })
}

fn parse_percent(value: &str) -> Option<f64> {
    value.strip_suffix('%').and_then(|n| n.parse::<f64>().ok())
}
