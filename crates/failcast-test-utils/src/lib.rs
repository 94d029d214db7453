//! Testing utilities for the Failcast workspace
//!
//! Shared fixtures, a scripted reasoning client and helpers for writing
//! data directories.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use failcast_model::{
    ClusterState, Dimension, ExecutionRecord, InputProfile, JobConfig, ResourceRequests,
    ResourceUsage, Severity, StorageMount,
};
use failcast_predict::{ClientError, ReasoningClient, ReasoningRequest};
use failcast_store::file::{CLUSTER_FILE, HISTORY_FILE, JOBS_FILE};
use failcast_store::{ClusterFile, InMemoryStore};
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, d, 2, 0, 0).unwrap()
}

/// Peaks just above its 16 GB limit on every run
pub fn customer_dedup_job() -> JobConfig {
    JobConfig::new(
        "customer_dedup",
        ResourceRequests::new(4.0, 12.0)
            .with_memory_limit(16.0)
            .with_storage(100.0),
    )
    .with_description("Deduplicate customer records")
    .with_schedule("0 2 * * *")
    .with_graph(12, 4)
    .with_storage_mount(StorageMount::new("/mnt/efs/customer"))
    .with_service_account("abinitio-etl")
    .requires_permission("s3:GetObject")
    .requires_permission("s3:PutObject")
    .with_dedup(true)
}

/// Requests 8 CPU
pub fn nightly_aggregation_job() -> JobConfig {
    JobConfig::new(
        "nightly_aggregation",
        ResourceRequests::new(8.0, 16.0).with_memory_limit(24.0),
    )
    .with_description("Aggregate daily sales")
    .with_schedule("0 1 * * *")
    .with_graph(6, 2)
    .with_dedup(false)
}

/// No history at all
pub fn new_ingest_job() -> JobConfig {
    JobConfig::new(
        "new_ingest",
        ResourceRequests::new(2.0, 4.0).with_memory_limit(8.0),
    )
    .with_description("First run of a new ingest")
    .with_schedule("30 3 * * *")
    .with_graph(4, 2)
    .with_dedup(true)
}

pub fn sample_jobs() -> Vec<JobConfig> {
    vec![
        customer_dedup_job(),
        nightly_aggregation_job(),
        new_ingest_job(),
    ]
}

/// Unordered on purpose; stores must sort
pub fn sample_history() -> Vec<ExecutionRecord> {
    let usage = |m| ResourceUsage::new(m, 3.5, 60.0);
    vec![
        ExecutionRecord::success("customer_dedup", day(1))
            .with_usage(usage(15.1))
            .with_input(InputProfile::new(2_000_000, 0.01)),
        ExecutionRecord::failure("customer_dedup", day(3), "OOMKilled: exit code 137")
            .with_error_detail("exit_code", 137)
            .with_error_detail("container", "dedup-worker")
            .with_usage(usage(16.2))
            .with_input(InputProfile::new(2_100_000, 0.02)),
        ExecutionRecord::success("customer_dedup", day(2))
            .with_usage(usage(15.8))
            .with_input(InputProfile::new(2_050_000, 0.01)),
        ExecutionRecord::success("customer_dedup", day(4))
            .with_usage(usage(16.2))
            .with_input(InputProfile::new(2_200_000, 0.015)),
        ExecutionRecord::success("nightly_aggregation", day(2))
            .with_usage(ResourceUsage::new(14.0, 6.5, 10.0))
            .with_input(InputProfile::new(500_000, 0.0)),
        ExecutionRecord::success("nightly_aggregation", day(3))
            .with_usage(ResourceUsage::new(14.5, 7.0, 10.0))
            .with_input(InputProfile::new(510_000, 0.0)),
        ExecutionRecord::failure(
            "nightly_aggregation",
            day(4),
            "0/12 nodes available: Insufficient cpu",
        ),
    ]
}

/// 5 free CPU: too little for [`nightly_aggregation_job`]
pub fn constrained_cluster() -> ClusterState {
    ClusterState::new("bi-abi-apps-prod", "us-east-1", 5.0, 280.0)
}

pub fn sample_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_job(customer_dedup_job())
        .with_job(nightly_aggregation_job())
        .with_job(new_ingest_job())
        .with_records(sample_history())
}

/// Write the sample data set as export files into `dir`
pub fn write_data_dir(dir: &Path, cluster: &ClusterState) -> std::io::Result<()> {
    let jobs = json!({ "jobs": sample_jobs() });
    let history = json!({ "job_execution_history": sample_history() });
    let cluster = ClusterFile::from_state(cluster, "general");

    std::fs::write(dir.join(JOBS_FILE), serde_json::to_string_pretty(&jobs)?)?;
    std::fs::write(
        dir.join(HISTORY_FILE),
        serde_json::to_string_pretty(&history)?,
    )?;
    let yaml = serde_yaml::to_string(&cluster)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(dir.join(CLUSTER_FILE), yaml)?;
    Ok(())
}

/// A well-formed service response with the given per-dimension probabilities
///
/// Order follows [`Dimension::ALL`]. Severities follow the probability
/// bands and the overall block is filled in consistently.
pub fn wire_response(probabilities: [f64; 5]) -> String {
    let mut predictions = serde_json::Map::new();
    let mut worst = Severity::Low;
    for (dimension, p) in Dimension::ALL.iter().zip(probabilities) {
        let severity = Severity::from_probability(p);
        worst = worst.max(severity);
        predictions.insert(
            dimension.key().to_string(),
            json!({
                "probability": p,
                "severity": severity,
                "root_cause": format!("{} looks {}", dimension.title(), severity),
                "recommendations": [format!("Review {}", dimension.title())]
            }),
        );
    }
    let max = probabilities.iter().copied().fold(0.0, f64::max);
    json!({
        "predictions": predictions,
        "overall_assessment": {
            "should_execute": !worst.blocks_execution(),
            "overall_severity": worst,
            "overall_probability": max,
            "recommendation": "Scripted recommendation"
        },
        "estimated_effort": {
            "category": "MEDIUM",
            "story_points": 3,
            "estimated_hours": { "min": 4, "max": 8 }
        }
    })
    .to_string()
}

/// Reasoning client replaying canned replies
///
/// Replies are consumed in order; the last one repeats once the queue is
/// down to a single entry.
#[derive(Debug)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ClientError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(replies: impl IntoIterator<Item = Result<String, ClientError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: impl Into<String>) -> Self {
        Self::new([Ok(text.into())])
    }

    pub fn failing(err: ClientError) -> Self {
        Self::new([Err(err)])
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<String, ClientError> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or(Err(ClientError::EmptyResponse))
        }
    }
}

#[async_trait]
impl ReasoningClient for ScriptedClient {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply()
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}
