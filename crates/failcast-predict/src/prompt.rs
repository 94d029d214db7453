//! Prompt construction for the reasoning service

use failcast_features::FeatureSet;
use failcast_model::Dimension;
use std::fmt::Write as _;

use crate::error::PredictError;
use crate::schema::response_schema;

/// Summary of a job's history as plain text
#[must_use]
pub fn historical_context(features: &FeatureSet) -> String {
    let h = &features.history;
    if h.records == 0 {
        return "No historical data available".to_string();
    }

    let mut text = String::new();
    let _ = writeln!(text, "Historical context for {}:", features.job.job_name);
    let _ = writeln!(text, "- Total executions: {}", h.records);
    let _ = writeln!(text, "- Successes: {}", h.successes);
    let _ = writeln!(text, "- Failures: {}", h.failures);

    if !h.recent_failures.is_empty() {
        let _ = writeln!(text, "\nRecent failures:");
        for failure in &h.recent_failures {
            let _ = writeln!(
                text,
                "  - {}: {}",
                failure.date.format("%Y-%m-%d %H:%M"),
                failure.reason
            );
        }
    }

    if let (Some(memory), Some(cpu), Some(storage)) =
        (h.avg_memory_gb, h.avg_cpu_cores, h.avg_storage_gb)
    {
        let _ = writeln!(text, "\nAverage resource usage (successful runs):");
        let _ = writeln!(text, "  - Memory: {memory:.1} GB");
        let _ = writeln!(text, "  - CPU: {cpu:.1} cores");
        let _ = writeln!(text, "  - Storage: {storage:.1} GB");
    }

    let _ = writeln!(
        text,
        "\nPeak memory across all runs: {:.1} GB; highest duplicate rate: {:.1}%",
        h.peak_memory_max_gb,
        h.max_duplicate_rate * 100.0
    );
    text
}

/// Prompt asking for a structured prediction
///
/// # Errors
/// Returns error if the job or schema cannot be serialized
pub fn prediction_prompt(features: &FeatureSet) -> Result<String, PredictError> {
    let job = serde_json::to_string_pretty(&features.job)
        .map_err(|e| PredictError::unavailable(format!("serializing job: {e}")))?;
    let schema = serde_json::to_string_pretty(&response_schema()?)
        .map_err(|e| PredictError::unavailable(format!("serializing schema: {e}")))?;

    let mut categories = String::new();
    for (i, dimension) in Dimension::ALL.iter().enumerate() {
        let _ = writeln!(
            categories,
            "{}. {} (key \"{}\")",
            i + 1,
            dimension.title(),
            dimension.key()
        );
    }

    let cluster = &features.cluster;
    Ok(format!(
        "You predict failures of batch jobs running on a Kubernetes cluster.\n\
         \n\
         Job configuration:\n```json\n{job}\n```\n\
         \n\
         Execution history:\n{history}\n\
         Cluster state:\n\
         - Cluster: {name} ({region})\n\
         - Available CPU: {cpu:.1} cores\n\
         - Available memory: {memory:.1} GB\n\
         \n\
         Assess each failure category:\n{categories}\n\
         For each give a probability (0-100), a severity (LOW, MEDIUM, HIGH, CRITICAL), \
         a root cause and recommendations, then an overall assessment and an effort estimate.\n\
         \n\
         Respond with a single JSON document conforming to this JSON Schema, and nothing else:\n\
         ```json\n{schema}\n```",
        history = historical_context(features),
        name = cluster.cluster_name,
        region = cluster.region,
        cpu = cluster.available_cpu,
        memory = cluster.available_memory_gb,
    ))
}

/// Prompt asking for a narrative analysis of failure records
#[must_use]
pub fn failure_analysis_prompt(failures_json: &str) -> String {
    format!(
        "Analyze these historical job failures and identify patterns.\n\
         \n\
         Failures:\n```json\n{failures_json}\n```\n\
         \n\
         Provide:\n\
         1. Common failure patterns\n\
         2. Root cause categories\n\
         3. Preventive measures\n\
         4. Priority recommendations\n\
         \n\
         Keep the analysis concise."
    )
}
