//! Non-interactive subcommands

use anyhow::Context;
use colored::Colorize;
use failcast_core::{
    analyze_failures, join_batch, save_prediction, spawn_batch, FailcastConfig, FailcastError,
    Pipeline, Prediction,
};
use failcast_model::{ClusterState, ExecutionRecord};
use failcast_store::kubectl::{cluster_state_from_usage, parse_job_list, parse_top_nodes};
use failcast_store::{ClusterFile, HistoryFile};
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::render;

/// Exit status of `predict` and `batch` when a job should not run
pub(crate) const EXIT_DO_NOT_EXECUTE: u8 = 2;

/// Node group name written by `cluster-from-kubectl`
pub(crate) const KUBECTL_NODE_GROUP: &str = "all";

pub(crate) fn save(config: &FailcastConfig, prediction: &Prediction) -> Result<PathBuf, FailcastError> {
    save_prediction(&config.output_dir, prediction, Utc::now())
}

pub(crate) fn list(pipeline: &Pipeline) -> anyhow::Result<ExitCode> {
    let jobs = pipeline.store().list_jobs()?;
    print!("{}", render::format_job_list(&jobs));
    Ok(ExitCode::SUCCESS)
}

pub(crate) async fn predict(
    pipeline: &Pipeline,
    config: &FailcastConfig,
    job: &str,
    save_file: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let prediction = pipeline.assess(job).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*prediction.assessment)?);
    } else {
        print!("{}", render::format_assessment(&prediction.assessment));
    }

    if save_file {
        let path = save(config, &prediction)?;
        eprintln!("{} {}", "Saved to".green(), path.display());
    }

    Ok(if prediction.assessment.overall.should_execute {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DO_NOT_EXECUTE)
    })
}

/// Assess every job concurrently; Ctrl-C cancels whatever is still running
pub(crate) async fn batch(pipeline: &Pipeline) -> anyhow::Result<ExitCode> {
    let jobs: Vec<String> = pipeline
        .store()
        .list_jobs()?
        .into_iter()
        .map(|j| j.job_name)
        .collect();
    tracing::info!(jobs = jobs.len(), "Starting batch");

    let handles = spawn_batch(pipeline, jobs);
    let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let canceller = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling outstanding predictions");
            for abort in &aborts {
                abort.abort();
            }
        }
    });

    let entries = join_batch(handles).await;
    canceller.abort();
    print!("{}", render::format_batch(&entries));

    let failed = entries.iter().any(|e| e.outcome.is_err());
    let blocked = entries.iter().any(|e| {
        e.outcome
            .as_ref()
            .is_ok_and(|p| !p.assessment.overall.should_execute)
    });
    Ok(if failed {
        ExitCode::FAILURE
    } else if blocked {
        ExitCode::from(EXIT_DO_NOT_EXECUTE)
    } else {
        ExitCode::SUCCESS
    })
}

/// Local summary of `history`, then the service narrative when one is
/// configured; a narrative failure is reported inline
pub(crate) async fn analysis_report(pipeline: &Pipeline, history: &[ExecutionRecord]) -> String {
    let mut report = render::format_analysis(&analyze_failures(history));

    match pipeline.narrate_failures(history).await {
        Ok(Some(narrative)) => {
            report.push_str(&format!("\n{}\n{narrative}\n", "Narrative analysis".cyan().bold()));
        }
        Ok(None) => {}
        Err(err) => report.push_str(&format!(
            "\n{} {}\n",
            "Narrative analysis unavailable:".yellow().bold(),
            render::format_error(&err)
        )),
    }
    report
}

/// Menu variant of `analyze`: errors are printed so the menu can carry on
pub(crate) async fn print_analysis(pipeline: &Pipeline) {
    match pipeline.run_history() {
        Ok(history) => print!("{}", analysis_report(pipeline, &history).await),
        Err(err) => println!("{}", render::format_error(&err)),
    }
}

pub(crate) async fn analyze(pipeline: &Pipeline) -> anyhow::Result<ExitCode> {
    let history = pipeline.run_history()?;
    print!("{}", analysis_report(pipeline, &history).await);
    Ok(ExitCode::SUCCESS)
}

fn read_input(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading kubectl output from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("reading kubectl output from {source}"))
    }
}

/// Cluster YAML for `kubectl top nodes --no-headers` output
pub(crate) fn cluster_yaml(output: &str, cluster_name: &str, region: &str) -> anyhow::Result<String> {
    let nodes = parse_top_nodes(output)?;
    let state = cluster_state_from_usage(cluster_name, region, &nodes);
    tracing::info!(
        nodes = nodes.len(),
        cpu = state.available_cpu,
        memory_gb = state.available_memory_gb,
        "Derived cluster capacity"
    );
    Ok(serde_yaml::to_string(&ClusterFile::from_state(
        &state,
        KUBECTL_NODE_GROUP,
    ))?)
}

pub(crate) fn cluster_from_kubectl(
    source: &str,
    cluster_name: Option<&str>,
    region: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let defaults = ClusterState::default();
    let text = read_input(source)?;
    let yaml = cluster_yaml(
        &text,
        cluster_name.unwrap_or(&defaults.cluster_name),
        region.unwrap_or(&defaults.region),
    )?;
    print!("{yaml}");
    Ok(ExitCode::SUCCESS)
}

/// History JSON for `kubectl get jobs -o json` output
///
/// With `since`, runs that started earlier are dropped.
pub(crate) fn history_json(
    output: &str,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<String> {
    let mut records = parse_job_list(output)?;
    if let Some(cutoff) = since {
        records.retain(|r| r.execution_date >= cutoff);
    }
    records.sort_by(|a, b| b.execution_date.cmp(&a.execution_date));
    tracing::info!(
        runs = records.len(),
        failures = records.iter().filter(|r| r.is_failure()).count(),
        "Derived execution history"
    );
    Ok(serde_json::to_string_pretty(&HistoryFile {
        job_execution_history: records,
    })?)
}

pub(crate) fn history_from_kubectl(source: &str, days: Option<u32>) -> anyhow::Result<ExitCode> {
    let text = read_input(source)?;
    let since = days.map(|d| Utc::now() - chrono::Duration::days(i64::from(d)));
    println!("{}", history_json(&text, since)?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use failcast_model::JobConfig;
    use failcast_predict::ReasoningClient;
    use failcast_store::{InMemoryStore, RecordStore, StoreError};
    use failcast_test_utils::{sample_store, ScriptedClient};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn kubectl_output_to_cluster_file() {
        let output = "node-a  2000m  50%  8Gi  50%\nnode-b  1  25%  4096Mi  50%\n";
        let yaml = cluster_yaml(output, "prod", "us-east-1").unwrap();
        let file: ClusterFile = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(file.cluster_info.cluster_name, "prod");
        assert_eq!(file.node_groups.len(), 1);
        assert_eq!(file.node_groups[0].name, KUBECTL_NODE_GROUP);
        // free = used * (100 - pct) / pct; largest single node wins
        assert!((file.node_groups[0].available_cpu - 3.0).abs() < 1e-9);
        assert!((file.node_groups[0].available_memory_gi - 8.0).abs() < 1e-9);
    }

    #[test]
    fn garbage_kubectl_output_rejected() {
        assert!(cluster_yaml("node-a lots 50% 8Gi 50%", "prod", "us-east-1").is_err());
    }

    const JOBS: &str = r#"{"items": [
        {"metadata": {"name": "customer_dedup-28391820", "creationTimestamp": "2024-01-10T02:00:00Z"},
         "status": {"succeeded": 1, "completionTime": "2024-01-10T02:30:00Z"}},
        {"metadata": {"name": "customer_dedup-28393260", "creationTimestamp": "2024-01-11T02:00:00Z"},
         "status": {"failed": 1, "conditions": [{"type": "Failed", "message": "OOMKilled"}]}},
        {"metadata": {"name": "customer_dedup-28394700", "creationTimestamp": "2024-01-12T02:00:00Z"},
         "status": {"active": 1}}
    ]}"#;

    #[test]
    fn kubectl_jobs_to_history_file() {
        let json = history_json(JOBS, None).unwrap();
        let file: HistoryFile = serde_json::from_str(&json).unwrap();
        let history = &file.job_execution_history;

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.job_name == "customer_dedup"));
        // newest first; the running job is skipped
        assert!(history[0].is_failure());
        assert_eq!(history[0].failure_reason.as_deref(), Some("OOMKilled"));
        assert_eq!(history[1].duration_minutes, Some(30.0));
    }

    #[test]
    fn kubectl_history_cutoff() {
        let since = "2024-01-11T00:00:00Z".parse().unwrap();
        let json = history_json(JOBS, Some(since)).unwrap();
        let file: HistoryFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file.job_execution_history.len(), 1);
    }

    #[test]
    fn kubectl_history_rejects_table_output() {
        assert!(history_json("NAME   COMPLETIONS   DURATION   AGE", None).is_err());
    }

    /// Sample store counting full history reads
    #[derive(Debug)]
    struct CountingStore {
        inner: InMemoryStore,
        history_reads: AtomicUsize,
    }

    impl RecordStore for CountingStore {
        fn get_job_config(&self, name: &str) -> Result<JobConfig, StoreError> {
            self.inner.get_job_config(name)
        }

        fn list_jobs(&self) -> Result<Vec<JobConfig>, StoreError> {
            self.inner.list_jobs()
        }

        fn list_history(&self, job: &str, limit: usize) -> Result<Vec<ExecutionRecord>, StoreError> {
            self.inner.list_history(job, limit)
        }

        fn all_history(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
            self.history_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.all_history()
        }

        fn cluster_state(&self) -> Result<ClusterState, StoreError> {
            self.inner.cluster_state()
        }
    }

    #[tokio::test]
    async fn analyze_reads_history_once() {
        colored::control::set_override(false);
        let store = Arc::new(CountingStore {
            inner: sample_store(),
            history_reads: AtomicUsize::new(0),
        });
        let client = Arc::new(ScriptedClient::always("Memory pressure dominates."));
        let reasoning: Arc<dyn ReasoningClient> = client.clone();
        let pipeline =
            Pipeline::from_config(&FailcastConfig::new(), store.clone(), Some(reasoning)).unwrap();

        analyze(&pipeline).await.unwrap();
        assert_eq!(store.history_reads.load(Ordering::SeqCst), 1);
        assert_eq!(client.calls(), 1);

        let history = pipeline.run_history().unwrap();
        let report = analysis_report(&pipeline, &history).await;
        assert!(report.contains("Narrative analysis\nMemory pressure dominates."));
    }
}
