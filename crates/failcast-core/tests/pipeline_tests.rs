use failcast_core::{
    analyze_failures, join_batch, load_prediction, save_prediction, spawn_batch, spawn_prediction, FailcastConfig,
    FailcastError, Pipeline, PredictorMode, Stage,
};
use failcast_model::{Dimension, Severity};
use failcast_predict::{ClientError, PredictError, ReasoningClient, RequestId, RequestPhase};
use failcast_store::{DataPaths, FileStore, RecordStore};
use failcast_test_utils::{
    constrained_cluster, sample_store, wire_response, write_data_dir, ScriptedClient,
};
use std::sync::Arc;
use std::time::Duration;

fn reasoning_pipeline(client: Arc<ScriptedClient>) -> Pipeline {
    let client: Arc<dyn ReasoningClient> = client;
    Pipeline::from_config(&FailcastConfig::new(), Arc::new(sample_store()), Some(client)).unwrap()
}

fn heuristic_pipeline(store: Arc<dyn RecordStore>) -> Pipeline {
    let config = FailcastConfig::new().with_predictor(PredictorMode::Heuristic);
    Pipeline::from_config(&config, store, None).unwrap()
}

#[tokio::test]
async fn test_same_request_id_calls_service_once() {
    let client = Arc::new(ScriptedClient::always(wire_response([10.0, 5.0, 30.0, 5.0, 10.0])));
    let pipeline = reasoning_pipeline(client.clone());
    let id = RequestId::new();

    let first = pipeline.assess_with_id(id, "customer_dedup").await.unwrap();
    let second = pipeline.assess_with_id(id, "customer_dedup").await.unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(pipeline.tracker().phase(id), Some(RequestPhase::Completed));

    // A new id is a new request
    pipeline.assess("customer_dedup").await.unwrap();
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_malformed_response_fails_request() {
    let client = Arc::new(ScriptedClient::always("The job looks fine to me."));
    let pipeline = reasoning_pipeline(client.clone());
    let id = RequestId::new();

    let err = pipeline.assess_with_id(id, "customer_dedup").await.unwrap_err();
    assert!(matches!(
        err,
        FailcastError::Predict(PredictError::Unavailable { .. })
    ));
    assert_eq!(err.stage(), Stage::Predict);
    assert_eq!(pipeline.tracker().phase(id), Some(RequestPhase::Failed));

    let err = pipeline.assess_with_id(id, "customer_dedup").await.unwrap_err();
    assert!(matches!(
        err,
        FailcastError::Predict(PredictError::RequestFailed { .. })
    ));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_schema_violation_is_validation_stage() {
    let mut body: serde_json::Value =
        serde_json::from_str(&wire_response([10.0, 5.0, 30.0, 5.0, 10.0])).unwrap();
    body["predictions"]["scheduling"]["severity"] = "SEVERE".into();
    let client = Arc::new(ScriptedClient::always(body.to_string()));
    let pipeline = reasoning_pipeline(client);

    let err = pipeline.assess("nightly_aggregation").await.unwrap_err();
    assert_eq!(err.stage(), Stage::Validate);
    assert_eq!(err.dimension(), Some(Dimension::Scheduling));
}

#[tokio::test]
async fn test_service_error_never_becomes_low_risk() {
    let client = Arc::new(ScriptedClient::failing(ClientError::Transport(
        "connection refused".to_string(),
    )));
    let pipeline = reasoning_pipeline(client);

    let err = pipeline.assess("customer_dedup").await.unwrap_err();
    assert!(err.is_prediction_failure());
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_cold_start_uses_configuration_only() {
    let client = Arc::new(ScriptedClient::always(wire_response([10.0; 5])));
    let pipeline = reasoning_pipeline(client.clone());

    let prediction = pipeline.assess("new_ingest").await.unwrap();
    assert_eq!(client.calls(), 0);
    assert!(prediction.assessment.confidence.low_historical_confidence);
    assert_eq!(prediction.assessment.confidence.history_records, 0);
}

#[tokio::test]
async fn test_unknown_job() {
    let pipeline = heuristic_pipeline(Arc::new(sample_store()));
    let err = pipeline.assess("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.stage(), Stage::Store);
}

#[tokio::test]
async fn test_batch_runs_every_job() {
    let store = sample_store().with_cluster(constrained_cluster());
    let pipeline = heuristic_pipeline(Arc::new(store));

    let jobs = ["customer_dedup", "nightly_aggregation", "new_ingest"];
    let entries = join_batch(spawn_batch(&pipeline, jobs)).await;

    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.outcome.is_ok()));
    let nightly = entries[1].outcome.as_ref().unwrap();
    assert_eq!(nightly.assessment.job_name, "nightly_aggregation");
    assert!(
        nightly.assessment.dimension(Dimension::Scheduling).unwrap().severity >= Severity::Medium
    );
}

#[tokio::test]
async fn test_cancelled_prediction_recorded_as_failed() {
    let client = Arc::new(
        ScriptedClient::always(wire_response([10.0; 5])).with_delay(Duration::from_secs(60)),
    );
    let pipeline = reasoning_pipeline(client);

    let handle = spawn_prediction(&pipeline, "customer_dedup");
    let id = handle.request_id();
    while pipeline.tracker().phase(id).is_none() {
        tokio::task::yield_now().await;
    }
    handle.cancel();

    let err = handle.join().await.unwrap_err();
    assert!(matches!(err, FailcastError::Cancelled(_)));
    assert_eq!(pipeline.tracker().phase(id), Some(RequestPhase::Failed));
}

#[tokio::test]
async fn test_file_store_assess_and_save() {
    let data = tempfile::tempdir().unwrap();
    write_data_dir(data.path(), &constrained_cluster()).unwrap();
    let store = FileStore::open(DataPaths::in_dir(data.path())).unwrap();
    let pipeline = heuristic_pipeline(Arc::new(store));

    let prediction = pipeline.assess("customer_dedup").await.unwrap();
    let memory = prediction.assessment.dimension(Dimension::Memory).unwrap();
    assert!(memory.severity >= Severity::High);
    assert!(!prediction.assessment.overall.should_execute);

    let out = tempfile::tempdir().unwrap();
    let at = chrono::Utc::now();
    let path = save_prediction(&out.path().join("reports"), &prediction, at).unwrap();
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("prediction_customer_dedup_"));

    let saved = load_prediction(&path).unwrap();
    assert_eq!(saved.request_id, prediction.request_id);
    assert_eq!(saved.assessment, *prediction.assessment);
}

#[tokio::test]
async fn test_failure_narrative() {
    let client = Arc::new(ScriptedClient::always("Memory pressure dominates."));
    let pipeline = reasoning_pipeline(client.clone());

    let history = pipeline.run_history().unwrap();
    assert_eq!(analyze_failures(&history).failures, 2);

    let narrative = pipeline.narrate_failures(&history).await.unwrap();
    assert_eq!(narrative.as_deref(), Some("Memory pressure dominates."));

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("OOMKilled"));
    assert!(prompt.contains("\"exit_code\": 137"));
    assert!(prompt.contains("dedup-worker"));
}

#[tokio::test]
async fn test_heuristic_mode_has_no_narrative() {
    let pipeline = heuristic_pipeline(Arc::new(sample_store()));
    let history = pipeline.run_history().unwrap();
    assert_eq!(pipeline.narrate_failures(&history).await.unwrap(), None);
}

#[tokio::test]
async fn test_tracker_memory_bounded_by_cache() {
    let config = FailcastConfig::new()
        .with_predictor(PredictorMode::Heuristic)
        .with_cache(10, 3_600);
    let pipeline = Pipeline::from_config(&config, Arc::new(sample_store()), None).unwrap();

    for _ in 0..500 {
        pipeline.assess("customer_dedup").await.unwrap();
    }

    let stats = pipeline.tracker().stats();
    assert_eq!(stats.pending, 0);
    assert!(stats.completed <= 10, "{stats:?}");
}
