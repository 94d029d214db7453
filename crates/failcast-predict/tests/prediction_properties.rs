use failcast_features::build_features;
use failcast_model::{
    ClusterState, Dimension, ExecutionRecord, InputProfile, JobConfig, ResourceRequests,
    ResourceUsage, Severity, StorageMount,
};
use failcast_predict::{
    allowed_transitions, validate_transition, HeuristicPredictor, PredictError, Predictor,
    ReasoningPredictor, ReasoningSettings, RequestPhase,
};
use failcast_test_utils::{
    constrained_cluster, customer_dedup_job, day, nightly_aggregation_job, sample_history,
    wire_response, ScriptedClient,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const REASONS: [&str; 6] = [
    "OOMKilled",
    "0/4 nodes available: Insufficient cpu",
    "EFS mount timeout",
    "AccessDenied on s3:PutObject",
    "duplicate key value",
    "segfault",
];

fn record_strategy() -> impl Strategy<Value = ExecutionRecord> {
    (
        1u32..28,
        any::<bool>(),
        0usize..REASONS.len(),
        0.0f64..64.0,
        0.0f64..200.0,
        0.0f64..0.5,
    )
        .prop_map(|(d, ok, reason, memory, storage, dup)| {
            let record = if ok {
                ExecutionRecord::success("job", day(d))
            } else {
                ExecutionRecord::failure("job", day(d), REASONS[reason])
            };
            record
                .with_usage(ResourceUsage::new(memory, 2.0, storage))
                .with_input(InputProfile::new(1_000, dup))
        })
}

fn job_strategy() -> impl Strategy<Value = JobConfig> {
    (
        0.0f64..32.0,
        0.0f64..128.0,
        0.0f64..2.0,
        0.0f64..500.0,
        1u32..20,
        1u32..8,
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(cpu, memory, headroom, storage, components, parallelism, mount, sa, dedup)| {
                let mut job = JobConfig::new(
                    "job",
                    ResourceRequests::new(cpu, memory)
                        .with_memory_limit(memory * headroom)
                        .with_storage(storage),
                )
                .with_graph(components, parallelism)
                .requires_permission("s3:GetObject")
                .with_dedup(dedup);
                if mount {
                    job = job.with_storage_mount(StorageMount::new("/mnt/shared"));
                }
                if sa {
                    job = job.with_service_account("runner");
                }
                job
            },
        )
}

fn phase_strategy() -> impl Strategy<Value = RequestPhase> {
    prop_oneof![
        Just(RequestPhase::Pending),
        Just(RequestPhase::Completed),
        Just(RequestPhase::Failed),
    ]
}

proptest! {
    #[test]
    fn prop_heuristic_assessment_well_formed(
        job in job_strategy(),
        history in prop::collection::vec(record_strategy(), 0..8),
        cpu in 0.0f64..40.0,
        memory in 0.0f64..300.0,
    ) {
        let cluster = ClusterState::new("c", "r", cpu, memory);
        let features = build_features(&job, &history, &cluster);
        let assessment = HeuristicPredictor.assess(&features).unwrap();

        prop_assert_eq!(assessment.dimensions.len(), Dimension::ALL.len());
        for dimension in assessment.dimensions.values() {
            let p = dimension.probability.value();
            prop_assert!((0.0..=100.0).contains(&p));
            prop_assert_eq!(dimension.severity, Severity::from_probability(p));
        }
        let overall = &assessment.overall;
        prop_assert!((0.0..=100.0).contains(&overall.probability.value()));
        prop_assert_eq!(
            overall.should_execute,
            !matches!(overall.severity, Severity::High | Severity::Critical)
        );
        prop_assert!(assessment.validate().is_ok());
        prop_assert_eq!(
            assessment.confidence.low_historical_confidence,
            history.len() < 2
        );
    }

    #[test]
    fn prop_transitions_match_allowed(from in phase_strategy(), to in phase_strategy()) {
        let res = validate_transition(from, to);
        prop_assert_eq!(res.is_ok(), allowed_transitions(from).contains(&to));
    }
}

#[test]
fn test_terminal_phases_have_no_exits() {
    assert!(allowed_transitions(RequestPhase::Completed).is_empty());
    assert!(allowed_transitions(RequestPhase::Failed).is_empty());
}

#[test]
fn test_cpu_request_above_free_capacity() {
    let features = build_features(&nightly_aggregation_job(), &[], &constrained_cluster());
    let assessment = HeuristicPredictor.assess(&features).unwrap();

    let scheduling = assessment.dimension(Dimension::Scheduling).unwrap();
    assert!(scheduling.probability.value() > 50.0);
    assert!(scheduling.severity >= Severity::Medium);
}

#[test]
fn test_peak_memory_above_limit() {
    let job = JobConfig::new("mem", ResourceRequests::new(2.0, 12.0).with_memory_limit(16.0));
    let history: Vec<_> = (1..=4)
        .map(|d| {
            ExecutionRecord::success("mem", day(d))
                .with_usage(ResourceUsage::new(16.2, 1.0, 0.0))
        })
        .collect();
    let features = build_features(&job, &history, &ClusterState::default());
    let assessment = HeuristicPredictor.assess(&features).unwrap();

    let memory = assessment.dimension(Dimension::Memory).unwrap();
    assert_eq!(memory.severity, Severity::High);
    assert!(memory.probability.value() >= 70.0);
    assert!(!assessment.overall.should_execute);
}

#[tokio::test]
async fn test_reasoning_prompt_carries_history() {
    let client = Arc::new(ScriptedClient::always(wire_response([10.0, 5.0, 20.0, 5.0, 10.0])));
    let predictor =
        ReasoningPredictor::new(client.clone(), ReasoningSettings::default()).unwrap();
    let features = build_features(&customer_dedup_job(), &sample_history(), &ClusterState::default());

    let assessment = predictor.predict(&features).await.unwrap();
    assert!(assessment.overall.should_execute);
    assert_eq!(client.calls(), 1);

    let prompts = client.prompts();
    assert!(prompts[0].contains("OOMKilled: exit code 137"));
    assert!(prompts[0].contains("customer_dedup"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_service_times_out() {
    let client = Arc::new(
        ScriptedClient::always(wire_response([10.0; 5])).with_delay(Duration::from_secs(120)),
    );
    let settings = ReasoningSettings {
        timeout_secs: 5,
        ..ReasoningSettings::default()
    };
    let predictor = ReasoningPredictor::new(client, settings).unwrap();
    let features = build_features(&customer_dedup_job(), &sample_history(), &ClusterState::default());

    let err = predictor.predict(&features).await.unwrap_err();
    assert!(matches!(err, PredictError::Unavailable { .. }));
}

#[tokio::test]
async fn test_out_of_range_response_rejected() {
    let client = Arc::new(ScriptedClient::always(wire_response([10.0, 5.0, 140.0, 5.0, 10.0])));
    let predictor = ReasoningPredictor::new(client, ReasoningSettings::default()).unwrap();
    let features = build_features(&customer_dedup_job(), &sample_history(), &ClusterState::default());

    let err = predictor.predict(&features).await.unwrap_err();
    assert!(matches!(err, PredictError::Validation { .. }));
}

#[tokio::test]
async fn test_severity_contradicting_probability_rejected() {
    let mut reply: serde_json::Value =
        serde_json::from_str(&wire_response([10.0, 5.0, 97.0, 5.0, 10.0])).unwrap();
    reply["predictions"]["memory"]["severity"] = serde_json::json!("LOW");
    let client = Arc::new(ScriptedClient::always(reply.to_string()));
    let predictor = ReasoningPredictor::new(client, ReasoningSettings::default()).unwrap();
    let features = build_features(&customer_dedup_job(), &sample_history(), &ClusterState::default());

    let err = predictor.predict(&features).await.unwrap_err();
    match &err {
        PredictError::Validation { location, .. } => {
            assert_eq!(location.as_str(), "/predictions/memory/severity");
        }
        other => panic!("expected validation error, got {other}"),
    }
    assert_eq!(err.dimension(), Some(Dimension::Memory));
}
