//! Predictor backed by the external reasoning service

use async_trait::async_trait;
use failcast_features::FeatureSet;
use failcast_model::RiskAssessment;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{
    complete_within, ReasoningClient, ReasoningRequest, DEFAULT_ENDPOINT, DEFAULT_MODEL,
};
use crate::error::PredictError;
use crate::heuristic::HeuristicPredictor;
use crate::predictor::Predictor;
use crate::prompt::prediction_prompt;
use crate::schema::ResponseValidator;

/// Reasoning service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningSettings {
    /// Messages API endpoint
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Token budget for predictions
    pub max_tokens: u32,
    /// Token budget for failure analyses
    pub analysis_max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Deadline per call, seconds
    pub timeout_secs: u64,
}

impl ReasoningSettings {
    /// Deadline per call
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            analysis_max_tokens: 2048,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

/// Asks the reasoning service for assessments
///
/// Cold-start jobs are never sent: with too little history the service
/// would only restate the configuration, so they go to the rule set.
#[derive(Debug, Clone)]
pub struct ReasoningPredictor {
    client: Arc<dyn ReasoningClient>,
    validator: Arc<ResponseValidator>,
    fallback: HeuristicPredictor,
    settings: ReasoningSettings,
}

impl ReasoningPredictor {
    /// Create predictor
    ///
    /// # Errors
    /// Returns error if the response schema fails to compile
    pub fn new(
        client: Arc<dyn ReasoningClient>,
        settings: ReasoningSettings,
    ) -> Result<Self, PredictError> {
        Ok(Self {
            client,
            validator: Arc::new(ResponseValidator::new()?),
            fallback: HeuristicPredictor::new(),
            settings,
        })
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ReasoningSettings {
        &self.settings
    }

    /// Free-form completion with the analysis token budget
    ///
    /// # Errors
    /// Returns `Unavailable` on timeout or client failure
    pub async fn narrate(&self, prompt: String) -> Result<String, PredictError> {
        let request = ReasoningRequest {
            prompt,
            max_tokens: self.settings.analysis_max_tokens,
            temperature: self.settings.temperature,
        };
        complete_within(self.client.as_ref(), &request, self.settings.timeout()).await
    }
}

#[async_trait]
impl Predictor for ReasoningPredictor {
    async fn predict(&self, features: &FeatureSet) -> Result<RiskAssessment, PredictError> {
        let job = &features.job.job_name;
        if features.is_cold_start() {
            tracing::info!(
                job = %job,
                records = features.history.records,
                "Cold start: assessing from configuration only"
            );
            return self.fallback.assess(features);
        }

        let request = ReasoningRequest {
            prompt: prediction_prompt(features)?,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        tracing::info!(job = %job, model = %self.client.model(), "Requesting assessment");
        let text = complete_within(self.client.as_ref(), &request, self.settings.timeout())
            .await
            .inspect_err(|e| tracing::warn!(job = %job, error = %e, "Reasoning call failed"))?;

        let wire = self.validator.parse(&text).inspect_err(|e| {
            tracing::warn!(job = %job, error = %e, "Rejected reasoning response");
        })?;
        wire.into_assessment(features, self.client.model())
    }

    fn name(&self) -> &'static str {
        "reasoning"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use chrono::{TimeZone, Utc};
    use failcast_features::build_features;
    use failcast_model::{
        AssessmentSource, ClusterState, ExecutionRecord, JobConfig, ResourceRequests, Severity,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Scripted {
        reply: Result<String, ClientError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn replying(reply: Result<String, ClientError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReasoningClient for Scripted {
        async fn complete(&self, _: &ReasoningRequest) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    const LOW_RISK: &str = r#"{
        "predictions": {
            "scheduling": {"probability": 10, "severity": "LOW", "root_cause": "fits", "recommendations": []},
            "storage_mount": {"probability": 5, "severity": "LOW", "root_cause": "none", "recommendations": []},
            "memory": {"probability": 20, "severity": "LOW", "root_cause": "headroom", "recommendations": []},
            "permissions": {"probability": 5, "severity": "LOW", "root_cause": "ok", "recommendations": []},
            "data_quality": {"probability": 10, "severity": "LOW", "root_cause": "clean", "recommendations": []}
        },
        "overall_assessment": {
            "should_execute": true,
            "overall_severity": "LOW",
            "overall_probability": 11.8,
            "recommendation": "Run it"
        },
        "estimated_effort": {"category": "SIMPLE", "story_points": 1, "estimated_hours": {"min": 1, "max": 2}}
    }"#;

    fn warm_features() -> FeatureSet {
        let day = |d| Utc.with_ymd_and_hms(2024, 10, d, 2, 0, 0).unwrap();
        let history = vec![
            ExecutionRecord::success("etl", day(2)),
            ExecutionRecord::success("etl", day(1)),
        ];
        build_features(
            &JobConfig::new("etl", ResourceRequests::new(1.0, 2.0)),
            &history,
            &ClusterState::default(),
        )
    }

    #[tokio::test]
    async fn uses_service_response() {
        let client = Scripted::replying(Ok(LOW_RISK.to_string()));
        let predictor = ReasoningPredictor::new(client.clone(), ReasoningSettings::default()).unwrap();

        let a = predictor.predict(&warm_features()).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.overall.severity, Severity::Low);
        // 0.25*10 + 0.15*5 + 0.30*20 + 0.15*5 + 0.15*10
        assert_eq!(a.overall.probability.value(), 11.5);
        assert_eq!(a.overall.recommendation, "Run it");
        assert_eq!(
            a.source,
            AssessmentSource::ReasoningService {
                model: "scripted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cold_start_skips_service() {
        let client = Scripted::replying(Ok(LOW_RISK.to_string()));
        let predictor = ReasoningPredictor::new(client.clone(), ReasoningSettings::default()).unwrap();
        let cold = build_features(
            &JobConfig::new("etl", ResourceRequests::new(1.0, 2.0)),
            &[],
            &ClusterState::default(),
        );

        let a = predictor.predict(&cold).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(a.source, AssessmentSource::Heuristic);
        assert!(a.confidence.low_historical_confidence);
    }

    #[tokio::test]
    async fn malformed_response_is_unavailable() {
        let client = Scripted::replying(Ok("Sorry, no JSON today".to_string()));
        let predictor = ReasoningPredictor::new(client, ReasoningSettings::default()).unwrap();
        let err = predictor.predict(&warm_features()).await.unwrap_err();
        assert!(matches!(err, PredictError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn client_failure_is_unavailable() {
        let client = Scripted::replying(Err(ClientError::Status {
            status: 529,
            body: "overloaded".to_string(),
        }));
        let predictor = ReasoningPredictor::new(client, ReasoningSettings::default()).unwrap();
        let err = predictor.predict(&warm_features()).await.unwrap_err();
        assert!(err.to_string().contains("529"));
    }
}
