//! Prediction pipeline
//!
//! ```text
//! store lookup -> feature building -> tracked prediction -> assessment
//! ```
//!
//! Store lookups happen before a request id is registered, so a missing
//! job never leaves a failed request behind.

use failcast_features::{FeatureBuilder, FeatureSet};
use failcast_model::RiskAssessment;
use failcast_predict::{
    HeuristicPredictor, Predictor, ReasoningClient, ReasoningPredictor, RequestId,
    RequestTracker,
};
use failcast_store::RecordStore;
use std::sync::Arc;

use crate::config::{FailcastConfig, PredictorMode};
use crate::error::FailcastError;

/// Default number of history records per job
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Outcome of one request
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Request identity
    pub request_id: RequestId,
    /// Assessment (shared with the result cache)
    pub assessment: Arc<RiskAssessment>,
}

/// Ties store, feature builder and predictor together
#[derive(Debug, Clone)]
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    predictor: Arc<dyn Predictor>,
    narrator: Option<Arc<ReasoningPredictor>>,
    builder: FeatureBuilder,
    tracker: RequestTracker,
    history_limit: usize,
}

impl Pipeline {
    /// Create pipeline with default limits
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            store,
            predictor,
            narrator: None,
            builder: FeatureBuilder::new(),
            tracker: RequestTracker::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Assemble from configuration
    ///
    /// Reasoning mode requires a client; the same client also serves
    /// failure narratives.
    ///
    /// # Errors
    /// Returns `Config` if reasoning mode is selected without a client, or
    /// if the reasoning predictor cannot be built
    pub fn from_config(
        config: &FailcastConfig,
        store: Arc<dyn RecordStore>,
        client: Option<Arc<dyn ReasoningClient>>,
    ) -> Result<Self, FailcastError> {
        config.validate()?;

        let pipeline = match (config.predictor, client) {
            (PredictorMode::Heuristic, _) => {
                Self::new(store, Arc::new(HeuristicPredictor::new()))
            }
            (PredictorMode::Reasoning, Some(client)) => {
                let reasoning = Arc::new(
                    ReasoningPredictor::new(client, config.reasoning.clone())
                        .map_err(|e| FailcastError::config(e.to_string()))?,
                );
                Self::new(store, reasoning.clone()).with_narrator(reasoning)
            }
            (PredictorMode::Reasoning, None) => {
                return Err(FailcastError::config(
                    "reasoning predictor selected but no reasoning client configured",
                ));
            }
        };

        tracing::info!(
            predictor = pipeline.predictor.name(),
            history_limit = config.history_limit,
            "Pipeline ready"
        );

        Ok(pipeline
            .with_tracker(RequestTracker::new(config.cache.capacity, config.cache.ttl()))
            .with_history_limit(config.history_limit))
    }

    /// With a request tracker
    #[inline]
    #[must_use]
    pub fn with_tracker(mut self, tracker: RequestTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// With per-job history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// With a reasoning predictor for failure narratives
    #[inline]
    #[must_use]
    pub fn with_narrator(mut self, narrator: Arc<ReasoningPredictor>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Record store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Request tracker
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Name of the active predictor
    #[inline]
    #[must_use]
    pub fn predictor_name(&self) -> &'static str {
        self.predictor.name()
    }

    /// Reasoning predictor used for narratives, if any
    #[inline]
    #[must_use]
    pub fn narrator(&self) -> Option<&Arc<ReasoningPredictor>> {
        self.narrator.as_ref()
    }

    /// Build features for a job from the store
    ///
    /// # Errors
    /// Returns `Store` if the job is unknown or a source is unavailable
    pub fn features(&self, job_name: &str) -> Result<FeatureSet, FailcastError> {
        let config = self.store.get_job_config(job_name)?;
        let history = self.store.list_history(job_name, self.history_limit)?;
        let cluster = self.store.cluster_state()?;

        let features = self.builder.build(&config, &history, &cluster);
        let fingerprint = features
            .fingerprint()
            .map(|f| f.short())
            .unwrap_or_default();
        tracing::debug!(
            job = %job_name,
            %fingerprint,
            records = features.history.records,
            failures = features.history.failures,
            cold_start = features.is_cold_start(),
            "Built features"
        );
        Ok(features)
    }

    /// Assess a job under a fresh request id
    ///
    /// # Errors
    /// See [`Pipeline::assess_with_id`]
    pub async fn assess(&self, job_name: &str) -> Result<Prediction, FailcastError> {
        self.assess_with_id(RequestId::new(), job_name).await
    }

    /// Assess a job under a caller-chosen request id
    ///
    /// Resubmitting a completed id returns the cached assessment without
    /// calling the predictor again.
    ///
    /// # Errors
    /// - `Store` if the job is unknown or a source is unavailable
    /// - `Predict` if the predictor fails or the id is pending or failed
    pub async fn assess_with_id(
        &self,
        request_id: RequestId,
        job_name: &str,
    ) -> Result<Prediction, FailcastError> {
        if let Some(assessment) = self.tracker.cached(request_id) {
            tracing::debug!(request = %request_id, job = %job_name, "Cache hit");
            return Ok(Prediction {
                request_id,
                assessment,
            });
        }

        let features = self.features(job_name)?;
        tracing::info!(
            request = %request_id,
            job = %job_name,
            predictor = self.predictor.name(),
            "Assessing job"
        );

        let predictor = Arc::clone(&self.predictor);
        let assessment = self
            .tracker
            .run(request_id, || async move { predictor.predict(&features).await })
            .await
            .inspect_err(|e| {
                tracing::error!(request = %request_id, job = %job_name, error = %e, "Prediction failed");
            })?;

        tracing::info!(
            request = %request_id,
            job = %job_name,
            severity = %assessment.overall.severity,
            should_execute = assessment.overall.should_execute,
            "Assessment complete"
        );
        Ok(Prediction {
            request_id,
            assessment,
        })
    }
}
