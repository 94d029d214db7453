//! Predictor trait

use async_trait::async_trait;
use failcast_features::FeatureSet;
use failcast_model::RiskAssessment;
use std::fmt::Debug;

use crate::error::PredictError;

/// Turns a feature set into a risk assessment
///
/// Implementations must return an assessment whose overall decision follows
/// the aggregation rule; building it through
/// [`RiskAssessment::from_dimensions`] guarantees that.
#[async_trait]
pub trait Predictor: Send + Sync + Debug {
    /// Assess one job
    ///
    /// # Errors
    /// Returns error if no valid assessment could be produced
    async fn predict(&self, features: &FeatureSet) -> Result<RiskAssessment, PredictError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
