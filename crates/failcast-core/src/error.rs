//! Pipeline error type
//!
//! Every error reports the [`Stage`] it came from, and the dimension when
//! one is involved.

use failcast_model::{Dimension, ModelError};
use failcast_predict::{PredictError, RequestId};
use failcast_store::StoreError;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Startup configuration
    Config,
    /// Record store lookup
    Store,
    /// Feature building
    Features,
    /// Predictor call
    Predict,
    /// Response or assessment validation
    Validate,
    /// Writing results
    Persist,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Config => "config",
            Stage::Store => "store",
            Stage::Features => "features",
            Stage::Predict => "predict",
            Stage::Validate => "validate",
            Stage::Persist => "persist",
        })
    }
}

/// Main pipeline error
#[derive(Debug, Clone, thiserror::Error)]
pub enum FailcastError {
    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Record store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Feature set could not be fingerprinted
    #[error("feature building failed: {0}")]
    Features(#[from] ModelError),

    /// Prediction failure
    #[error(transparent)]
    Predict(#[from] PredictError),

    /// Prediction was cancelled before completing
    #[error("prediction {0} cancelled")]
    Cancelled(RequestId),

    /// Prediction task ended abnormally
    #[error("prediction task for '{job}' aborted: {reason}")]
    Task { job: String, reason: String },

    /// Result could not be written or read back
    #[error("failed to persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

impl FailcastError {
    /// Create config error
    #[inline]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create persist error
    #[inline]
    pub fn persist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stage that failed
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Config,
            Self::Store(_) => Stage::Store,
            Self::Features(_) => Stage::Features,
            Self::Predict(PredictError::Validation { .. } | PredictError::Model(_)) => {
                Stage::Validate
            }
            Self::Predict(_) | Self::Cancelled(_) | Self::Task { .. } => Stage::Predict,
            Self::Persist { .. } => Stage::Persist,
        }
    }

    /// Dimension involved, if any
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            Self::Predict(err) => err.dimension(),
            _ => None,
        }
    }

    /// Record lookup found nothing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_not_found())
    }

    /// No assessment could be produced for the job
    #[inline]
    #[must_use]
    pub fn is_prediction_failure(&self) -> bool {
        matches!(
            self,
            Self::Predict(_) | Self::Cancelled(_) | Self::Task { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failcast_store::RecordKind;

    #[test]
    fn stages() {
        let err = FailcastError::from(StoreError::not_found(RecordKind::JobConfig, "x"));
        assert_eq!(err.stage(), Stage::Store);
        assert!(err.is_not_found());

        let err = FailcastError::from(PredictError::unavailable("timeout"));
        assert_eq!(err.stage(), Stage::Predict);
        assert!(err.is_prediction_failure());

        let err = FailcastError::from(PredictError::validation(
            "/predictions/permissions/severity",
            "bad",
        ));
        assert_eq!(err.stage(), Stage::Validate);
        assert_eq!(err.dimension(), Some(Dimension::Permissions));

        let err = FailcastError::persist("/tmp/x.json", "read-only");
        assert_eq!(err.stage(), Stage::Persist);
        assert_eq!(err.to_string(), "failed to persist /tmp/x.json: read-only");
    }
}
