//! Error types for predictors
//!
//! Every failure is surfaced; none is turned into a default assessment.

use failcast_model::{Dimension, ModelError};

use crate::tracker::{RequestId, RequestPhase};

/// Prediction failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum PredictError {
    /// Reasoning service failed, timed out, or returned unparsable content
    #[error("prediction unavailable: {reason}")]
    Unavailable { reason: String },

    /// Response parsed but does not conform to the assessment schema
    #[error("response validation failed at {location}: {reason}")]
    Validation {
        /// Dimension the offending value belongs to, if any
        dimension: Option<Dimension>,
        /// JSON pointer of the offending value
        location: String,
        /// Validator message
        reason: String,
    },

    /// Request id already ended in failure
    #[error("request {id} already failed: {reason}")]
    RequestFailed { id: RequestId, reason: String },

    /// Request id is being processed
    #[error("request {0} is already in flight")]
    InFlight(RequestId),

    /// Lifecycle violation
    #[error("illegal request transition: {from:?} -> {to:?}")]
    IllegalTransition { from: RequestPhase, to: RequestPhase },

    /// Assessment violated a model invariant
    #[error("invalid assessment: {0}")]
    Model(#[from] ModelError),
}

impl PredictError {
    /// Create unavailable error
    #[inline]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create validation error at a JSON pointer
    #[inline]
    pub fn validation(location: impl Into<String>, reason: impl Into<String>) -> Self {
        let location = location.into();
        Self::Validation {
            dimension: dimension_at(&location),
            location,
            reason: reason.into(),
        }
    }

    /// Dimension the error concerns, if known
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            Self::Validation { dimension, .. } => *dimension,
            Self::Model(ModelError::MissingDimension(d)) => Some(*d),
            _ => None,
        }
    }
}

/// Dimension named by a pointer like `/predictions/memory/probability`
fn dimension_at(location: &str) -> Option<Dimension> {
    let mut segments = location.trim_start_matches('/').split('/');
    if segments.next() != Some("predictions") {
        return None;
    }
    let key = segments.next()?;
    Dimension::ALL.iter().copied().find(|d| d.key() == key)
}
