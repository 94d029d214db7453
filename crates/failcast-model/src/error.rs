//! Error types for the data model

use crate::severity::Dimension;

/// Invariant violations detected while building model values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Probability outside [0, 100] or not a finite number
    #[error("probability out of range: {0} (expected 0-100)")]
    ProbabilityOutOfRange(f64),

    /// Unknown severity name
    #[error("unknown severity: '{0}'")]
    UnknownSeverity(String),

    /// Assessment lacks a required dimension
    #[error("missing assessment for dimension: {0}")]
    MissingDimension(Dimension),

    /// Hour range with min greater than max
    #[error("invalid hour range: {min}-{max}")]
    InvalidHourRange { min: u32, max: u32 },

    /// Stored overall decision does not follow from the dimensions
    #[error("overall decision inconsistent with dimensions: {0}")]
    InconsistentOverall(String),

    /// Fingerprint could not be computed
    #[error("fingerprint error: {0}")]
    Fingerprint(String),
}
