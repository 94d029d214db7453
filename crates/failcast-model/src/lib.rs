//! Failcast data model
//!
//! Typed representation of everything the prediction pipeline reads and
//! produces:
//! - [`JobConfig`]: a candidate job and its resource requests
//! - [`ExecutionRecord`]: one historical run of a job
//! - [`ClusterState`]: capacity snapshot of the cluster the job targets
//! - [`RiskAssessment`]: the structured prediction output
//!
//! The overall decision of a [`RiskAssessment`] is never supplied by the
//! caller. It is always derived from the per-dimension results through
//! [`aggregate::aggregate`], so every assessment obeys the same rule.
//!
//! # Example
//!
//! ```rust
//! use failcast_model::{
//!     AssessmentSource, Confidence, Dimension, DimensionAssessment, Probability, RiskAssessment,
//! };
//!
//! let dimensions = Dimension::ALL
//!     .iter()
//!     .map(|d| (*d, DimensionAssessment::from_probability(Probability::clamped(12.0), "ok")))
//!     .collect();
//!
//! let assessment = RiskAssessment::from_dimensions(
//!     "nightly_load",
//!     dimensions,
//!     Confidence::from_record_count(5),
//!     AssessmentSource::Heuristic,
//! )
//! .unwrap();
//! assert!(assessment.overall.should_execute);
//! ```

#![warn(unreachable_pub)]

pub mod aggregate;
pub mod assessment;
pub mod error;
pub mod hash;
pub mod job;
pub mod severity;

pub use aggregate::{aggregate, AggregateResult, DIMENSION_WEIGHTS};
pub use assessment::{
    AssessmentSource, Confidence, DimensionAssessment, EffortCategory, EffortEstimate,
    HourRange, OverallDecision, Probability, RiskAssessment, FULL_CONFIDENCE_RECORDS,
    MIN_HISTORY_RECORDS,
};
pub use error::ModelError;
pub use hash::Fingerprint;
pub use job::{
    ClusterState, ExecutionRecord, GraphShape, InputProfile, JobConfig, Outcome, ResourceRequests,
    ResourceUsage, StorageMount,
};
pub use severity::{Dimension, Severity};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
