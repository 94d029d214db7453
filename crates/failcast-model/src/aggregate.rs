//! Overall decision from per-dimension results
//!
//! The rule is fixed:
//! - overall severity is the highest dimension severity
//! - if any dimension is `HIGH` or `CRITICAL`, the overall probability is the
//!   maximum dimension probability
//! - otherwise it is the weighted average under [`DIMENSION_WEIGHTS`]
//! - `should_execute` is false iff the overall severity is `HIGH` or `CRITICAL`

use std::collections::BTreeMap;

use crate::assessment::{DimensionAssessment, Probability};
use crate::error::ModelError;
use crate::severity::{Dimension, Severity};

/// Weight of each dimension in the weighted average (sums to 1)
pub const DIMENSION_WEIGHTS: [(Dimension, f64); 5] = [
    (Dimension::Scheduling, 0.25),
    (Dimension::StorageMount, 0.15),
    (Dimension::Memory, 0.30),
    (Dimension::Permissions, 0.15),
    (Dimension::DataQuality, 0.15),
];

/// Output of [`aggregate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateResult {
    /// Overall probability
    pub probability: Probability,
    /// Overall severity
    pub severity: Severity,
    /// Go/no-go
    pub should_execute: bool,
}

/// Aggregate per-dimension assessments into the overall decision
///
/// # Errors
/// Returns [`ModelError::MissingDimension`] if any dimension is absent
pub fn aggregate(
    dimensions: &BTreeMap<Dimension, DimensionAssessment>,
) -> Result<AggregateResult, ModelError> {
    let mut severity = Severity::Low;
    let mut max_probability: f64 = 0.0;
    let mut weighted = 0.0;

    for (dimension, weight) in DIMENSION_WEIGHTS {
        let assessment = dimensions
            .get(&dimension)
            .ok_or(ModelError::MissingDimension(dimension))?;
        let p = assessment.probability.value();
        severity = severity.max(assessment.severity);
        max_probability = max_probability.max(p);
        weighted += p * weight;
    }

    let probability = if severity.blocks_execution() {
        max_probability
    } else {
        weighted
    };

    Ok(AggregateResult {
        probability: Probability::clamped(probability),
        severity,
        should_execute: !severity.blocks_execution(),
    })
}
