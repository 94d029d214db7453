//! Risk assessment output types

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::aggregate::aggregate;
use crate::error::ModelError;
use crate::severity::{Dimension, Severity};

/// Below this many records a job is treated as a cold start
pub const MIN_HISTORY_RECORDS: usize = 2;

/// Record count at which confidence reaches 1.0
pub const FULL_CONFIDENCE_RECORDS: usize = 5;

/// Failure probability in percent, always within [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    /// Zero percent
    pub const ZERO: Probability = Probability(0.0);

    /// Validate a probability
    ///
    /// # Errors
    /// Returns error if the value is not finite or outside [0, 100]
    #[inline]
    pub fn new(value: f64) -> Result<Self, ModelError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ModelError::ProbabilityOutOfRange(value))
        }
    }

    /// Clamp into [0, 100] and round to one decimal; NaN becomes 0
    #[inline]
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self((value.clamp(0.0, 100.0) * 10.0).round() / 10.0)
    }

    /// Percent value
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Probability {
    type Error = ModelError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> Self {
        p.0
    }
}

impl Display for Probability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// Assessment of one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionAssessment {
    /// Failure probability
    pub probability: Probability,
    /// Severity
    pub severity: Severity,
    /// Root cause
    pub cause: String,
    /// Preventive actions, most important first
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl DimensionAssessment {
    /// Create with explicit severity
    #[inline]
    #[must_use]
    pub fn new(probability: Probability, severity: Severity, cause: impl Into<String>) -> Self {
        Self {
            probability,
            severity,
            cause: cause.into(),
            recommendations: Vec::new(),
        }
    }

    /// Create with severity taken from the probability band
    #[inline]
    #[must_use]
    pub fn from_probability(probability: Probability, cause: impl Into<String>) -> Self {
        Self::new(
            probability,
            Severity::from_probability(probability.value()),
            cause,
        )
    }

    /// Append a recommendation
    #[inline]
    #[must_use]
    pub fn recommend(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }
}

/// Overall go/no-go decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallDecision {
    /// Whether the job should run
    pub should_execute: bool,
    /// Overall severity
    pub severity: Severity,
    /// Overall probability
    pub probability: Probability,
    /// Human-readable recommendation
    pub recommendation: String,
}

/// Effort category for remediation work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffortCategory {
    /// Configuration tweak
    Simple,
    /// Some investigation
    Medium,
    /// Multi-team change
    Complex,
}

/// Inclusive range of hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    /// Lower bound
    pub min: u32,
    /// Upper bound
    pub max: u32,
}

impl HourRange {
    /// Create range
    ///
    /// # Errors
    /// Returns error if `min > max`
    #[inline]
    pub fn new(min: u32, max: u32) -> Result<Self, ModelError> {
        if min > max {
            return Err(ModelError::InvalidHourRange { min, max });
        }
        Ok(Self { min, max })
    }
}

/// Estimated remediation effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortEstimate {
    /// Category
    pub category: EffortCategory,
    /// Story points
    pub story_points: u32,
    /// Hour range
    pub hour_range: HourRange,
}

impl EffortEstimate {
    /// Standard estimate for an overall severity
    #[must_use]
    pub fn for_severity(severity: Severity) -> Self {
        let (category, story_points, min, max) = match severity {
            Severity::Low => (EffortCategory::Simple, 1, 1, 2),
            Severity::Medium => (EffortCategory::Medium, 3, 4, 8),
            Severity::High => (EffortCategory::Complex, 8, 16, 24),
            Severity::Critical => (EffortCategory::Complex, 13, 24, 40),
        };
        Self {
            category,
            story_points,
            hour_range: HourRange { min, max },
        }
    }
}

/// How much history backs an assessment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    /// 0.0 - 1.0
    pub score: f64,
    /// Fewer than [`MIN_HISTORY_RECORDS`] records were available
    pub low_historical_confidence: bool,
    /// Records considered
    pub history_records: usize,
}

impl Confidence {
    /// Confidence for a record count: `min(1, n / 5)`, low below 2 records
    #[inline]
    #[must_use]
    pub fn from_record_count(records: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let score = (records as f64 / FULL_CONFIDENCE_RECORDS as f64).min(1.0);
        Self {
            score,
            low_historical_confidence: records < MIN_HISTORY_RECORDS,
            history_records: records,
        }
    }
}

/// Which predictor produced an assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssessmentSource {
    /// Local rule set
    Heuristic,
    /// External reasoning service
    ReasoningService {
        /// Model identifier reported to the service
        model: String,
    },
}

/// Structured prediction for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Job assessed
    pub job_name: String,
    /// Per-dimension results
    pub dimensions: BTreeMap<Dimension, DimensionAssessment>,
    /// Overall decision
    pub overall: OverallDecision,
    /// Effort estimate
    pub effort: EffortEstimate,
    /// History coverage
    pub confidence: Confidence,
    /// Producer
    pub source: AssessmentSource,
}

impl RiskAssessment {
    /// Build an assessment, deriving the overall decision and effort
    ///
    /// # Errors
    /// Returns error if a dimension is missing
    pub fn from_dimensions(
        job_name: impl Into<String>,
        dimensions: BTreeMap<Dimension, DimensionAssessment>,
        confidence: Confidence,
        source: AssessmentSource,
    ) -> Result<Self, ModelError> {
        let agg = aggregate(&dimensions)?;
        let recommendation = default_recommendation(&dimensions, agg.severity, confidence);

        Ok(Self {
            job_name: job_name.into(),
            dimensions,
            overall: OverallDecision {
                should_execute: agg.should_execute,
                severity: agg.severity,
                probability: agg.probability,
                recommendation,
            },
            effort: EffortEstimate::for_severity(agg.severity),
            confidence,
            source,
        })
    }

    /// Replace the overall recommendation text
    #[inline]
    #[must_use]
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.overall.recommendation = recommendation.into();
        self
    }

    /// Replace the effort estimate
    #[inline]
    #[must_use]
    pub fn with_effort(mut self, effort: EffortEstimate) -> Self {
        self.effort = effort;
        self
    }

    /// Dimension result
    #[inline]
    #[must_use]
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionAssessment> {
        self.dimensions.get(&dimension)
    }

    /// Dimensions at or above a severity, highest first
    #[must_use]
    pub fn dimensions_at_least(&self, severity: Severity) -> Vec<Dimension> {
        let mut found: Vec<_> = self
            .dimensions
            .iter()
            .filter(|(_, a)| a.severity >= severity)
            .map(|(d, a)| (*d, a.severity))
            .collect();
        found.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        found.into_iter().map(|(d, _)| d).collect()
    }

    /// Check that a (possibly deserialized) assessment obeys the aggregation rule
    ///
    /// # Errors
    /// Returns error describing the first violated invariant
    pub fn validate(&self) -> Result<(), ModelError> {
        let agg = aggregate(&self.dimensions)?;
        if agg.severity != self.overall.severity {
            return Err(ModelError::InconsistentOverall(format!(
                "severity {} but dimensions give {}",
                self.overall.severity, agg.severity
            )));
        }
        if agg.should_execute != self.overall.should_execute {
            return Err(ModelError::InconsistentOverall(format!(
                "should_execute {} at severity {}",
                self.overall.should_execute, self.overall.severity
            )));
        }
        if (agg.probability.value() - self.overall.probability.value()).abs() > 0.05 {
            return Err(ModelError::InconsistentOverall(format!(
                "probability {} but dimensions give {}",
                self.overall.probability, agg.probability
            )));
        }
        HourRange::new(self.effort.hour_range.min, self.effort.hour_range.max)?;
        Ok(())
    }
}

fn default_recommendation(
    dimensions: &BTreeMap<Dimension, DimensionAssessment>,
    severity: Severity,
    confidence: Confidence,
) -> String {
    let flagged: Vec<&str> = dimensions
        .iter()
        .filter(|(_, a)| a.severity >= Severity::Medium.max(severity))
        .map(|(d, _)| d.title())
        .collect();

    let mut text = match severity {
        Severity::Critical | Severity::High => format!(
            "Do not execute until {} risk is resolved",
            flagged.join(", ")
        ),
        Severity::Medium => format!("Safe to execute with monitoring on {}", flagged.join(", ")),
        Severity::Low => "Safe to execute".to_string(),
    };

    if confidence.low_historical_confidence {
        text.push_str(" (low historical confidence: based on configuration only)");
    }
    text
}
