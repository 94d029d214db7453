//! Reasoning service response format
//!
//! The service is asked for a JSON document shaped like [`WireAssessment`].
//! Its JSON Schema is generated from these types and every response is
//! checked against it before being turned into a [`RiskAssessment`].

use failcast_features::FeatureSet;
use failcast_model::{
    AssessmentSource, Dimension, DimensionAssessment, EffortCategory, EffortEstimate, HourRange,
    Probability, RiskAssessment, Severity,
};
use jsonschema::JSONSchema;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

use crate::error::PredictError;

/// Complete response document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WireAssessment {
    /// Per-dimension predictions
    pub predictions: WirePredictions,
    /// Service's own overall verdict
    pub overall_assessment: WireOverall,
    /// Remediation effort
    pub estimated_effort: WireEffort,
}

/// One entry per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WirePredictions {
    pub scheduling: WireDimension,
    pub storage_mount: WireDimension,
    pub memory: WireDimension,
    pub permissions: WireDimension,
    pub data_quality: WireDimension,
}

impl WirePredictions {
    fn get(&self, dimension: Dimension) -> &WireDimension {
        match dimension {
            Dimension::Scheduling => &self.scheduling,
            Dimension::StorageMount => &self.storage_mount,
            Dimension::Memory => &self.memory,
            Dimension::Permissions => &self.permissions,
            Dimension::DataQuality => &self.data_quality,
        }
    }
}

/// Prediction for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WireDimension {
    /// Failure probability in percent
    #[schemars(range(min = 0, max = 100))]
    pub probability: f64,
    pub severity: Severity,
    pub root_cause: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Overall verdict as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WireOverall {
    pub should_execute: bool,
    pub overall_severity: Severity,
    #[schemars(range(min = 0, max = 100))]
    pub overall_probability: f64,
    pub recommendation: String,
}

/// Effort estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WireEffort {
    pub category: EffortCategory,
    pub story_points: u32,
    pub estimated_hours: WireHours,
}

/// Hour range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WireHours {
    pub min: u32,
    pub max: u32,
}

/// JSON Schema of the response document
///
/// # Errors
/// Returns error if the generated schema cannot be serialized
pub fn response_schema() -> Result<Value, PredictError> {
    serde_json::to_value(schema_for!(WireAssessment))
        .map_err(|e| PredictError::unavailable(format!("response schema: {e}")))
}

/// Remove a surrounding markdown code fence, if any
#[must_use]
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let body = if let Some(start) = trimmed.find("```json") {
        &trimmed[start + "```json".len()..]
    } else if let Some(start) = trimmed.find("```") {
        &trimmed[start + "```".len()..]
    } else {
        return trimmed;
    };
    body.find("```").map_or(body, |end| &body[..end]).trim()
}

/// Compiled response schema
pub struct ResponseValidator {
    schema: JSONSchema,
}

impl ResponseValidator {
    /// Compile the response schema
    ///
    /// # Errors
    /// Returns error if the schema does not compile
    pub fn new() -> Result<Self, PredictError> {
        let schema = response_schema()?;
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| PredictError::unavailable(format!("response schema: {e}")))?;
        Ok(Self { schema: compiled })
    }

    /// Parse and validate response text
    ///
    /// # Errors
    /// - `Unavailable` if the text is not JSON
    /// - `Validation` if the JSON does not match the schema
    pub fn parse(&self, text: &str) -> Result<WireAssessment, PredictError> {
        let body = strip_fences(text);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| PredictError::unavailable(format!("unparsable response: {e}")))?;

        if let Err(mut errors) = self.schema.validate(&value) {
            if let Some(first) = errors.next() {
                let location = first.instance_path.to_string();
                let location = if location.is_empty() {
                    "/".to_string()
                } else {
                    location
                };
                return Err(PredictError::validation(location, first.to_string()));
            }
        }

        serde_json::from_value(value).map_err(|e| PredictError::validation("/", e.to_string()))
    }
}

impl Debug for ResponseValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseValidator").finish_non_exhaustive()
    }
}

impl WireAssessment {
    /// Convert into a risk assessment for `features`
    ///
    /// Per-dimension values are taken from the response and each severity
    /// must match its probability band; the overall decision is always
    /// recomputed. The service's recommendation text is
    /// kept only when its verdict agrees with the recomputed one.
    ///
    /// # Errors
    /// Returns `Validation` if a severity contradicts its probability or a
    /// value breaks a model invariant
    pub fn into_assessment(
        self,
        features: &FeatureSet,
        model: &str,
    ) -> Result<RiskAssessment, PredictError> {
        let mut dimensions = BTreeMap::new();
        for dimension in Dimension::ALL {
            let wire = self.predictions.get(dimension);
            let probability = Probability::new(wire.probability).map_err(|e| {
                PredictError::validation(
                    format!("/predictions/{}/probability", dimension.key()),
                    e.to_string(),
                )
            })?;
            let band = Severity::from_probability(probability.value());
            if band != wire.severity {
                return Err(PredictError::validation(
                    format!("/predictions/{}/severity", dimension.key()),
                    format!(
                        "severity {} does not match probability {} (expected {band})",
                        wire.severity,
                        probability.value()
                    ),
                ));
            }
            let mut assessment =
                DimensionAssessment::new(probability, wire.severity, wire.root_cause.clone());
            assessment.recommendations = wire.recommendations.clone();
            dimensions.insert(dimension, assessment);
        }

        let hours = self.estimated_effort.estimated_hours;
        let hour_range = HourRange::new(hours.min, hours.max).map_err(|e| {
            PredictError::validation("/estimated_effort/estimated_hours", e.to_string())
        })?;

        let mut assessment = RiskAssessment::from_dimensions(
            features.job.job_name.clone(),
            dimensions,
            features.confidence,
            AssessmentSource::ReasoningService {
                model: model.to_string(),
            },
        )?
        .with_effort(EffortEstimate {
            category: self.estimated_effort.category,
            story_points: self.estimated_effort.story_points,
            hour_range,
        });

        let reported = &self.overall_assessment;
        if reported.should_execute == assessment.overall.should_execute
            && reported.overall_severity == assessment.overall.severity
        {
            assessment = assessment.with_recommendation(reported.recommendation.clone());
        } else {
            tracing::warn!(
                job = %assessment.job_name,
                reported_severity = %reported.overall_severity,
                reported_execute = reported.should_execute,
                severity = %assessment.overall.severity,
                should_execute = assessment.overall.should_execute,
                "Service verdict disagrees with dimension results; using recomputed verdict"
            );
        }

        Ok(assessment)
    }
}
