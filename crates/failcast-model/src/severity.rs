//! Severity levels and assessment dimensions

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;

/// Severity of a predicted failure
///
/// Ordered: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Unlikely to fail
    Low,
    /// Worth watching
    Medium,
    /// Likely to fail
    High,
    /// Almost certain to fail
    Critical,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Map a probability (0-100) onto a severity band
    ///
    /// `>= 85` critical, `>= 70` high, `>= 40` medium, otherwise low.
    #[inline]
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 85.0 {
            Severity::Critical
        } else if probability >= 70.0 {
            Severity::High
        } else if probability >= 40.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Whether a job at this severity must not be executed
    #[inline]
    #[must_use]
    pub fn blocks_execution(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    /// Upper-case wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(ModelError::UnknownSeverity(other.to_string())),
        }
    }
}

/// A failure category assessed independently of the others
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Pod cannot be placed with the capacity the cluster has left
    Scheduling,
    /// Shared storage fails to mount or runs out of space
    StorageMount,
    /// Job exceeds its memory limit and is killed
    Memory,
    /// Service identity lacks a required permission
    Permissions,
    /// Input data (duplicates) breaks downstream steps
    DataQuality,
}

impl Dimension {
    /// Every dimension, in report order
    pub const ALL: [Dimension; 5] = [
        Dimension::Scheduling,
        Dimension::StorageMount,
        Dimension::Memory,
        Dimension::Permissions,
        Dimension::DataQuality,
    ];

    /// Snake-case key used on the wire
    #[inline]
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Scheduling => "scheduling",
            Dimension::StorageMount => "storage_mount",
            Dimension::Memory => "memory",
            Dimension::Permissions => "permissions",
            Dimension::DataQuality => "data_quality",
        }
    }

    /// Human-readable title
    #[inline]
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Dimension::Scheduling => "Pod Scheduling",
            Dimension::StorageMount => "Storage Mount",
            Dimension::Memory => "Memory (OOMKill)",
            Dimension::Permissions => "Permissions",
            Dimension::DataQuality => "Data Quality",
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
