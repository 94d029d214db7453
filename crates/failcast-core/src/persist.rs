//! Saving assessments to disk

use chrono::{DateTime, Utc};
use failcast_model::RiskAssessment;
use failcast_predict::RequestId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::FailcastError;
use crate::pipeline::Prediction;

/// Saved prediction file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPrediction {
    /// Job assessed
    pub job_name: String,
    /// When the file was written
    pub timestamp: DateTime<Utc>,
    /// Request that produced the assessment
    pub request_id: RequestId,
    /// Assessment
    pub assessment: RiskAssessment,
}

/// File name for a job's prediction saved at `at`
///
/// Characters outside `[A-Za-z0-9_-]` in the job name become `_`.
#[must_use]
pub fn prediction_file_name(job_name: &str, at: DateTime<Utc>) -> String {
    let job: String = job_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("prediction_{job}_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write a prediction into `dir`, creating it if needed
///
/// # Errors
/// Returns `Persist` if the directory or file cannot be written
pub fn save_prediction(
    dir: &Path,
    prediction: &Prediction,
    at: DateTime<Utc>,
) -> Result<PathBuf, FailcastError> {
    let saved = SavedPrediction {
        job_name: prediction.assessment.job_name.clone(),
        timestamp: at,
        request_id: prediction.request_id,
        assessment: (*prediction.assessment).clone(),
    };
    let path = dir.join(prediction_file_name(&saved.job_name, at));

    std::fs::create_dir_all(dir).map_err(|e| FailcastError::persist(dir, e))?;
    let json = serde_json::to_string_pretty(&saved).map_err(|e| FailcastError::persist(&path, e))?;
    std::fs::write(&path, json).map_err(|e| FailcastError::persist(&path, e))?;

    tracing::info!(path = %path.display(), request = %prediction.request_id, "Saved prediction");
    Ok(path)
}

/// Read a saved prediction back
///
/// The assessment is re-validated, so a hand-edited file whose overall
/// decision no longer matches its dimensions is rejected.
///
/// # Errors
/// Returns `Persist` if the file cannot be read, parsed, or validated
pub fn load_prediction(path: &Path) -> Result<SavedPrediction, FailcastError> {
    let text = std::fs::read_to_string(path).map_err(|e| FailcastError::persist(path, e))?;
    let saved: SavedPrediction =
        serde_json::from_str(&text).map_err(|e| FailcastError::persist(path, e))?;
    saved
        .assessment
        .validate()
        .map_err(|e| FailcastError::persist(path, e))?;
    Ok(saved)
}
