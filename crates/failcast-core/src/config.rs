//! Configuration
//!
//! Loaded from an optional TOML file; every field has a default, so an
//! empty file (or none) is a valid configuration.
//!
//! ```toml
//! predictor = "heuristic"
//! history_limit = 20
//!
//! [data]
//! jobs = "exports/job_configs.json"
//!
//! [reasoning]
//! timeout_secs = 10
//! ```

use failcast_predict::{ApiKey, ReasoningSettings, API_KEY_ENV};
use failcast_store::DataPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FailcastError;

/// Which predictor answers requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorMode {
    /// External reasoning service (needs an API key)
    #[default]
    Reasoning,
    /// Local rules only
    Heuristic,
}

/// Source file locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Job configuration file
    pub jobs: PathBuf,
    /// Execution history file
    pub history: PathBuf,
    /// Cluster capacity file
    pub cluster: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataPaths::default().into()
    }
}

impl From<DataPaths> for DataConfig {
    fn from(paths: DataPaths) -> Self {
        Self {
            jobs: paths.jobs,
            history: paths.history,
            cluster: paths.cluster,
        }
    }
}

impl From<DataConfig> for DataPaths {
    fn from(config: DataConfig) -> Self {
        DataPaths {
            jobs: config.jobs,
            history: config.history,
            cluster: config.cluster,
        }
    }
}

/// Result cache limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached assessments
    pub capacity: u64,
    /// Lifetime of a cached assessment, seconds
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Lifetime as a duration
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            ttl_secs: 3_600,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailcastConfig {
    /// Source files
    pub data: DataConfig,
    /// Predictor selection
    pub predictor: PredictorMode,
    /// Reasoning service settings
    pub reasoning: ReasoningSettings,
    /// Result cache
    pub cache: CacheConfig,
    /// Most recent runs considered per job
    pub history_limit: usize,
    /// Where saved predictions go
    pub output_dir: PathBuf,
}

impl FailcastConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns `Config` if the text is not valid TOML for this layout or
    /// fails validation
    pub fn from_toml(text: &str) -> Result<Self, FailcastError> {
        let config: Self = toml::from_str(text).map_err(|e| FailcastError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    ///
    /// # Errors
    /// Returns `Config` if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, FailcastError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FailcastError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)?;
        tracing::info!(path = %path.display(), predictor = ?config.predictor, "Loaded configuration");
        Ok(config)
    }

    /// Load from a file if given, defaults otherwise
    ///
    /// # Errors
    /// Returns `Config` if a given file cannot be loaded
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, FailcastError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// With all source files in one directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data = DataPaths::in_dir(dir).into();
        self
    }

    /// With predictor mode
    #[inline]
    #[must_use]
    pub fn with_predictor(mut self, mode: PredictorMode) -> Self {
        self.predictor = mode;
        self
    }

    /// With reasoning call deadline
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.reasoning.timeout_secs = secs;
        self
    }

    /// With history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// With output directory
    #[inline]
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// With cache limits
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, capacity: u64, ttl_secs: u64) -> Self {
        self.cache = CacheConfig { capacity, ttl_secs };
        self
    }

    /// Source file locations
    #[inline]
    #[must_use]
    pub fn data_paths(&self) -> DataPaths {
        self.data.clone().into()
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `Config` naming the first invalid field
    pub fn validate(&self) -> Result<(), FailcastError> {
        if self.reasoning.timeout_secs == 0 {
            return Err(FailcastError::config("reasoning.timeout_secs must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.reasoning.temperature) {
            return Err(FailcastError::config(
                "reasoning.temperature must be within [0, 1]",
            ));
        }
        if self.reasoning.max_tokens == 0 || self.reasoning.analysis_max_tokens == 0 {
            return Err(FailcastError::config("reasoning token budgets must be > 0"));
        }
        if self.cache.capacity == 0 {
            return Err(FailcastError::config("cache.capacity must be > 0"));
        }
        if self.history_limit == 0 {
            return Err(FailcastError::config("history_limit must be > 0"));
        }
        Ok(())
    }

    /// API key for the configured predictor
    ///
    /// Heuristic mode needs none. Reasoning mode requires
    /// `ANTHROPIC_API_KEY` in the environment.
    ///
    /// # Errors
    /// Returns `Config` if reasoning mode is selected and the key is absent
    pub fn resolve_api_key(&self) -> Result<Option<ApiKey>, FailcastError> {
        match self.predictor {
            PredictorMode::Heuristic => Ok(None),
            PredictorMode::Reasoning => ApiKey::from_env(API_KEY_ENV).map(Some).ok_or_else(|| {
                FailcastError::config(format!(
                    "{API_KEY_ENV} is not set; export it or select the heuristic predictor"
                ))
            }),
        }
    }
}

impl Default for FailcastConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            predictor: PredictorMode::default(),
            reasoning: ReasoningSettings::default(),
            cache: CacheConfig::default(),
            history_limit: 50,
            output_dir: PathBuf::from("."),
        }
    }
}
