//! Failcast core
//!
//! Orchestrates a prediction request end to end:
//!
//! 1. look up the job, its recent history and cluster capacity in a
//!    [`failcast_store::RecordStore`]
//! 2. build a [`failcast_features::FeatureSet`]
//! 3. run the configured [`failcast_predict::Predictor`] under a tracked
//!    [`failcast_predict::RequestId`]
//!
//! Around that sit configuration loading ([`FailcastConfig`]), concurrent
//! cancellable batches ([`batch`]), historical failure analysis
//! ([`analysis`]) and saving results ([`persist`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use failcast_core::{FailcastConfig, Pipeline, PredictorMode};
//! use failcast_store::FileStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FailcastConfig::new().with_predictor(PredictorMode::Heuristic);
//! let store = FileStore::open(config.data_paths())?;
//! let pipeline = Pipeline::from_config(&config, Arc::new(store), None)?;
//!
//! let prediction = pipeline.assess("customer_dedup").await?;
//! println!("{}", prediction.assessment.overall.recommendation);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod persist;
pub mod pipeline;

pub use analysis::{analyze_failures, FailureAnalysis, FailureSummary};
pub use batch::{join_batch, spawn_batch, spawn_prediction, BatchEntry, PredictionHandle};
pub use config::{CacheConfig, DataConfig, FailcastConfig, PredictorMode};
pub use error::{FailcastError, Stage};
pub use persist::{load_prediction, prediction_file_name, save_prediction, SavedPrediction};
pub use pipeline::{Pipeline, Prediction, DEFAULT_HISTORY_LIMIT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
