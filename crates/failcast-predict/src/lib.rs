//! Failcast predictors
//!
//! Two interchangeable [`Predictor`]s turn a [`failcast_features::FeatureSet`]
//! into a [`failcast_model::RiskAssessment`]:
//!
//! - [`HeuristicPredictor`]: deterministic rules, no I/O
//! - [`ReasoningPredictor`]: an external reasoning service, with responses
//!   validated against a generated JSON Schema and a per-call deadline
//!
//! [`RequestTracker`] adds request identity on top: each [`RequestId`] is
//! computed at most once and its result cached.

#![warn(unreachable_pub)]

pub mod client;
pub mod error;
pub mod heuristic;
pub mod predictor;
pub mod prompt;
pub mod reasoning;
pub mod schema;
pub mod tracker;

pub use client::{
    complete_within, AnthropicClient, ApiKey, ClientError, ReasoningClient, ReasoningRequest,
    API_KEY_ENV,
};
pub use error::PredictError;
pub use heuristic::HeuristicPredictor;
pub use predictor::Predictor;
pub use reasoning::{ReasoningPredictor, ReasoningSettings};
pub use schema::{ResponseValidator, WireAssessment};
pub use tracker::{
    allowed_transitions, validate_transition, RequestId, RequestPhase, RequestTracker,
    TrackerStats,
};
