//! Failcast feature builder
//!
//! Turns a job configuration, its execution history and the cluster's free
//! capacity into a bounded [`FeatureSet`]. Building is deterministic: the
//! same inputs always give an identical feature set (and fingerprint).
//!
//! With fewer than [`failcast_model::MIN_HISTORY_RECORDS`] runs the feature
//! set is flagged as a cold start, and predictors use configuration only.

#![warn(unreachable_pub)]

pub mod builder;
pub mod classify;
pub mod features;

pub use builder::{build_features, FeatureBuilder, RECENT_FAILURES};
pub use classify::classify_failure;
pub use features::{FeatureSet, HistoryFeatures, RecentFailure};
