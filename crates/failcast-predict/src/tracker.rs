//! Prediction request lifecycle
//!
//! Each request id moves `Pending -> Completed | Failed` exactly once.
//! Completed results are cached, so resubmitting an id returns the stored
//! assessment without recomputation. A request whose future is dropped
//! before finishing is recorded as failed. Finished ids are forgotten with
//! their cache entry.

use dashmap::DashSet;
use failcast_model::RiskAssessment;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

use crate::error::PredictError;

/// Default number of cached results
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default lifetime of a cached result
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3_600);

/// Unique prediction request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Ulid);

impl RequestId {
    /// Generate new id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Lifecycle phase of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestPhase {
    /// Being computed
    Pending,
    /// Result available
    Completed,
    /// Ended in error
    Failed,
}

impl Display for RequestPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        })
    }
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: RequestPhase) -> Vec<RequestPhase> {
    use RequestPhase::{Completed, Failed, Pending};
    match from {
        Pending => vec![Completed, Failed],
        Completed | Failed => vec![],
    }
}

/// Validate a phase transition
///
/// # Errors
/// Returns `IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: RequestPhase, to: RequestPhase) -> Result<(), PredictError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PredictError::IllegalTransition { from, to })
    }
}

/// Outcome of a request that left the pending phase
#[derive(Debug, Clone)]
enum Finished {
    Completed(Arc<RiskAssessment>),
    Failed(Arc<str>),
}

impl Finished {
    fn phase(&self) -> RequestPhase {
        match self {
            Self::Completed(_) => RequestPhase::Completed,
            Self::Failed(_) => RequestPhase::Failed,
        }
    }
}

/// Counts per phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Requests in flight
    pub pending: usize,
    /// Completed requests still remembered
    pub completed: usize,
    /// Failed requests still remembered
    pub failed: usize,
}

enum Begin {
    Started,
    Cached(Arc<RiskAssessment>),
}

/// Tracks request phases and caches completed assessments
///
/// In-flight ids live in a set bounded by concurrency. Finished ids, with
/// their assessment or failure reason, live in a cache bounded by capacity
/// and lifetime; once evicted an id is unknown again.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    pending: Arc<DashSet<RequestId>>,
    finished: Cache<RequestId, Finished>,
}

impl RequestTracker {
    /// Create tracker with cache capacity and result lifetime
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            pending: Arc::new(DashSet::new()),
            finished: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Current phase of a request
    #[must_use]
    pub fn phase(&self, id: RequestId) -> Option<RequestPhase> {
        if self.pending.contains(&id) {
            return Some(RequestPhase::Pending);
        }
        self.finished.get(&id).map(|f| f.phase())
    }

    /// Failure reason of a failed request
    #[must_use]
    pub fn failure_reason(&self, id: RequestId) -> Option<String> {
        match self.finished.get(&id)? {
            Finished::Failed(reason) => Some(reason.to_string()),
            Finished::Completed(_) => None,
        }
    }

    /// Cached result of a completed request
    #[must_use]
    pub fn cached(&self, id: RequestId) -> Option<Arc<RiskAssessment>> {
        match self.finished.get(&id)? {
            Finished::Completed(assessment) => Some(assessment),
            Finished::Failed(_) => None,
        }
    }

    /// Run `compute` for a request id, at most once while it is remembered
    ///
    /// A cached result is returned as is. Otherwise the id is registered as
    /// pending and `compute` is awaited; its outcome moves the request to
    /// completed or failed.
    ///
    /// # Errors
    /// - `InFlight` if the id is already pending
    /// - `RequestFailed` if the id previously failed
    /// - whatever `compute` returns
    pub async fn run<F, Fut>(
        &self,
        id: RequestId,
        compute: F,
    ) -> Result<Arc<RiskAssessment>, PredictError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RiskAssessment, PredictError>>,
    {
        if let Begin::Cached(hit) = self.begin(id)? {
            tracing::debug!(request = %id, "Returning cached assessment");
            return Ok(hit);
        }

        let mut guard = PendingGuard {
            tracker: self,
            id,
            armed: true,
        };
        let outcome = compute().await;

        let result = match outcome {
            Ok(assessment) => {
                let assessment = Arc::new(assessment);
                self.finish(id, Finished::Completed(Arc::clone(&assessment)))?;
                tracing::debug!(request = %id, "Request completed");
                Ok(assessment)
            }
            Err(err) => {
                self.finish(id, Finished::Failed(err.to_string().into()))?;
                tracing::debug!(request = %id, error = %err, "Request failed");
                Err(err)
            }
        };
        guard.armed = false;
        result
    }

    /// Phase counts
    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        self.finished.run_pending_tasks();
        let mut stats = TrackerStats {
            pending: self.pending.len(),
            ..TrackerStats::default()
        };
        for (_, finished) in &self.finished {
            match finished {
                Finished::Completed(_) => stats.completed += 1,
                Finished::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }

    fn begin(&self, id: RequestId) -> Result<Begin, PredictError> {
        let inserted = self.pending.insert(id);
        // A finished entry is written before its id leaves the pending set
        match self.finished.get(&id) {
            Some(finished) => {
                if inserted {
                    self.pending.remove(&id);
                }
                match finished {
                    Finished::Completed(assessment) => Ok(Begin::Cached(assessment)),
                    Finished::Failed(reason) => Err(PredictError::RequestFailed {
                        id,
                        reason: reason.to_string(),
                    }),
                }
            }
            None if inserted => Ok(Begin::Started),
            None => Err(PredictError::InFlight(id)),
        }
    }

    fn finish(&self, id: RequestId, next: Finished) -> Result<(), PredictError> {
        let from = self.phase(id).unwrap_or(RequestPhase::Pending);
        validate_transition(from, next.phase())?;
        self.finished.insert(id, next);
        self.pending.remove(&id);
        Ok(())
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

/// Marks a request failed if its computation is dropped midway
struct PendingGuard<'a> {
    tracker: &'a RequestTracker,
    id: RequestId,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if !self.tracker.finished.contains_key(&self.id) {
            self.tracker.finished.insert(
                self.id,
                Finished::Failed("cancelled before completion".into()),
            );
            tracing::warn!(request = %self.id, "Request cancelled");
        }
        self.tracker.pending.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failcast_model::{
        AssessmentSource, Confidence, Dimension, DimensionAssessment, Probability,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn assessment() -> RiskAssessment {
        let dims = Dimension::ALL
            .iter()
            .map(|d| {
                (
                    *d,
                    DimensionAssessment::from_probability(Probability::clamped(10.0), "ok"),
                )
            })
            .collect();
        RiskAssessment::from_dimensions(
            "job",
            dims,
            Confidence::from_record_count(5),
            AssessmentSource::Heuristic,
        )
        .unwrap()
    }

    #[test]
    fn transitions() {
        assert!(validate_transition(RequestPhase::Pending, RequestPhase::Completed).is_ok());
        assert!(validate_transition(RequestPhase::Pending, RequestPhase::Failed).is_ok());
        assert!(validate_transition(RequestPhase::Completed, RequestPhase::Failed).is_err());
        assert!(validate_transition(RequestPhase::Failed, RequestPhase::Completed).is_err());
        assert!(validate_transition(RequestPhase::Pending, RequestPhase::Pending).is_err());
    }

    #[test]
    fn request_id_parses_back() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[tokio::test]
    async fn same_id_computes_once() {
        let tracker = RequestTracker::default();
        let id = RequestId::new();
        let calls = AtomicUsize::new(0);

        let first = tracker
            .run(id, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(assessment())
            })
            .await
            .unwrap();
        let second = tracker
            .run(id, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(assessment())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(tracker.phase(id), Some(RequestPhase::Completed));
    }

    #[tokio::test]
    async fn failed_id_stays_failed() {
        let tracker = RequestTracker::default();
        let id = RequestId::new();

        let err = tracker
            .run(id, || async { Err(PredictError::unavailable("timed out")) })
            .await
            .unwrap_err();
        assert!(matches!(err, PredictError::Unavailable { .. }));
        assert_eq!(tracker.phase(id), Some(RequestPhase::Failed));

        let err = tracker.run(id, || async { Ok(assessment()) }).await.unwrap_err();
        assert!(matches!(err, PredictError::RequestFailed { .. }));
        assert_eq!(tracker.stats().failed, 1);
    }

    #[tokio::test]
    async fn pending_id_rejected() {
        let tracker = RequestTracker::default();
        let id = RequestId::new();
        tracker.pending.insert(id);

        let err = tracker.run(id, || async { Ok(assessment()) }).await.unwrap_err();
        assert!(matches!(err, PredictError::InFlight(_)));
    }

    #[tokio::test]
    async fn dropped_request_marked_failed() {
        let tracker = RequestTracker::default();
        let id = RequestId::new();

        let worker = tracker.clone();
        let handle = tokio::spawn(async move {
            worker
                .run(id, std::future::pending::<Result<RiskAssessment, PredictError>>)
                .await
        });
        while tracker.phase(id).is_none() {
            tokio::task::yield_now().await;
        }
        handle.abort();
        let _ = handle.await;

        assert_eq!(tracker.phase(id), Some(RequestPhase::Failed));
        assert_eq!(
            tracker.failure_reason(id).as_deref(),
            Some("cancelled before completion")
        );
    }

    #[tokio::test]
    async fn finished_ids_bounded_by_capacity() {
        let tracker = RequestTracker::new(10, Duration::from_secs(3_600));
        for _ in 0..200 {
            tracker.run(RequestId::new(), || async { Ok(assessment()) }).await.unwrap();
        }
        for _ in 0..50 {
            let _ = tracker
                .run(RequestId::new(), || async { Err(PredictError::unavailable("down")) })
                .await;
        }

        let stats = tracker.stats();
        assert_eq!(stats.pending, 0);
        assert!(stats.completed + stats.failed <= 10, "{stats:?}");
    }

    #[tokio::test]
    async fn guard_disarmed_after_transition() {
        let tracker = RequestTracker::default();
        let id = RequestId::new();
        tracker.run(id, || async { Ok(assessment()) }).await.unwrap();

        assert_eq!(tracker.phase(id), Some(RequestPhase::Completed));
        assert!(tracker.failure_reason(id).is_none());
        assert!(!tracker.pending.contains(&id));
    }
}
