//! Per-(model, role) running performance statistics.
//!
//! Every released task folds one observation into the record for the model
//! that served it: success (0/1), latency, quality, and — when the
//! observation carried a positive cost — cost efficiency. All statistics
//! are incremental arithmetic means; no history is retained.

use crate::model::Role;
use crate::task::{unix_timestamp, TaskOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running performance statistics for one (model, role) pair.
///
/// Persisted across process restarts as part of the scheduler's flat-file
/// aggregate state.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Model id this record describes.
    pub model: String,
    /// Role the model served.
    pub role: Role,
    /// Running mean of success observations (0/1).
    pub success_rate: f64,
    /// Running mean of observed latencies, in seconds.
    pub average_latency: f64,
    /// Running mean of observed quality scores.
    pub quality_score: f64,
    /// Running mean of `(success_rate × quality_score) / cost` observations.
    pub cost_efficiency: f64,
    /// Total observations folded into this record.
    pub total_requests: u64,
    /// Unix timestamp of the last observation.
    pub last_updated: u64,
}

impl PerformanceRecord {
    /// A fresh record with optimistic priors and zero observations.
    pub fn new(model: impl Into<String>, role: Role) -> Self {
        Self {
            model: model.into(),
            role,
            success_rate: 1.0,
            average_latency: 0.0,
            quality_score: 1.0,
            cost_efficiency: 1.0,
            total_requests: 0,
            last_updated: unix_timestamp(),
        }
    }

    /// Fold one outcome observation into the running means.
    ///
    /// `new_mean = (old_mean × (n − 1) + value) / n` with post-increment
    /// `n`, so the first observation replaces the prior entirely. Cost
    /// efficiency is only updated when `cost > 0`; otherwise the prior
    /// value is kept.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        let n = self.total_requests + 1;
        let n_f = n as f64;

        let success_obs = if outcome.success { 1.0 } else { 0.0 };
        self.success_rate = (self.success_rate * (n_f - 1.0) + success_obs) / n_f;
        self.average_latency =
            (self.average_latency * (n_f - 1.0) + outcome.execution_secs) / n_f;
        self.quality_score = (self.quality_score * (n_f - 1.0) + outcome.quality) / n_f;

        if outcome.cost > 0.0 {
            // Efficiency observation uses the freshly updated means.
            let efficiency = (self.success_rate * self.quality_score) / outcome.cost;
            self.cost_efficiency = (self.cost_efficiency * (n_f - 1.0) + efficiency) / n_f;
        }

        self.total_requests = n;
        self.last_updated = unix_timestamp();
    }
}

/// Tracker of running performance statistics, keyed by (model, role).
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTracker {
    records: HashMap<(String, Role), PerformanceRecord>,
}

impl PerformanceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tracker from persisted records.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn from_records(records: Vec<PerformanceRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| ((r.model.clone(), r.role), r))
            .collect();
        Self { records }
    }

    /// Fold one observation into the record for `(model, role)`, creating
    /// the record on first sight.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record(&mut self, model: &str, role: Role, outcome: &TaskOutcome) {
        self.records
            .entry((model.to_string(), role))
            .or_insert_with(|| PerformanceRecord::new(model, role))
            .record(outcome);
    }

    /// Look up the record for `(model, role)`, if any observations exist.
    pub fn get(&self, model: &str, role: Role) -> Option<&PerformanceRecord> {
        self.records.get(&(model.to_string(), role))
    }

    /// Number of distinct (model, role) records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no observations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot all records, sorted by (model, role) for determinism.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn snapshot(&self) -> Vec<PerformanceRecord> {
        let mut records: Vec<PerformanceRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.model
                .cmp(&b.model)
                .then_with(|| a.role.to_string().cmp(&b.role.to_string()))
        });
        records
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool, latency: f64, quality: f64, cost: f64) -> TaskOutcome {
        TaskOutcome {
            success,
            execution_secs: latency,
            quality,
            cost,
            tokens: 100,
        }
    }

    // -- running means ---------------------------------------------------

    #[test]
    fn test_first_observation_replaces_priors() {
        let mut record = PerformanceRecord::new("gpt-4", Role::Research);
        record.record(&outcome(false, 5.0, 0.4, 0.0));
        assert!(record.success_rate.abs() < f64::EPSILON);
        assert!((record.average_latency - 5.0).abs() < f64::EPSILON);
        assert!((record.quality_score - 0.4).abs() < f64::EPSILON);
        assert_eq!(record.total_requests, 1);
    }

    #[test]
    fn test_running_mean_latency_example() {
        // Observations [2.0, 3.0, 1.5] must average to 13/6 with n == 3.
        let mut record = PerformanceRecord::new("gpt-4", Role::Implementation);
        for latency in [2.0, 3.0, 1.5] {
            record.record(&outcome(true, latency, 1.0, 0.0));
        }
        assert_eq!(record.total_requests, 3);
        assert!((record.average_latency - 2.166_666_666_666_667).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_is_mean_of_binary_observations() {
        let mut record = PerformanceRecord::new("m", Role::Implementation);
        record.record(&outcome(true, 1.0, 1.0, 0.0));
        record.record(&outcome(false, 1.0, 1.0, 0.0));
        record.record(&outcome(true, 1.0, 1.0, 0.0));
        record.record(&outcome(true, 1.0, 1.0, 0.0));
        assert!((record.success_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_quality_score_running_mean() {
        let mut record = PerformanceRecord::new("m", Role::Research);
        record.record(&outcome(true, 1.0, 0.8, 0.0));
        record.record(&outcome(true, 1.0, 0.6, 0.0));
        assert!((record.quality_score - 0.7).abs() < 1e-9);
    }

    // -- cost efficiency -------------------------------------------------

    #[test]
    fn test_cost_efficiency_unchanged_when_cost_is_zero() {
        let mut record = PerformanceRecord::new("m", Role::Research);
        record.record(&outcome(true, 1.0, 1.0, 0.0));
        assert!((record.cost_efficiency - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cost_efficiency_first_costed_observation() {
        let mut record = PerformanceRecord::new("m", Role::Research);
        // success_rate 1.0, quality 1.0, cost 0.5 → efficiency obs 2.0,
        // first observation replaces the prior.
        record.record(&outcome(true, 1.0, 1.0, 0.5));
        assert!((record.cost_efficiency - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_efficiency_higher_for_cheaper_model() {
        let mut cheap = PerformanceRecord::new("cheap", Role::Implementation);
        let mut pricey = PerformanceRecord::new("pricey", Role::Implementation);
        for _ in 0..5 {
            cheap.record(&outcome(true, 1.0, 0.9, 0.01));
            pricey.record(&outcome(true, 1.0, 0.9, 0.10));
        }
        assert!(cheap.cost_efficiency > pricey.cost_efficiency);
    }

    // -- tracker ---------------------------------------------------------

    #[test]
    fn test_tracker_creates_record_on_first_sight() {
        let mut tracker = PerformanceTracker::new();
        assert!(tracker.get("gpt-4", Role::Research).is_none());
        tracker.record("gpt-4", Role::Research, &outcome(true, 1.0, 1.0, 0.0));
        let record = tracker.get("gpt-4", Role::Research);
        assert!(record.is_some());
        assert_eq!(record.map(|r| r.total_requests), Some(1));
    }

    #[test]
    fn test_tracker_keys_by_model_and_role() {
        let mut tracker = PerformanceTracker::new();
        tracker.record("gpt-4", Role::Research, &outcome(true, 1.0, 1.0, 0.0));
        tracker.record("gpt-4", Role::Implementation, &outcome(true, 2.0, 1.0, 0.0));
        tracker.record("claude-3-haiku", Role::Research, &outcome(true, 3.0, 1.0, 0.0));
        assert_eq!(tracker.len(), 3);
        assert!((tracker
            .get("gpt-4", Role::Research)
            .map(|r| r.average_latency)
            .unwrap_or_default()
            - 1.0)
            .abs()
            < f64::EPSILON);
    }

    #[test]
    fn test_tracker_snapshot_roundtrip_through_from_records() {
        let mut tracker = PerformanceTracker::new();
        tracker.record("a", Role::Research, &outcome(true, 1.0, 0.9, 0.02));
        tracker.record("b", Role::Implementation, &outcome(false, 2.0, 0.0, 0.01));
        let restored = PerformanceTracker::from_records(tracker.snapshot());
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored.get("a", Role::Research).map(|r| r.total_requests),
            Some(1)
        );
    }

    #[test]
    fn test_tracker_snapshot_is_sorted() {
        let mut tracker = PerformanceTracker::new();
        tracker.record("zeta", Role::Research, &outcome(true, 1.0, 1.0, 0.0));
        tracker.record("alpha", Role::Research, &outcome(true, 1.0, 1.0, 0.0));
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot[0].model, "alpha");
        assert_eq!(snapshot[1].model, "zeta");
    }

    #[test]
    fn test_tracker_is_empty_initially() {
        assert!(PerformanceTracker::new().is_empty());
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let mut record = PerformanceRecord::new("gpt-4", Role::QualityJudge);
        record.record(&outcome(true, 1.5, 0.9, 0.03));
        let json = serde_json::to_string(&record).unwrap_or_default();
        let back: Result<PerformanceRecord, _> = serde_json::from_str(&json);
        assert!(back.is_ok());
        assert_eq!(back.ok(), Some(record));
    }
}
