//! Idle-instance selection and aggregate balancing metrics.
//!
//! The balancer only breaks ties among *idle* instances — queuing,
//! scaling, and failure handling are the pool's job. Strategy is a closed
//! set of four:
//!
//! | Strategy       | Pick                                              |
//! |----------------|---------------------------------------------------|
//! | `RoundRobin`   | persistent rotating cursor over the candidates    |
//! | `LeastLoaded`  | smallest committed work, ties by oldest creation  |
//! | `Random`       | uniform random among candidates                   |
//! | `ResponseTime` | lowest historical average execution time; no      |
//! |                | history sorts first (warm-up priority)            |

use crate::model::ModelTier;
use crate::task::unix_timestamp;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::instance::Instance;

/// Load balancing strategies. Closed set of four.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    /// Persistent rotating cursor, wrapping at the end.
    RoundRobin,
    /// Smallest committed work; ties broken by oldest creation time.
    LeastLoaded,
    /// Uniform random pick.
    Random,
    /// Lowest historical average completion time; instances with no
    /// history are picked first.
    ResponseTime,
}

impl BalanceStrategy {
    /// The default strategy for a role's tier: strategic roles benefit
    /// from response-time selection, research-tier roles from least-loaded,
    /// and operational roles from plain round-robin.
    pub fn default_for(tier: ModelTier) -> Self {
        match tier {
            ModelTier::Strategic => Self::ResponseTime,
            ModelTier::Research => Self::LeastLoaded,
            ModelTier::Operational => Self::RoundRobin,
        }
    }
}

impl fmt::Display for BalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::LeastLoaded => write!(f, "least_loaded"),
            Self::Random => write!(f, "random"),
            Self::ResponseTime => write!(f, "response_time"),
        }
    }
}

/// Aggregate request metrics for one pool's balancer.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancerMetrics {
    /// Total release observations.
    pub total_requests: u64,
    /// Successful release observations.
    pub successful_requests: u64,
    /// Failed release observations.
    pub failed_requests: u64,
    /// Running mean of response times, in seconds.
    pub average_response_secs: f64,
    /// Max response time observed so far, in seconds.
    pub peak_response_secs: f64,
    /// Current load factor gauge.
    pub current_load: f64,
    /// Max load factor observed so far.
    pub peak_load: f64,
    /// Current queue depth gauge.
    pub queue_length: usize,
    /// Unix timestamp of the last update.
    pub last_updated: u64,
}

impl Default for BalancerMetrics {
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_response_secs: 0.0,
            peak_response_secs: 0.0,
            current_load: 0.0,
            peak_load: 0.0,
            queue_length: 0,
            last_updated: unix_timestamp(),
        }
    }
}

impl BalancerMetrics {
    /// Fold one release observation into the aggregates.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record_request(&mut self, success: bool, response_secs: f64) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        let n = self.total_requests as f64;
        self.average_response_secs = (self.average_response_secs * (n - 1.0) + response_secs) / n;
        self.peak_response_secs = self.peak_response_secs.max(response_secs);
        self.last_updated = unix_timestamp();
    }

    /// Update the load and queue gauges.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record_gauges(&mut self, load: f64, queue_length: usize) {
        self.current_load = load;
        self.peak_load = self.peak_load.max(load);
        self.queue_length = queue_length;
        self.last_updated = unix_timestamp();
    }

    /// `successful / total`; 0.0 when no requests have been observed.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Strategy-pluggable idle-instance picker plus aggregate metrics.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    strategy: BalanceStrategy,
    /// Persistent rotation cursor for [`BalanceStrategy::RoundRobin`].
    cursor: usize,
    /// Aggregate request metrics.
    pub metrics: BalancerMetrics,
}

impl LoadBalancer {
    /// Create a balancer with the given strategy.
    pub fn new(strategy: BalanceStrategy) -> Self {
        Self {
            strategy,
            cursor: 0,
            metrics: BalancerMetrics::default(),
        }
    }

    /// The active strategy.
    pub fn strategy(&self) -> BalanceStrategy {
        self.strategy
    }

    /// Switch strategies. The round-robin cursor resets.
    pub fn set_strategy(&mut self, strategy: BalanceStrategy) {
        self.strategy = strategy;
        self.cursor = 0;
    }

    /// Pick one instance among the candidate indices.
    ///
    /// # Arguments
    ///
    /// * `instances` — The pool's full instance slice.
    /// * `candidates` — Indices into `instances` that are eligible (idle).
    ///
    /// # Returns
    ///
    /// An index into `instances`, or `None` if `candidates` is empty.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn pick(&mut self, instances: &[Instance], candidates: &[usize]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        match self.strategy {
            BalanceStrategy::RoundRobin => {
                let position = self.cursor % candidates.len();
                self.cursor = (self.cursor + 1) % candidates.len();
                candidates.get(position).copied()
            }
            BalanceStrategy::LeastLoaded => candidates
                .iter()
                .copied()
                .min_by_key(|&i| {
                    instances
                        .get(i)
                        .map(|inst| (inst.load(), inst.created()))
                        .unwrap_or((usize::MAX, std::time::Instant::now()))
                }),
            BalanceStrategy::Random => {
                let position = rand::thread_rng().gen_range(0..candidates.len());
                candidates.get(position).copied()
            }
            BalanceStrategy::ResponseTime => candidates.iter().copied().min_by(|&a, &b| {
                response_time_key(instances, a)
                    .partial_cmp(&response_time_key(instances, b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }
    }
}

/// Sort key for response-time selection: instances with no history sort
/// before any instance with history (warm-up priority).
fn response_time_key(instances: &[Instance], index: usize) -> (bool, f64) {
    instances
        .get(index)
        .map(|inst| {
            let stats = inst.stats();
            (stats.tasks_completed > 0, stats.average_execution_secs)
        })
        .unwrap_or((true, f64::MAX))
}

// ── Tests ──────────────────────────────────────────────────────────────
