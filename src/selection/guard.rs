//! Resource budget gating.
//!
//! The [`ResourceBudgetGuard`] validates a pending allocation against the
//! constraints the caller requests: daily budget and per-role concurrency.
//! It is a purely advisory gate with no side effects — enforcement happens
//! only when the caller names a constraint, so a saturated pool still
//! queues instead of erroring when no constraint is requested.

use crate::model::ModelAssignment;
use crate::SchedulerError;
use serde::{Deserialize, Serialize};

use super::ledger::CostLedger;

/// Resource constraints a caller can request at allocation time.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceConstraint {
    /// Today's aggregated cost must be below the daily budget.
    Budget,
    /// The role's active instance count must be below its ceiling.
    Concurrency,
}

/// Validates pending allocations against budget and concurrency limits.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceBudgetGuard;

impl ResourceBudgetGuard {
    /// Create a new guard.
    pub fn new() -> Self {
        Self
    }

    /// Validate a pending allocation.
    ///
    /// # Arguments
    ///
    /// * `assignment` — Assignment of the role being allocated against.
    /// * `constraints` — Which constraints to enforce; empty means none.
    /// * `ledger` — Source of today's aggregated cost and the budget.
    /// * `active_instances` — Current instance count in the role's pool.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InsufficientResources`] naming the first
    /// violated constraint.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn validate(
        &self,
        assignment: &ModelAssignment,
        constraints: &[ResourceConstraint],
        ledger: &CostLedger,
        active_instances: usize,
    ) -> Result<(), SchedulerError> {
        for constraint in constraints {
            match constraint {
                ResourceConstraint::Budget => {
                    let daily = ledger.daily_cost();
                    let ceiling = ledger.budget().max_daily_cost;
                    if daily >= ceiling {
                        return Err(SchedulerError::InsufficientResources(format!(
                            "daily budget exceeded: ${daily:.2} >= ${ceiling:.2}"
                        )));
                    }
                }
                ResourceConstraint::Concurrency => {
                    if active_instances >= assignment.max_concurrent_instances {
                        return Err(SchedulerError::InsufficientResources(format!(
                            "maximum concurrent instances reached for {}: {} >= {}",
                            assignment.role, active_instances, assignment.max_concurrent_instances
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
