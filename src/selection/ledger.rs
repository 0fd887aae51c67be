//! Cost accounting and budget tracking.
//!
//! The [`CostLedger`] accumulates total spend, per-model and per-role
//! breakdowns, token and request counts, and a per-Unix-day daily
//! accumulator driving budget enforcement. Crossing 80% of the daily
//! budget emits a once-per-day advisory warning; enforcement itself is the
//! guard's job and only happens when the caller requests it.

use crate::config::Budget;
use crate::model::Role;
use crate::task::unix_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fraction of the daily budget at which the advisory alert fires.
const ALERT_FRACTION: f64 = 0.8;

/// Running cost and budget aggregation.
///
/// Persisted across process restarts via [`LedgerAggregates`].
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone)]
pub struct CostLedger {
    total_cost: f64,
    cost_by_model: HashMap<String, f64>,
    cost_by_role: HashMap<Role, f64>,
    tokens_consumed: u64,
    requests_made: u64,
    last_updated: u64,
    /// Unix day (`timestamp / 86_400`) the daily accumulator belongs to.
    day: u64,
    daily_cost: f64,
    /// Day the 80% advisory last fired, so it fires once per day.
    alerted_day: Option<u64>,
    budget: Budget,
}

impl CostLedger {
    /// Create an empty ledger against the given budget.
    pub fn new(budget: Budget) -> Self {
        Self {
            total_cost: 0.0,
            cost_by_model: HashMap::new(),
            cost_by_role: HashMap::new(),
            tokens_consumed: 0,
            requests_made: 0,
            last_updated: unix_timestamp(),
            day: current_day(),
            daily_cost: 0.0,
            alerted_day: None,
            budget,
        }
    }

    /// Rebuild a ledger from persisted aggregates.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn from_aggregates(aggregates: LedgerAggregates, budget: Budget) -> Self {
        Self {
            total_cost: aggregates.total_cost,
            cost_by_model: aggregates.cost_by_model,
            cost_by_role: aggregates.cost_by_role,
            tokens_consumed: aggregates.tokens_consumed,
            requests_made: aggregates.requests_made,
            last_updated: aggregates.last_updated,
            day: aggregates.day,
            daily_cost: aggregates.daily_cost,
            alerted_day: None,
            budget,
        }
    }

    /// Record cost data for one released task.
    ///
    /// Rolls the daily accumulator over on day change and emits the 80%
    /// advisory warning at most once per day.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record(&mut self, model: &str, role: Role, cost: f64, tokens: u64) {
        let today = current_day();
        if today != self.day {
            self.day = today;
            self.daily_cost = 0.0;
        }

        self.total_cost += cost;
        self.daily_cost += cost;
        *self.cost_by_model.entry(model.to_string()).or_insert(0.0) += cost;
        *self.cost_by_role.entry(role).or_insert(0.0) += cost;
        self.tokens_consumed += tokens;
        self.requests_made += 1;
        self.last_updated = unix_timestamp();

        let threshold = self.budget.max_daily_cost * ALERT_FRACTION;
        if self.daily_cost > threshold && self.alerted_day != Some(today) {
            self.alerted_day = Some(today);
            tracing::warn!(
                daily_cost = self.daily_cost,
                budget = self.budget.max_daily_cost,
                utilization = self.utilization(),
                "daily cost crossed 80% of budget"
            );
        }
    }

    /// Today's aggregated cost; zero once the Unix day rolls over.
    pub fn daily_cost(&self) -> f64 {
        if self.day == current_day() {
            self.daily_cost
        } else {
            0.0
        }
    }

    /// Total cost across the ledger's lifetime.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Total requests recorded.
    pub fn requests_made(&self) -> u64 {
        self.requests_made
    }

    /// Fraction of the daily budget consumed today.
    pub fn utilization(&self) -> f64 {
        if self.budget.max_daily_cost > 0.0 {
            self.daily_cost() / self.budget.max_daily_cost
        } else {
            0.0
        }
    }

    /// The budget this ledger enforces against.
    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Point-in-time snapshot of the ledger.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            total_cost: self.total_cost,
            daily_cost: self.daily_cost(),
            utilization: self.utilization(),
            by_model: self.cost_by_model.clone(),
            by_role: self.cost_by_role.clone(),
            tokens_consumed: self.tokens_consumed,
            requests_made: self.requests_made,
        }
    }

    /// Extract the persistable aggregates.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn aggregates(&self) -> LedgerAggregates {
        LedgerAggregates {
            total_cost: self.total_cost,
            cost_by_model: self.cost_by_model.clone(),
            cost_by_role: self.cost_by_role.clone(),
            tokens_consumed: self.tokens_consumed,
            requests_made: self.requests_made,
            last_updated: self.last_updated,
            day: self.day,
            daily_cost: self.daily_cost,
        }
    }
}

/// Point-in-time budget and cost snapshot.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSnapshot {
    /// Total cost across the ledger's lifetime, in USD.
    pub total_cost: f64,
    /// Today's aggregated cost, in USD.
    pub daily_cost: f64,
    /// `daily_cost / budget.max_daily_cost`.
    pub utilization: f64,
    /// Cost broken down by model id.
    pub by_model: HashMap<String, f64>,
    /// Cost broken down by role.
    pub by_role: HashMap<Role, f64>,
    /// Tokens consumed across the ledger's lifetime.
    pub tokens_consumed: u64,
    /// Requests recorded across the ledger's lifetime.
    pub requests_made: u64,
}

/// The persistable subset of ledger state.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAggregates {
    /// Total cost across the ledger's lifetime.
    pub total_cost: f64,
    /// Cost broken down by model id.
    #[serde(default)]
    pub cost_by_model: HashMap<String, f64>,
    /// Cost broken down by role.
    #[serde(default)]
    pub cost_by_role: HashMap<Role, f64>,
    /// Tokens consumed.
    #[serde(default)]
    pub tokens_consumed: u64,
    /// Requests recorded.
    #[serde(default)]
    pub requests_made: u64,
    /// Unix timestamp of the last update.
    #[serde(default)]
    pub last_updated: u64,
    /// Unix day the daily accumulator belongs to.
    #[serde(default)]
    pub day: u64,
    /// Cost accumulated within `day`.
    #[serde(default)]
    pub daily_cost: f64,
}

/// The current Unix day (`timestamp / 86_400`).
fn current_day() -> u64 {
    unix_timestamp() / 86_400
}

// ── Tests ──────────────────────────────────────────────────────────────
