//! # Scheduler — public facade over per-role pools
//!
//! ## Responsibility
//! Own one [`Pool`] per configured role plus the shared selection
//! intelligence (analyzer, selector, tracker, ledger, guard), and expose
//! the public operation surface: select, allocate, release, status,
//! reconfiguration, and budget/performance snapshots.
//!
//! ## Guarantees
//! - **Per-pool isolation**: operations on different roles never contend
//! - **No hidden globals**: the tracker and ledger are explicit state owned
//!   by the scheduler, with lifetime controlled by the caller
//! - **Restart recovery**: performance and cost aggregates reload from the
//!   state file; pools always rebuild at `min_instances`, idle, queue empty
//! - **No internal retry**: failures surface synchronously and exactly once
//!
//! ## NOT Responsible For
//! - Executing tasks (external instance collaborator)
//! - Model inference or provider transport (non-goal)

use crate::config::SchedulerConfig;
use crate::model::Role;
use crate::persist::{self, PersistedState};
use crate::pool::{
    Allocation, BalanceStrategy, InstanceDetail, Pool, PoolStatus, ScalingThresholds,
};
use crate::selection::{
    BudgetSnapshot, CostLedger, ModelSelector, PerformanceRecord, PerformanceTracker,
    ResourceBudgetGuard, ResourceConstraint, Selection, SelectionStrategy,
};
use crate::task::{Task, TaskOutcome};
use crate::SchedulerError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Kind of an advisory recommendation.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// A pool is under pressure and would benefit from more instances.
    ScaleUp,
    /// A pool is underutilised and could shrink.
    ScaleDown,
    /// A model's observed success rate is poor.
    LowSuccessRate,
    /// A model's observed cost efficiency is poor.
    LowCostEfficiency,
    /// Daily spend is approaching the budget ceiling.
    BudgetPressure,
}

/// One advisory optimization recommendation. Observational only — the
/// scheduler never acts on these itself.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// What kind of action is suggested.
    pub kind: RecommendationKind,
    /// The pool concerned, when role-specific.
    pub role: Option<Role>,
    /// The model concerned, when model-specific.
    pub model: Option<String>,
    /// The measurement that triggered the recommendation.
    pub value: f64,
    /// Human-readable explanation.
    pub detail: String,
}

/// Facade over per-role pools, model selection, and cost accounting.
///
/// # Example
///
/// ```rust
/// use tokio_agent_scheduler::{
///     Scheduler, SchedulerConfig, Role, Task, TaskKind, TaskOutcome, TaskPriority,
/// };
///
/// # fn example() -> Result<(), tokio_agent_scheduler::SchedulerError> {
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// let task = Task::new(TaskKind::Implementation, TaskPriority::Medium);
/// let allocation = scheduler.allocate(Role::Implementation, task, &[])?;
/// if let Some(instance_id) = allocation.instance_id() {
///     // ... external instance executes the task ...
///     let outcome = TaskOutcome::success(1.2, 0.9, 0.004, 800);
///     scheduler.release(Role::Implementation, instance_id, outcome)?;
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Panics
///
/// This type and its methods never panic.
pub struct Scheduler {
    pools: HashMap<Role, Pool>,
    selector: ModelSelector,
    guard: ResourceBudgetGuard,
    tracker: RwLock<PerformanceTracker>,
    ledger: RwLock<CostLedger>,
    strategy: RwLock<SelectionStrategy>,
    state_path: Option<PathBuf>,
    autosave_every: u64,
    releases: AtomicU64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("roles", &self.roles())
            .field("state_path", &self.state_path)
            .finish()
    }
}

impl Scheduler {
    /// Build a scheduler from a validated configuration.
    ///
    /// When a state path is configured, persisted performance and cost
    /// aggregates are loaded; pools always rebuild from scratch at their
    /// minimum instance count, all idle, with empty queues.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] on invalid configuration and
    /// [`SchedulerError::Io`] if an existing state file cannot be read.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;

        let persisted = match &config.state_path {
            Some(path) => persist::load(path)?,
            None => None,
        };

        let (tracker, ledger) = match persisted {
            Some(state) => (
                PerformanceTracker::from_records(state.performance),
                CostLedger::from_aggregates(state.ledger, config.budget.clone()),
            ),
            None => (
                PerformanceTracker::new(),
                CostLedger::new(config.budget.clone()),
            ),
        };

        let pools = config
            .assignments
            .iter()
            .map(|assignment| (assignment.role, Pool::new(assignment.clone())))
            .collect();

        tracing::info!(
            roles = config.assignments.len(),
            strategy = %config.strategy,
            persisted = config.state_path.is_some(),
            "scheduler initialized"
        );

        Ok(Self {
            pools,
            selector: ModelSelector::new(config.assignments),
            guard: ResourceBudgetGuard::new(),
            tracker: RwLock::new(tracker),
            ledger: RwLock::new(ledger),
            strategy: RwLock::new(config.strategy),
            state_path: config.state_path,
            autosave_every: config.autosave_every,
            releases: AtomicU64::new(0),
        })
    }

    /// Roles with a configured pool, sorted for deterministic iteration.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.pools.keys().copied().collect();
        roles.sort_by_key(|r| r.to_string());
        roles
    }

    /// Pick a model for a (role, task, strategy) triple.
    ///
    /// Purely advisory — nothing is allocated or recorded.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn select_model(
        &self,
        role: Role,
        task: &Task,
        strategy: SelectionStrategy,
    ) -> Result<Selection, SchedulerError> {
        let tracker = self.read_tracker();
        self.selector.select(role, task, strategy, &tracker)
    }

    /// Bind a task to an instance of the role's pool, or queue it.
    ///
    /// The guard validates the requested constraints before any binding
    /// occurs; with an empty constraint slice, allocation never fails for
    /// resource reasons — a saturated pool queues instead. The model id is
    /// chosen here, under the scheduler's configured strategy, and travels
    /// with the task so release attributes the outcome correctly.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role and [`SchedulerError::InsufficientResources`] when a requested
    /// constraint rejects the allocation.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn allocate(
        &self,
        role: Role,
        task: Task,
        constraints: &[ResourceConstraint],
    ) -> Result<Allocation, SchedulerError> {
        let pool = self.pool(role)?;

        {
            let ledger = self.read_ledger();
            self.guard
                .validate(pool.assignment(), constraints, &ledger, pool.active_count())?;
        }

        let strategy = self.strategy();
        let selection = {
            let tracker = self.read_tracker();
            self.selector.select(role, &task, strategy, &tracker)?
        };

        Ok(pool.assign(task, selection.model))
    }

    /// Report a task outcome and free (or rebind) the instance.
    ///
    /// The outcome updates the performance tracker and cost ledger keyed
    /// by the model selected at submission time. A `success == false`
    /// outcome is valid signal, not an error — it is recorded and the
    /// queue drains normally; retry is the caller's responsibility.
    ///
    /// # Returns
    ///
    /// The id of the task the freed instance was rebound to, or `None` if
    /// the instance went idle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role and [`SchedulerError::InstanceNotFound`] for an unknown
    /// instance.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn release(
        &self,
        role: Role,
        instance_id: &str,
        outcome: TaskOutcome,
    ) -> Result<Option<String>, SchedulerError> {
        let pool = self.pool(role)?;
        let completion = pool.complete(instance_id, &outcome)?;
        tracing::debug!(
            role = %role,
            instance = %instance_id,
            task = ?completion.completed_task_id,
            success = outcome.success,
            "task released"
        );

        if let Some(model) = &completion.model {
            self.write_tracker().record(model, role, &outcome);
            self.write_ledger()
                .record(model, role, outcome.cost, outcome.tokens);

            let releases = self.releases.fetch_add(1, Ordering::Relaxed) + 1;
            if self.state_path.is_some() && releases % self.autosave_every == 0 {
                if let Err(e) = self.save() {
                    tracing::error!(error = %e, "autosave failed");
                }
            }
        }

        Ok(completion.next_task_id)
    }

    /// Apply an external health failure signal to an instance.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role and [`SchedulerError::InstanceNotFound`] for an unknown
    /// instance.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn mark_instance_failed(
        &self,
        role: Role,
        instance_id: &str,
    ) -> Result<(), SchedulerError> {
        self.pool(role)?.mark_failed(instance_id)
    }

    /// Status snapshot of one role's pool.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn pool_status(&self, role: Role) -> Result<PoolStatus, SchedulerError> {
        Ok(self.pool(role)?.status())
    }

    /// Status snapshots for every pool, in deterministic role order.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn pool_statuses(&self) -> Vec<PoolStatus> {
        self.roles()
            .into_iter()
            .filter_map(|role| self.pools.get(&role).map(Pool::status))
            .collect()
    }

    /// Detailed instance information for one role's pool.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn instance_details(&self, role: Role) -> Result<Vec<InstanceDetail>, SchedulerError> {
        Ok(self.pool(role)?.instance_details())
    }

    /// Replace a pool's scaling thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn update_scaling_thresholds(
        &self,
        role: Role,
        thresholds: ScalingThresholds,
    ) -> Result<(), SchedulerError> {
        self.pool(role)?.update_thresholds(thresholds);
        Ok(())
    }

    /// Switch a pool's load balancing strategy.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn update_balance_strategy(
        &self,
        role: Role,
        strategy: BalanceStrategy,
    ) -> Result<(), SchedulerError> {
        self.pool(role)?.set_strategy(strategy);
        Ok(())
    }

    /// Force a pool's instance count to `target`, clamped into range.
    ///
    /// Returns `false` iff clamping changed the requested value.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] for an unconfigured
    /// role.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn force_scale(&self, role: Role, target: usize) -> Result<bool, SchedulerError> {
        Ok(self.pool(role)?.force_scale(target))
    }

    /// The scheduler's current allocation-time selection strategy.
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
            .read()
            .map(|guard| *guard)
            .unwrap_or(SelectionStrategy::Balanced)
    }

    /// Switch the allocation-time selection strategy.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn set_strategy(&self, strategy: SelectionStrategy) {
        if let Ok(mut guard) = self.strategy.write() {
            let old = *guard;
            *guard = strategy;
            tracing::info!(from = %old, to = %strategy, "updated selection strategy");
        }
    }

    /// Point-in-time budget and cost snapshot.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn budget_snapshot(&self) -> BudgetSnapshot {
        self.read_ledger().snapshot()
    }

    /// All performance records, sorted by (model, role).
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn performance_snapshot(&self) -> Vec<PerformanceRecord> {
        self.read_tracker().snapshot()
    }

    /// Advisory scaling, model, and budget recommendations.
    ///
    /// Observational only — the scheduler never acts on these itself.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn scaling_recommendations(&self) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for role in self.roles() {
            let Some(pool) = self.pools.get(&role) else {
                continue;
            };
            let status = pool.status();
            let thresholds = pool.thresholds();

            if status.load_factor > thresholds.scale_up_threshold
                || status.queue_depth > thresholds.queue_threshold
            {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::ScaleUp,
                    role: Some(role),
                    model: None,
                    value: status.load_factor,
                    detail: format!(
                        "load {:.2} with {} queued across {} instances",
                        status.load_factor, status.queue_depth, status.total_instances
                    ),
                });
            } else if status.load_factor < thresholds.scale_down_threshold
                && status.queue_depth == 0
                && status.total_instances > thresholds.min_instances
            {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::ScaleDown,
                    role: Some(role),
                    model: None,
                    value: status.load_factor,
                    detail: format!(
                        "load {:.2} across {} instances",
                        status.load_factor, status.total_instances
                    ),
                });
            }
        }

        for record in self.performance_snapshot() {
            if record.success_rate < 0.8 {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::LowSuccessRate,
                    role: Some(record.role),
                    model: Some(record.model.clone()),
                    value: record.success_rate,
                    detail: format!(
                        "success rate {:.2} over {} requests",
                        record.success_rate, record.total_requests
                    ),
                });
            }
            if record.cost_efficiency < 0.5 {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::LowCostEfficiency,
                    role: Some(record.role),
                    model: Some(record.model),
                    value: record.cost_efficiency,
                    detail: "consider switching to a more cost-effective model".to_string(),
                });
            }
        }

        let snapshot = self.budget_snapshot();
        if snapshot.utilization > 0.8 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::BudgetPressure,
                role: None,
                model: None,
                value: snapshot.utilization,
                detail: format!(
                    "daily cost ${:.2} at {:.0}% of budget",
                    snapshot.daily_cost,
                    snapshot.utilization * 100.0
                ),
            });
        }

        recommendations
    }

    /// Run one auto-scaler evaluation on every pool.
    ///
    /// Drives idle-pool scale-down and failed-instance reaping when no
    /// assign/release traffic is arriving. Each pool's evaluation takes
    /// that pool's own lock.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn evaluate_pools(&self) {
        for pool in self.pools.values() {
            pool.evaluate();
        }
    }

    /// The configured state file path, if persistence is enabled.
    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Persist performance and cost aggregates now.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Persist`] when no state path is
    /// configured or encoding fails, and [`SchedulerError::Io`] on
    /// filesystem errors.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn save(&self) -> Result<(), SchedulerError> {
        let path = self
            .state_path
            .as_ref()
            .ok_or_else(|| SchedulerError::Persist("no state path configured".to_string()))?;

        let state = PersistedState {
            performance: self.read_tracker().snapshot(),
            ledger: self.read_ledger().aggregates(),
        };
        persist::save(path, &state)
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Look up the pool for a role.
    fn pool(&self, role: Role) -> Result<&Pool, SchedulerError> {
        self.pools
            .get(&role)
            .ok_or(SchedulerError::InvalidAssignment { role })
    }

    /// Read the tracker, recovering from lock poisoning.
    fn read_tracker(&self) -> RwLockReadGuard<'_, PerformanceTracker> {
        self.tracker
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the tracker, recovering from lock poisoning.
    fn write_tracker(&self) -> RwLockWriteGuard<'_, PerformanceTracker> {
        self.tracker
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the ledger, recovering from lock poisoning.
    fn read_ledger(&self) -> RwLockReadGuard<'_, CostLedger> {
        self.ledger
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the ledger, recovering from lock poisoning.
    fn write_ledger(&self) -> RwLockWriteGuard<'_, CostLedger> {
        self.ledger
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
