//! Worker instance state machine and per-instance statistics.
//!
//! An instance executes at most one task at a time and moves:
//! `Idle` → `Busy` (on bind) → `Idle` (release, empty queue) or stays
//! `Busy` (release, queue head rebinds); `Busy` → `Failed` on an external
//! health signal. `ScalingUp`/`ScalingDown` are transient tags applied
//! only while the auto-scaler resizes the pool.

use crate::model::Role;
use crate::task::{unix_timestamp, Task, TaskOutcome};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// Lifecycle state of a worker instance.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Ready to accept a task.
    Idle,
    /// Executing exactly one task.
    Busy,
    /// Pulled out of load-balancing by an external health signal; reaped
    /// and backfilled on the next auto-scaler evaluation.
    Failed,
    /// Transient tag while the auto-scaler creates the instance.
    ScalingUp,
    /// Transient tag while the auto-scaler removes the instance.
    ScalingDown,
}

impl InstanceState {
    /// Returns `true` if the instance can accept a task.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` if the instance is executing a task.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Returns `true` if the instance participates in load-balancing
    /// capacity (idle or busy).
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Idle | Self::Busy)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Failed => write!(f, "failed"),
            Self::ScalingUp => write!(f, "scaling_up"),
            Self::ScalingDown => write!(f, "scaling_down"),
        }
    }
}

/// Rolling per-instance counters, updated on every release.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceStats {
    /// Tasks this instance has completed (successfully or not).
    pub tasks_completed: u64,
    /// Running mean of success observations.
    pub success_rate: f64,
    /// Running mean of execution times, in seconds.
    pub average_execution_secs: f64,
    /// Running mean of quality observations.
    pub quality_score: f64,
    /// Unix timestamp of the last update.
    pub last_updated: u64,
}

impl Default for InstanceStats {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            success_rate: 1.0,
            average_execution_secs: 0.0,
            quality_score: 1.0,
            last_updated: unix_timestamp(),
        }
    }
}

impl InstanceStats {
    /// Fold one outcome into the running means.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        let n = self.tasks_completed + 1;
        let n_f = n as f64;
        let success_obs = if outcome.success { 1.0 } else { 0.0 };

        self.success_rate = (self.success_rate * (n_f - 1.0) + success_obs) / n_f;
        self.average_execution_secs =
            (self.average_execution_secs * (n_f - 1.0) + outcome.execution_secs) / n_f;
        self.quality_score = (self.quality_score * (n_f - 1.0) + outcome.quality) / n_f;
        self.tasks_completed = n;
        self.last_updated = unix_timestamp();
    }
}

/// A task bound to an instance, stamped with the model selected for it at
/// submission time.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    /// The bound task.
    pub task: Task,
    /// Model id selected for this task.
    pub model: String,
}

/// One concurrently running worker bound to a pool.
///
/// Created by the pool on scale-up, removed on scale-down or by the
/// failed-instance reaper. Never persisted — pools rebuild from scratch at
/// `min_instances` on restart.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Unique instance identifier (UUID v4).
    id: String,
    /// Role this instance serves.
    role: Role,
    /// Current lifecycle state.
    state: InstanceState,
    /// The binding being executed, present iff `state == Busy`.
    binding: Option<Binding>,
    /// Local FIFO overflow, used only transiently during a race between
    /// assignment and scale-down.
    overflow: VecDeque<Binding>,
    /// Rolling per-instance counters.
    stats: InstanceStats,
    /// Monotonic creation time, used for oldest-first tie-breaking.
    created: Instant,
}

impl Instance {
    /// Create a fresh idle instance for the role.
    pub fn new(role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            state: InstanceState::Idle,
            binding: None,
            overflow: VecDeque::new(),
            stats: InstanceStats::default(),
            created: Instant::now(),
        }
    }

    /// The instance's unique id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The role this instance serves.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Rolling per-instance counters.
    pub fn stats(&self) -> &InstanceStats {
        &self.stats
    }

    /// Id of the currently bound task, if busy.
    pub fn current_task_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.task.id.as_str())
    }

    /// Monotonic creation time.
    pub(crate) fn created(&self) -> Instant {
        self.created
    }

    /// Committed work: the local overflow plus the in-flight task.
    pub(crate) fn load(&self) -> usize {
        self.overflow.len() + usize::from(self.state.is_busy())
    }

    /// Bind a task to this instance.
    ///
    /// An idle instance takes the binding directly and becomes busy; any
    /// other state pushes onto the local overflow, which the next release
    /// or the failed-instance reaper drains.
    pub(crate) fn bind(&mut self, mut binding: Binding) {
        if self.state.is_idle() {
            binding.task.mark_started();
            self.binding = Some(binding);
            self.state = InstanceState::Busy;
        } else {
            self.overflow.push_back(binding);
        }
    }

    /// Release the current binding, promoting the overflow head if any.
    ///
    /// Returns the completed binding; `None` if the instance was not busy.
    pub(crate) fn release(&mut self) -> Option<Binding> {
        let mut completed = self.binding.take()?;
        completed.task.mark_completed();

        if let Some(mut next) = self.overflow.pop_front() {
            next.task.mark_started();
            self.binding = Some(next);
        } else {
            self.state = InstanceState::Idle;
        }
        Some(completed)
    }

    /// Apply an external failure signal: the current binding and local
    /// overflow are surrendered for requeueing and the instance leaves
    /// load-balancing.
    ///
    /// Returns `(current, overflow)` — the in-flight binding (if any) and
    /// the drained overflow in FIFO order.
    pub(crate) fn fail(&mut self) -> (Option<Binding>, Vec<Binding>) {
        self.state = InstanceState::Failed;
        let current = self.binding.take();
        let overflow = self.overflow.drain(..).collect();
        (current, overflow)
    }

    /// Tag the instance for removal.
    pub(crate) fn mark_scaling_down(&mut self) {
        self.state = InstanceState::ScalingDown;
    }

    /// Fold one outcome into the instance's rolling counters.
    pub(crate) fn record_outcome(&mut self, outcome: &TaskOutcome) {
        self.stats.record(outcome);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
