//! # Task — schedulable work unit
//!
//! ## Responsibility
//! Define the [`Task`] struct, its [`TaskKind`] and [`TaskPriority`]
//! vocabularies, lifecycle timestamps, and the [`TaskOutcome`] report the
//! caller hands back at release time.
//!
//! ## Guarantees
//! - Serializable: round-trips through serde
//! - Ordered lifecycle: created → started → completed, timestamps only move
//!   forward
//! - Non-panicking: all operations are infallible or return `Option`
//!
//! ## NOT Responsible For
//! - Execution (external instance collaborator)
//! - Queuing and assignment (see: `pool`)
//! - Complexity scoring (see: `selection::complexity`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority levels for tasks, `Critical` highest.
///
/// Priority influences model selection (complexity multiplier, elevated
/// handling in the QUALITY_FIRST and BALANCED strategies) but never the
/// scheduling order — pool queues are strict FIFO.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Highest priority.
    Critical,
    /// Elevated priority.
    High,
    /// Default priority.
    Medium,
    /// Below-default priority.
    Low,
    /// Lowest priority; batch/background work.
    Background,
}

impl TaskPriority {
    /// Complexity multiplier applied by the analyzer.
    pub fn complexity_multiplier(&self) -> f64 {
        match self {
            Self::Critical => 1.2,
            Self::High => 1.1,
            Self::Medium => 1.0,
            Self::Low => 0.9,
            Self::Background => 0.8,
        }
    }

    /// Returns `true` for `Critical` and `High` — the priorities that pull
    /// selection toward the recommended model.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Background => write!(f, "background"),
        }
    }
}

/// Kind of work a task represents.
///
/// Each kind carries a fixed base complexity weight used by the analyzer.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Requirements or system analysis.
    Analysis,
    /// Architecture and design work.
    Design,
    /// Code implementation.
    Implementation,
    /// Test authoring and execution.
    Testing,
    /// Research and information gathering.
    Research,
    /// Quality evaluation / judging of produced artifacts.
    QualityEvaluation,
    /// Documentation writing.
    Documentation,
}

impl TaskKind {
    /// Base complexity weight for this kind of work.
    pub fn base_complexity(&self) -> f64 {
        match self {
            Self::Analysis => 0.7,
            Self::Design => 0.8,
            Self::Implementation => 0.5,
            Self::Testing => 0.4,
            Self::Research => 0.6,
            Self::QualityEvaluation => 0.7,
            Self::Documentation => 0.3,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Design => write!(f, "design"),
            Self::Implementation => write!(f, "implementation"),
            Self::Testing => write!(f, "testing"),
            Self::Research => write!(f, "research"),
            Self::QualityEvaluation => write!(f, "quality_evaluation"),
            Self::Documentation => write!(f, "documentation"),
        }
    }
}

/// A unit of work addressed to a role.
///
/// Immutable except for its lifecycle timestamps: the pool stamps
/// `started_at` when the task binds to an instance and `completed_at` when
/// the instance releases it. Owned by the caller until bound, then by the
/// bound instance, and discarded after release.
///
/// # Example
///
/// ```rust
/// use tokio_agent_scheduler::{Task, TaskKind, TaskPriority};
/// let task = Task::new(TaskKind::Implementation, TaskPriority::Medium)
///     .with_requirements(3)
///     .with_dependencies(1);
/// assert_eq!(task.requirements, 3);
/// assert!(task.started_at.is_none());
/// ```
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID v4).
    pub id: String,
    /// Kind of work this task represents.
    pub kind: TaskKind,
    /// Scheduling-independent priority.
    pub priority: TaskPriority,
    /// Number of explicit requirements attached to the task.
    #[serde(default)]
    pub requirements: usize,
    /// Number of upstream dependencies the task waits on.
    #[serde(default)]
    pub dependencies: usize,
    /// Unix timestamp (seconds) when the task was created.
    pub created_at: u64,
    /// Unix timestamp when the task was bound to an instance.
    #[serde(default)]
    pub started_at: Option<u64>,
    /// Unix timestamp when the task was released.
    #[serde(default)]
    pub completed_at: Option<u64>,
}

impl Task {
    /// Create a new task with a fresh UUID and the current creation time.
    pub fn new(kind: TaskKind, priority: TaskPriority) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            priority,
            requirements: 0,
            dependencies: 0,
            created_at: unix_timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Set the requirement count (builder style).
    pub fn with_requirements(mut self, count: usize) -> Self {
        self.requirements = count;
        self
    }

    /// Set the dependency count (builder style).
    pub fn with_dependencies(mut self, count: usize) -> Self {
        self.dependencies = count;
        self
    }

    /// Stamp the task as started. Idempotent: the first stamp wins.
    pub fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(unix_timestamp());
        }
    }

    /// Stamp the task as completed. Idempotent: the first stamp wins.
    pub fn mark_completed(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(unix_timestamp());
        }
    }

    /// Seconds between start and completion (or now, if still running).
    ///
    /// Returns `None` if the task has not started.
    pub fn duration_secs(&self) -> Option<u64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(unix_timestamp);
        Some(end.saturating_sub(started))
    }
}

/// Outcome report for a released task.
///
/// This is valid signal even when `success == false`: a failed task is not
/// an error condition for the scheduler — it updates the performance and
/// cost aggregates and still triggers normal queue draining. Retry is the
/// caller's responsibility via resubmission as a new task.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Whether the task completed successfully.
    pub success: bool,
    /// Wall-clock execution time in seconds.
    pub execution_secs: f64,
    /// Quality score of the result in `[0, 1]`.
    pub quality: f64,
    /// Cost of the execution in USD.
    pub cost: f64,
    /// Tokens consumed by the execution.
    pub tokens: u64,
}

impl TaskOutcome {
    /// A successful outcome with the given measurements.
    pub fn success(execution_secs: f64, quality: f64, cost: f64, tokens: u64) -> Self {
        Self {
            success: true,
            execution_secs,
            quality,
            cost,
            tokens,
        }
    }

    /// A failed outcome with the given measurements.
    pub fn failure(execution_secs: f64, cost: f64, tokens: u64) -> Self {
        Self {
            success: false,
            execution_secs,
            quality: 0.0,
            cost,
            tokens,
        }
    }
}

/// Get the current Unix timestamp in seconds.
pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
