//! Task complexity scoring.
//!
//! Analyses a task's static attributes and produces a complexity score in
//! the range `0.0..=1.0`. The score feeds the QUALITY_FIRST and BALANCED
//! selection strategies:
//!
//! | Signal            | Contribution                              |
//! |-------------------|-------------------------------------------|
//! | Task kind         | base weight (design 0.8 … documentation 0.3) |
//! | Priority          | multiplier (critical ×1.2 … background ×0.8) |
//! | Requirement count | `+ min(count × 0.1, 0.3)`                 |
//! | Dependency count  | `+ min(count × 0.05, 0.2)`                |
//!
//! The result is clamped to `[0.0, 1.0]`.

use crate::task::Task;

/// A task complexity analyzer.
///
/// Stateless and cheap to construct. Scoring is deterministic, has no side
/// effects, and no failure mode.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Score a task for complexity.
    ///
    /// # Arguments
    ///
    /// * `task` — The task whose static attributes are analysed.
    ///
    /// # Returns
    ///
    /// An `f64` in `[0.0, 1.0]` representing estimated complexity.
    ///
    /// # Panics
    ///
    /// This function never panics.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_agent_scheduler::selection::ComplexityAnalyzer;
    /// use tokio_agent_scheduler::{Task, TaskKind, TaskPriority};
    /// let analyzer = ComplexityAnalyzer::new();
    /// let task = Task::new(TaskKind::Documentation, TaskPriority::Background);
    /// assert!(analyzer.score(&task) < 0.5);
    /// ```
    pub fn score(&self, task: &Task) -> f64 {
        self.breakdown(task).total
    }

    /// Provide a breakdown of individual signal contributions.
    ///
    /// Useful for debugging, logging, and transparency into selection
    /// decisions.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn breakdown(&self, task: &Task) -> ComplexityBreakdown {
        let base = task.kind.base_complexity();
        let priority_adjusted = base * task.priority.complexity_multiplier();
        let requirement_bonus = requirement_signal(task.requirements);
        let dependency_bonus = dependency_signal(task.dependencies);
        let total = clamp_score(priority_adjusted + requirement_bonus + dependency_bonus);

        ComplexityBreakdown {
            base,
            priority_adjusted,
            requirement_bonus,
            dependency_bonus,
            total,
        }
    }
}

/// Individual signal contributions to a complexity score.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexityBreakdown {
    /// Base weight from the task kind table.
    pub base: f64,
    /// Base weight after the priority multiplier.
    pub priority_adjusted: f64,
    /// Bonus from the requirement count, capped at 0.3.
    pub requirement_bonus: f64,
    /// Bonus from the dependency count, capped at 0.2.
    pub dependency_bonus: f64,
    /// Final clamped score.
    pub total: f64,
}

// ── Individual signals ─────────────────────────────────────────────────

/// `min(count × 0.1, 0.3)` — each requirement adds weight, capped.
fn requirement_signal(count: usize) -> f64 {
    (count as f64 * 0.1).min(0.3)
}

/// `min(count × 0.05, 0.2)` — each dependency adds weight, capped.
fn dependency_signal(count: usize) -> f64 {
    (count as f64 * 0.05).min(0.2)
}

/// Clamp a raw score into the unit interval.
fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

// ── Tests ──────────────────────────────────────────────────────────────
