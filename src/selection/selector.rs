//! Model selection logic.
//!
//! The [`ModelSelector`] combines the per-role assignment table with the
//! [`ComplexityAnalyzer`](super::ComplexityAnalyzer) and the
//! [`PerformanceTracker`](super::PerformanceTracker) to decide whether the
//! recommended or fallback model should serve a task, under one of four
//! closed strategies.

use crate::model::{ModelAssignment, Role};
use crate::task::Task;
use crate::SchedulerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::complexity::ComplexityAnalyzer;
use super::performance::{PerformanceRecord, PerformanceTracker};

/// Optimization strategies for model selection. Closed set of four.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Always pick the cheaper fallback model.
    CostOptimized,
    /// Always pick the recommended (higher-capability) model.
    PerformanceOptimized,
    /// Recommended for complex or elevated-priority tasks, fallback
    /// otherwise.
    QualityFirst,
    /// Weigh observed success, quality, and cost efficiency; falls back to
    /// the quality-first heuristic until both candidates have history.
    Balanced,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CostOptimized => write!(f, "cost_optimized"),
            Self::PerformanceOptimized => write!(f, "performance_optimized"),
            Self::QualityFirst => write!(f, "quality_first"),
            Self::Balanced => write!(f, "balanced"),
        }
    }
}

/// The selection decision for a single task.
///
/// Carries the complexity score that drove the decision for logging and
/// transparency.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// The model id chosen to serve the task.
    pub model: String,
    /// The assignment the decision was made against.
    pub assignment: ModelAssignment,
    /// The complexity score that drove the decision.
    pub complexity: f64,
}

impl Selection {
    /// Returns `true` if the recommended model was chosen.
    pub fn is_recommended(&self) -> bool {
        self.model == self.assignment.recommended_model
    }

    /// Returns `true` if the fallback model was chosen.
    pub fn is_fallback(&self) -> bool {
        self.model == self.assignment.fallback_model
    }
}

/// Picks a model id for a (role, task, strategy) triple.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    assignments: HashMap<Role, ModelAssignment>,
    analyzer: ComplexityAnalyzer,
}

impl ModelSelector {
    /// Create a selector over the given assignment table.
    ///
    /// Later entries win on duplicate roles; configuration validation
    /// rejects duplicates before they reach this point.
    pub fn new(assignments: Vec<ModelAssignment>) -> Self {
        let assignments = assignments.into_iter().map(|a| (a.role, a)).collect();
        Self {
            assignments,
            analyzer: ComplexityAnalyzer::new(),
        }
    }

    /// Look up the assignment configured for a role.
    pub fn assignment(&self, role: Role) -> Option<&ModelAssignment> {
        self.assignments.get(&role)
    }

    /// Roles with a configured assignment.
    pub fn roles(&self) -> Vec<Role> {
        self.assignments.keys().copied().collect()
    }

    /// Select a model for the task under the given strategy.
    ///
    /// # Arguments
    ///
    /// * `role` — Role the task is addressed to.
    /// * `task` — The task whose attributes drive complexity scoring.
    /// * `strategy` — Which of the four strategies to apply.
    /// * `tracker` — Performance history consulted by `Balanced`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidAssignment`] when the role has no
    /// configured assignment.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn select(
        &self,
        role: Role,
        task: &Task,
        strategy: SelectionStrategy,
        tracker: &PerformanceTracker,
    ) -> Result<Selection, SchedulerError> {
        let assignment = self
            .assignments
            .get(&role)
            .ok_or(SchedulerError::InvalidAssignment { role })?;

        let complexity = self.analyzer.score(task);

        let model = match strategy {
            SelectionStrategy::CostOptimized => assignment.fallback_model.clone(),
            SelectionStrategy::PerformanceOptimized => assignment.recommended_model.clone(),
            SelectionStrategy::QualityFirst => {
                quality_first(assignment, complexity, task).to_string()
            }
            SelectionStrategy::Balanced => {
                balanced(assignment, complexity, task, tracker).to_string()
            }
        };

        tracing::debug!(
            role = %role,
            strategy = %strategy,
            model = %model,
            complexity = complexity,
            priority = %task.priority,
            "selected model"
        );

        Ok(Selection {
            model,
            assignment: assignment.clone(),
            complexity,
        })
    }
}

/// Recommended model for complex or elevated-priority tasks, fallback
/// otherwise.
fn quality_first<'a>(assignment: &'a ModelAssignment, complexity: f64, task: &Task) -> &'a str {
    if complexity > 0.7 || task.priority.is_elevated() {
        &assignment.recommended_model
    } else {
        &assignment.fallback_model
    }
}

/// Performance-weighted choice; cold-starts on the quality-first heuristic
/// until both candidates have history.
fn balanced<'a>(
    assignment: &'a ModelAssignment,
    complexity: f64,
    task: &Task,
    tracker: &PerformanceTracker,
) -> &'a str {
    let recommended = tracker.get(&assignment.recommended_model, assignment.role);
    let fallback = tracker.get(&assignment.fallback_model, assignment.role);

    match (recommended, fallback) {
        (Some(rec), Some(fall)) => {
            let mut recommended_score = weighted_score(rec);
            let fallback_score = weighted_score(fall);

            // Bias toward the recommended model for hard or urgent work.
            if complexity > 0.6 {
                recommended_score *= 1.2;
            }
            if task.priority.is_elevated() {
                recommended_score *= 1.1;
            }

            if recommended_score > fallback_score {
                &assignment.recommended_model
            } else {
                &assignment.fallback_model
            }
        }
        _ => quality_first(assignment, complexity, task),
    }
}

/// `0.3 × success + 0.3 × quality + 0.4 × cost efficiency`.
fn weighted_score(record: &PerformanceRecord) -> f64 {
    record.success_rate * 0.3 + record.quality_score * 0.3 + record.cost_efficiency * 0.4
}

// ── Tests ──────────────────────────────────────────────────────────────
