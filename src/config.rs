//! # Config — scheduler configuration and budget
//!
//! ## Responsibility
//! Parse and validate scheduler configuration: the per-role model
//! assignment table, the resource budget, the selection strategy applied
//! at allocation time, and persistence wiring.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same config
//! - Validated: semantic constraints are checked before a config is accepted
//! - Defaulted: every optional field has a documented default
//!
//! ## NOT Responsible For
//! - Building pools from the config (see: `scheduler`)
//! - Enforcing the budget at allocation time (see: `selection::guard`)

use crate::model::{ModelAssignment, Role};
use crate::selection::SelectionStrategy;
use crate::SchedulerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

// ── Default value functions ──────────────────────────────────────────────

/// Default daily budget ceiling: $100.
fn default_max_daily_cost() -> f64 {
    100.0
}

/// Default fleet-wide concurrent instance ceiling.
fn default_max_concurrent_instances() -> usize {
    20
}

/// Default token throughput ceiling per window: 1M tokens/hour.
fn default_max_tokens_per_window() -> u64 {
    1_000_000
}

/// Default allocation-time selection strategy.
fn default_strategy() -> SelectionStrategy {
    SelectionStrategy::Balanced
}

/// Default autosave cadence: persist aggregates every 10 releases.
fn default_autosave_every() -> u64 {
    10
}

// ── Budget ───────────────────────────────────────────────────────────────

/// Resource budget constraints.
///
/// Enforced by the [`ResourceBudgetGuard`](crate::selection::ResourceBudgetGuard)
/// when the caller requests it; the 80% advisory alert is emitted by the
/// cost ledger regardless.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum spend per Unix day, in USD.
    #[serde(default = "default_max_daily_cost")]
    pub max_daily_cost: f64,
    /// Fleet-wide ceiling on concurrently running instances.
    #[serde(default = "default_max_concurrent_instances")]
    pub max_concurrent_instances: usize,
    /// Token throughput ceiling per window (advisory).
    #[serde(default = "default_max_tokens_per_window")]
    pub max_tokens_per_window: u64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_daily_cost: default_max_daily_cost(),
            max_concurrent_instances: default_max_concurrent_instances(),
            max_tokens_per_window: default_max_tokens_per_window(),
        }
    }
}

// ── Scheduler config ─────────────────────────────────────────────────────

/// Root configuration for a [`Scheduler`](crate::Scheduler) instance.
///
/// # Example
///
/// ```toml
/// strategy = "balanced"
/// autosave_every = 10
///
/// [budget]
/// max_daily_cost = 50.0
///
/// [[assignments]]
/// role = "implementation"
/// tier = "operational"
/// recommended_model = "gpt-3.5-turbo"
/// fallback_model = "claude-3-haiku"
/// max_concurrent_instances = 5
/// cost_per_unit = 0.002
/// ```
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Per-role model assignment table.
    pub assignments: Vec<ModelAssignment>,
    /// Resource budget constraints.
    #[serde(default)]
    pub budget: Budget,
    /// Selection strategy applied when stamping a model at allocation time.
    #[serde(default = "default_strategy")]
    pub strategy: SelectionStrategy,
    /// Where to persist performance/cost aggregates. `None` disables
    /// persistence entirely.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    /// Persist aggregates every N releases.
    #[serde(default = "default_autosave_every")]
    pub autosave_every: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            assignments: ModelAssignment::defaults(),
            budget: Budget::default(),
            strategy: default_strategy(),
            state_path: None,
            autosave_every: default_autosave_every(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a configuration from a TOML string.
    ///
    /// The parsed config is validated before being returned.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] on invalid TOML or on semantic
    /// validation failure.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn from_toml(content: &str) -> Result<Self, SchedulerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SchedulerError::Config(format!("toml parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if serialization fails.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn to_toml(&self) -> Result<String, SchedulerError> {
        toml::to_string_pretty(self)
            .map_err(|e| SchedulerError::Config(format!("toml encode error: {e}")))
    }

    /// Check semantic constraints the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] naming the first violation found:
    /// empty assignment table, duplicate role, empty model id, zero instance
    /// ceiling, non-finite or negative cost, non-positive budget, or zero
    /// autosave cadence.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.assignments.is_empty() {
            return Err(SchedulerError::Config(
                "at least one model assignment is required".to_string(),
            ));
        }

        let mut seen: HashSet<Role> = HashSet::new();
        for assignment in &self.assignments {
            if !seen.insert(assignment.role) {
                return Err(SchedulerError::Config(format!(
                    "duplicate assignment for role: {}",
                    assignment.role
                )));
            }
            if assignment.recommended_model.is_empty() || assignment.fallback_model.is_empty() {
                return Err(SchedulerError::Config(format!(
                    "empty model id for role: {}",
                    assignment.role
                )));
            }
            if assignment.max_concurrent_instances == 0 {
                return Err(SchedulerError::Config(format!(
                    "max_concurrent_instances must be >= 1 for role: {}",
                    assignment.role
                )));
            }
            if !assignment.cost_per_unit.is_finite() || assignment.cost_per_unit < 0.0 {
                return Err(SchedulerError::Config(format!(
                    "cost_per_unit must be finite and non-negative for role: {}",
                    assignment.role
                )));
            }
        }

        if !self.budget.max_daily_cost.is_finite() || self.budget.max_daily_cost <= 0.0 {
            return Err(SchedulerError::Config(
                "budget.max_daily_cost must be positive".to_string(),
            ));
        }
        if self.budget.max_concurrent_instances == 0 {
            return Err(SchedulerError::Config(
                "budget.max_concurrent_instances must be >= 1".to_string(),
            ));
        }
        if self.autosave_every == 0 {
            return Err(SchedulerError::Config(
                "autosave_every must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelTier;

    // -- defaults --------------------------------------------------------

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_budget_values() {
        let budget = Budget::default();
        assert!((budget.max_daily_cost - 100.0).abs() < f64::EPSILON);
        assert_eq!(budget.max_concurrent_instances, 20);
        assert_eq!(budget.max_tokens_per_window, 1_000_000);
    }

    #[test]
    fn test_default_strategy_is_balanced() {
        let config = SchedulerConfig::default();
        assert_eq!(config.strategy, SelectionStrategy::Balanced);
    }

    // -- toml ------------------------------------------------------------

    #[test]
    fn test_from_toml_minimal_config() {
        let toml = r#"
[[assignments]]
role = "implementation"
tier = "operational"
recommended_model = "gpt-3.5-turbo"
fallback_model = "claude-3-haiku"
max_concurrent_instances = 5
cost_per_unit = 0.002
"#;
        let config = SchedulerConfig::from_toml(toml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert_eq!(config.assignments.len(), 1);
        assert_eq!(config.strategy, SelectionStrategy::Balanced);
        assert_eq!(config.autosave_every, 10);
    }

    #[test]
    fn test_from_toml_invalid_syntax_returns_config_error() {
        let result = SchedulerConfig::from_toml("not valid toml {{{");
        assert!(matches!(result, Err(crate::SchedulerError::Config(_))));
    }

    #[test]
    fn test_from_toml_overrides_budget() {
        let toml = r#"
[budget]
max_daily_cost = 25.0

[[assignments]]
role = "research"
tier = "research"
recommended_model = "gpt-4-mini"
fallback_model = "claude-3-haiku"
max_concurrent_instances = 4
cost_per_unit = 0.0015
"#;
        let config = SchedulerConfig::from_toml(toml).ok().unwrap_or_default();
        assert!((config.budget.max_daily_cost - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SchedulerConfig::default();
        let toml = config.to_toml();
        assert!(toml.is_ok());
        let back = SchedulerConfig::from_toml(&toml.unwrap_or_default());
        assert!(back.is_ok());
        assert_eq!(back.ok(), Some(config));
    }

    // -- validation ------------------------------------------------------

    #[test]
    fn test_validate_rejects_empty_assignments() {
        let config = SchedulerConfig {
            assignments: vec![],
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_role() {
        let mut config = SchedulerConfig::default();
        let dup = config.assignments[0].clone();
        config.assignments.push(dup);
        let err = config.validate();
        assert!(err.is_err());
        assert!(err
            .err()
            .map(|e| e.to_string().contains("duplicate"))
            .unwrap_or(false));
    }

    #[test]
    fn test_validate_rejects_zero_instance_ceiling() {
        let mut config = SchedulerConfig::default();
        config.assignments[0].max_concurrent_instances = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_cost() {
        let mut config = SchedulerConfig::default();
        config.assignments[0].cost_per_unit = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_model_id() {
        let mut config = SchedulerConfig::default();
        config.assignments[0].recommended_model = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nonpositive_daily_budget() {
        let config = SchedulerConfig {
            budget: Budget {
                max_daily_cost: 0.0,
                ..Budget::default()
            },
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_autosave_cadence() {
        let config = SchedulerConfig {
            autosave_every: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_single_custom_assignment() {
        let config = SchedulerConfig {
            assignments: vec![ModelAssignment {
                role: Role::QualityJudge,
                tier: ModelTier::Research,
                recommended_model: "claude-3-sonnet".to_string(),
                fallback_model: "gpt-4-mini".to_string(),
                max_concurrent_instances: 2,
                cost_per_unit: 0.003,
            }],
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
