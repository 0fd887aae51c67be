//! # Model — roles, tiers, and model assignments
//!
//! ## Responsibility
//! Define the closed role vocabulary, the cost/quality tier each role maps
//! to, and the [`ModelAssignment`] record that names the recommended and
//! fallback model for a role along with its concurrency ceiling and unit
//! cost.
//!
//! ## Guarantees
//! - Closed: the role set is an enum known at compile time — pools are
//!   keyed by it with no dynamic registration
//! - Serializable: assignments round-trip through serde (TOML and JSON)
//! - Read-only at runtime: assignments change only through explicit
//!   configuration, never as a side effect of scheduling
//!
//! ## NOT Responsible For
//! - Choosing between recommended and fallback (see: `selection::selector`)
//! - Enforcing the concurrency ceiling (see: `selection::guard`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named capability tier, mapped one-to-one to a pool.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Product management: scoping, prioritisation.
    ProductManager,
    /// Business analysis: requirements elaboration.
    BusinessAnalyst,
    /// Solution architecture: system design decisions.
    SolutionArchitect,
    /// Research and information gathering.
    Research,
    /// Quality judging of produced artifacts.
    QualityJudge,
    /// Code implementation and testing.
    Implementation,
}

impl Role {
    /// All roles, in declaration order.
    pub const ALL: [Role; 6] = [
        Role::ProductManager,
        Role::BusinessAnalyst,
        Role::SolutionArchitect,
        Role::Research,
        Role::QualityJudge,
        Role::Implementation,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductManager => write!(f, "product_manager"),
            Self::BusinessAnalyst => write!(f, "business_analyst"),
            Self::SolutionArchitect => write!(f, "solution_architect"),
            Self::Research => write!(f, "research"),
            Self::QualityJudge => write!(f, "quality_judge"),
            Self::Implementation => write!(f, "implementation"),
        }
    }
}

/// Cost/quality class of the backing model configured for a role.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Advanced models for planning/architecture roles.
    Strategic,
    /// Lightweight models for implementation/testing roles.
    Operational,
    /// Medium models for research/judging roles.
    Research,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strategic => write!(f, "strategic"),
            Self::Operational => write!(f, "operational"),
            Self::Research => write!(f, "research"),
        }
    }
}

/// Model assignment configuration for one role.
///
/// One per role, externally configured, read-only at runtime except via
/// explicit configuration update.
///
/// # Example
///
/// ```rust
/// use tokio_agent_scheduler::{ModelAssignment, ModelTier, Role};
/// let assignment = ModelAssignment {
///     role: Role::Implementation,
///     tier: ModelTier::Operational,
///     recommended_model: "gpt-3.5-turbo".to_string(),
///     fallback_model: "claude-3-haiku".to_string(),
///     max_concurrent_instances: 5,
///     cost_per_unit: 0.002,
/// };
/// assert_eq!(assignment.effective_model(true), "claude-3-haiku");
/// ```
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAssignment {
    /// Role this assignment configures.
    pub role: Role,
    /// Cost/quality tier of the backing models.
    pub tier: ModelTier,
    /// Preferred (higher-capability) model id.
    pub recommended_model: String,
    /// Cheaper fallback model id.
    pub fallback_model: String,
    /// Hard ceiling on concurrently running instances for this role.
    pub max_concurrent_instances: usize,
    /// Cost per unit of work, in USD.
    pub cost_per_unit: f64,
}

impl ModelAssignment {
    /// The model to use, preferring the fallback when asked.
    pub fn effective_model(&self, prefer_fallback: bool) -> &str {
        if prefer_fallback {
            &self.fallback_model
        } else {
            &self.recommended_model
        }
    }

    /// The default six-role assignment table.
    ///
    /// Strategic roles get advanced models with tight instance ceilings;
    /// operational roles get lightweight models with wider ceilings.
    pub fn defaults() -> Vec<ModelAssignment> {
        vec![
            ModelAssignment {
                role: Role::ProductManager,
                tier: ModelTier::Strategic,
                recommended_model: "gpt-4-turbo".to_string(),
                fallback_model: "gpt-4".to_string(),
                max_concurrent_instances: 3,
                cost_per_unit: 0.01,
            },
            ModelAssignment {
                role: Role::BusinessAnalyst,
                tier: ModelTier::Strategic,
                recommended_model: "claude-3.5-sonnet".to_string(),
                fallback_model: "claude-3-sonnet".to_string(),
                max_concurrent_instances: 3,
                cost_per_unit: 0.015,
            },
            ModelAssignment {
                role: Role::SolutionArchitect,
                tier: ModelTier::Strategic,
                recommended_model: "gpt-4-turbo".to_string(),
                fallback_model: "gpt-4".to_string(),
                max_concurrent_instances: 2,
                cost_per_unit: 0.01,
            },
            ModelAssignment {
                role: Role::Implementation,
                tier: ModelTier::Operational,
                recommended_model: "gpt-3.5-turbo".to_string(),
                fallback_model: "claude-3-haiku".to_string(),
                max_concurrent_instances: 5,
                cost_per_unit: 0.002,
            },
            ModelAssignment {
                role: Role::Research,
                tier: ModelTier::Research,
                recommended_model: "gpt-4-mini".to_string(),
                fallback_model: "claude-3-haiku".to_string(),
                max_concurrent_instances: 4,
                cost_per_unit: 0.0015,
            },
            ModelAssignment {
                role: Role::QualityJudge,
                tier: ModelTier::Research,
                recommended_model: "claude-3-sonnet".to_string(),
                fallback_model: "gpt-4-mini".to_string(),
                max_concurrent_instances: 2,
                cost_per_unit: 0.003,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- role ------------------------------------------------------------

    #[test]
    fn test_role_all_covers_six_roles() {
        assert_eq!(Role::ALL.len(), 6);
    }

    #[test]
    fn test_role_display_snake_case() {
        assert_eq!(Role::ProductManager.to_string(), "product_manager");
        assert_eq!(Role::QualityJudge.to_string(), "quality_judge");
        assert_eq!(Role::Implementation.to_string(), "implementation");
    }

    #[test]
    fn test_role_serde_matches_display() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap_or_default();
            assert_eq!(json, format!("\"{role}\""));
        }
    }

    #[test]
    fn test_role_usable_as_json_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(Role::Research, 1.5_f64);
        let json = serde_json::to_string(&map);
        assert!(json.is_ok());
        assert!(json.unwrap_or_default().contains("research"));
    }

    // -- tier ------------------------------------------------------------

    #[test]
    fn test_tier_display() {
        assert_eq!(ModelTier::Strategic.to_string(), "strategic");
        assert_eq!(ModelTier::Operational.to_string(), "operational");
        assert_eq!(ModelTier::Research.to_string(), "research");
    }

    // -- assignment ------------------------------------------------------

    #[test]
    fn test_effective_model_prefers_recommended_by_default() {
        let assignment = sample();
        assert_eq!(assignment.effective_model(false), "gpt-3.5-turbo");
    }

    #[test]
    fn test_effective_model_prefers_fallback_when_asked() {
        let assignment = sample();
        assert_eq!(assignment.effective_model(true), "claude-3-haiku");
    }

    #[test]
    fn test_defaults_cover_every_role_exactly_once() {
        let defaults = ModelAssignment::defaults();
        assert_eq!(defaults.len(), Role::ALL.len());
        for role in Role::ALL {
            assert_eq!(
                defaults.iter().filter(|a| a.role == role).count(),
                1,
                "role {role} must appear exactly once"
            );
        }
    }

    #[test]
    fn test_defaults_have_positive_ceilings_and_costs() {
        for assignment in ModelAssignment::defaults() {
            assert!(assignment.max_concurrent_instances >= 1);
            assert!(assignment.cost_per_unit > 0.0);
            assert!(!assignment.recommended_model.is_empty());
            assert!(!assignment.fallback_model.is_empty());
        }
    }

    #[test]
    fn test_assignment_serde_roundtrip() {
        let assignment = sample();
        let json = serde_json::to_string(&assignment).unwrap_or_default();
        let back: Result<ModelAssignment, _> = serde_json::from_str(&json);
        assert!(back.is_ok());
        assert_eq!(back.ok(), Some(assignment));
    }

    fn sample() -> ModelAssignment {
        ModelAssignment {
            role: Role::Implementation,
            tier: ModelTier::Operational,
            recommended_model: "gpt-3.5-turbo".to_string(),
            fallback_model: "claude-3-haiku".to_string(),
            max_concurrent_instances: 5,
            cost_per_unit: 0.002,
        }
    }
}
