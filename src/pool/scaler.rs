//! Threshold/cooldown instance-count control.
//!
//! The auto-scaler is reactive: the pool evaluates it synchronously right
//! after every assignment and release (and an optional maintenance loop
//! may evaluate it periodically to drive idle-pool scale-down). Exactly
//! one instance is added or removed per evaluation to avoid oscillation.

use crate::model::ModelTier;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ── Default value functions ──────────────────────────────────────────────

/// Default scale-up load threshold: 80%.
fn default_scale_up_threshold() -> f64 {
    0.8
}

/// Default scale-down load threshold: 30%.
fn default_scale_down_threshold() -> f64 {
    0.3
}

/// Default minimum instance count.
fn default_min_instances() -> usize {
    1
}

/// Default maximum instance count.
fn default_max_instances() -> usize {
    10
}

/// Default scale-up cooldown: 5 minutes.
fn default_scale_up_cooldown_secs() -> u64 {
    300
}

/// Default scale-down cooldown: 10 minutes.
fn default_scale_down_cooldown_secs() -> u64 {
    600
}

/// Default queue-depth threshold.
fn default_queue_threshold() -> usize {
    5
}

/// Thresholds for auto-scaling decisions.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingThresholds {
    /// Scale up when the load factor exceeds this value.
    #[serde(default = "default_scale_up_threshold")]
    pub scale_up_threshold: f64,
    /// Scale down when the load factor falls below this value.
    #[serde(default = "default_scale_down_threshold")]
    pub scale_down_threshold: f64,
    /// Minimum instances to maintain.
    #[serde(default = "default_min_instances")]
    pub min_instances: usize,
    /// Maximum instances allowed.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    /// Seconds to wait after a scale action before scaling up again.
    #[serde(default = "default_scale_up_cooldown_secs")]
    pub scale_up_cooldown_secs: u64,
    /// Seconds to wait after a scale action before scaling down again.
    #[serde(default = "default_scale_down_cooldown_secs")]
    pub scale_down_cooldown_secs: u64,
    /// Scale up when the queue is deeper than this.
    #[serde(default = "default_queue_threshold")]
    pub queue_threshold: usize,
}

impl Default for ScalingThresholds {
    fn default() -> Self {
        Self {
            scale_up_threshold: default_scale_up_threshold(),
            scale_down_threshold: default_scale_down_threshold(),
            min_instances: default_min_instances(),
            max_instances: default_max_instances(),
            scale_up_cooldown_secs: default_scale_up_cooldown_secs(),
            scale_down_cooldown_secs: default_scale_down_cooldown_secs(),
            queue_threshold: default_queue_threshold(),
        }
    }
}

impl ScalingThresholds {
    /// Tier-appropriate defaults: strategic pools scale conservatively,
    /// operational pools aggressively, research pools in between.
    pub fn for_tier(tier: ModelTier, max_instances: usize) -> Self {
        match tier {
            ModelTier::Strategic => Self {
                scale_up_threshold: 0.7,
                scale_down_threshold: 0.2,
                min_instances: 1,
                max_instances,
                scale_up_cooldown_secs: 180,
                scale_down_cooldown_secs: 600,
                queue_threshold: 3,
            },
            ModelTier::Operational => Self {
                scale_up_threshold: 0.8,
                scale_down_threshold: 0.3,
                min_instances: 1,
                max_instances,
                scale_up_cooldown_secs: 120,
                scale_down_cooldown_secs: 300,
                queue_threshold: 5,
            },
            ModelTier::Research => Self {
                scale_up_threshold: 0.75,
                scale_down_threshold: 0.25,
                min_instances: 1,
                max_instances,
                scale_up_cooldown_secs: 150,
                scale_down_cooldown_secs: 450,
                queue_threshold: 4,
            },
        }
    }

    /// Clamp a requested instance count into `[min_instances, max_instances]`.
    pub fn clamp_target(&self, target: usize) -> usize {
        target.clamp(self.min_instances, self.max_instances)
    }
}

/// Scaling decision for one evaluation.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add exactly one idle instance.
    Up,
    /// Remove exactly one idle instance.
    Down,
    /// No change.
    Hold,
}

/// Threshold/cooldown-based instance-count controller.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug, Clone)]
pub struct AutoScaler {
    thresholds: ScalingThresholds,
    /// When the last scale action (up or down) was applied.
    last_action: Option<Instant>,
}

impl AutoScaler {
    /// Create a scaler with the given thresholds.
    pub fn new(thresholds: ScalingThresholds) -> Self {
        Self {
            thresholds,
            last_action: None,
        }
    }

    /// The active thresholds.
    pub fn thresholds(&self) -> &ScalingThresholds {
        &self.thresholds
    }

    /// Replace the thresholds. Cooldown state is preserved.
    pub fn set_thresholds(&mut self, thresholds: ScalingThresholds) {
        self.thresholds = thresholds;
    }

    /// Evaluate whether the pool should resize.
    ///
    /// Scale-up fires when the queue is deeper than `queue_threshold` or
    /// the load factor exceeds `scale_up_threshold`, the scale-up cooldown
    /// has elapsed, and the pool is below `max_instances`. Scale-down
    /// fires when the load factor is below `scale_down_threshold`, the
    /// queue is empty, the scale-down cooldown has elapsed, and the pool
    /// is above `min_instances`. A non-`Hold` decision arms the cooldown
    /// timer; the caller must apply it.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn evaluate(
        &mut self,
        load_factor: f64,
        queue_depth: usize,
        instance_count: usize,
    ) -> ScaleDecision {
        let pressure = queue_depth > self.thresholds.queue_threshold
            || load_factor > self.thresholds.scale_up_threshold;

        if pressure
            && instance_count < self.thresholds.max_instances
            && self.cooldown_elapsed(self.thresholds.scale_up_cooldown_secs)
        {
            self.last_action = Some(Instant::now());
            return ScaleDecision::Up;
        }

        let slack = load_factor < self.thresholds.scale_down_threshold && queue_depth == 0;

        if slack
            && instance_count > self.thresholds.min_instances
            && self.cooldown_elapsed(self.thresholds.scale_down_cooldown_secs)
        {
            self.last_action = Some(Instant::now());
            return ScaleDecision::Down;
        }

        ScaleDecision::Hold
    }

    /// Clamp a forced target into range. Bypasses cooldown by design:
    /// `force_scale` is an administrative override, and it does not arm
    /// the cooldown timer either.
    pub fn clamp_target(&self, target: usize) -> usize {
        self.thresholds.clamp_target(target)
    }

    /// Whether the given cooldown has elapsed since the last scale action.
    fn cooldown_elapsed(&self, cooldown_secs: u64) -> bool {
        match self.last_action {
            Some(at) => at.elapsed().as_secs() >= cooldown_secs,
            None => true,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Thresholds with zeroed cooldowns so decisions fire immediately.
    fn hot_thresholds() -> ScalingThresholds {
        ScalingThresholds {
            scale_up_cooldown_secs: 0,
            scale_down_cooldown_secs: 0,
            min_instances: 1,
            max_instances: 4,
            ..ScalingThresholds::default()
        }
    }

    // -- scale up --------------------------------------------------------

    #[test]
    fn test_scale_up_on_high_load() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.evaluate(0.9, 0, 2), ScaleDecision::Up);
    }

    #[test]
    fn test_scale_up_on_deep_queue_despite_low_load() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        // Queue threshold is 5; depth 6 forces scale-up even at load 0.
        // (Low load with a deep queue means failed capacity, not slack.)
        assert_eq!(scaler.evaluate(0.0, 6, 2), ScaleDecision::Up);
    }

    #[test]
    fn test_no_scale_up_at_max_instances() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.evaluate(1.0, 10, 4), ScaleDecision::Hold);
    }

    #[test]
    fn test_no_scale_up_at_boundary_load() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        // Strictly greater-than: load == threshold holds.
        assert_eq!(scaler.evaluate(0.8, 0, 2), ScaleDecision::Hold);
    }

    #[test]
    fn test_scale_up_blocked_by_cooldown() {
        let thresholds = ScalingThresholds {
            scale_up_cooldown_secs: 3_600,
            scale_down_cooldown_secs: 3_600,
            max_instances: 4,
            ..ScalingThresholds::default()
        };
        let mut scaler = AutoScaler::new(thresholds);
        assert_eq!(scaler.evaluate(0.9, 0, 2), ScaleDecision::Up);
        // Second evaluation inside the cooldown window holds.
        assert_eq!(scaler.evaluate(0.9, 0, 3), ScaleDecision::Hold);
    }

    // -- scale down ------------------------------------------------------

    #[test]
    fn test_scale_down_on_low_load_and_empty_queue() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.evaluate(0.1, 0, 3), ScaleDecision::Down);
    }

    #[test]
    fn test_no_scale_down_with_queued_tasks() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.evaluate(0.1, 1, 3), ScaleDecision::Hold);
    }

    #[test]
    fn test_no_scale_down_at_min_instances() {
        let mut scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.evaluate(0.0, 0, 1), ScaleDecision::Hold);
    }

    #[test]
    fn test_one_action_per_evaluation() {
        // Even with extreme pressure, a single evaluation yields a single
        // decision; the caller applies exactly one instance change.
        let mut scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.evaluate(1.0, 100, 1), ScaleDecision::Up);
    }

    // -- clamping --------------------------------------------------------

    #[test]
    fn test_clamp_target_within_range_is_identity() {
        let scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.clamp_target(3), 3);
    }

    #[test]
    fn test_clamp_target_below_min() {
        let scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.clamp_target(0), 1);
    }

    #[test]
    fn test_clamp_target_above_max() {
        let scaler = AutoScaler::new(hot_thresholds());
        assert_eq!(scaler.clamp_target(99), 4);
    }

    // -- tier defaults ---------------------------------------------------

    #[test]
    fn test_strategic_tier_scales_conservatively() {
        let strategic = ScalingThresholds::for_tier(ModelTier::Strategic, 3);
        let operational = ScalingThresholds::for_tier(ModelTier::Operational, 5);
        assert!(strategic.scale_up_threshold < operational.scale_up_threshold);
        assert!(strategic.scale_down_cooldown_secs >= operational.scale_down_cooldown_secs);
        assert_eq!(strategic.max_instances, 3);
    }

    #[test]
    fn test_tier_defaults_keep_min_at_one() {
        for tier in [ModelTier::Strategic, ModelTier::Operational, ModelTier::Research] {
            assert_eq!(ScalingThresholds::for_tier(tier, 5).min_instances, 1);
        }
    }

    #[test]
    fn test_thresholds_serde_defaults() {
        let thresholds: Result<ScalingThresholds, _> = serde_json::from_str("{}");
        assert!(thresholds.is_ok());
        assert_eq!(thresholds.ok(), Some(ScalingThresholds::default()));
    }
}
