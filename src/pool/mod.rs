//! # Pool — per-role worker instance management
//!
//! ## Responsibility
//! Own the instance set and FIFO task queue for one role, breaking
//! assignment ties with a pluggable load balancer and resizing the set
//! through a threshold/cooldown auto-scaler evaluated synchronously after
//! every assignment and release.
//!
//! ## Architecture
//!
//! ```text
//! allocate ──► Pool ──► idle instance?  ──yes──► LoadBalancer picks ──► Busy
//!                │            │
//!                │            no ──► FIFO queue (Queued is not an error)
//!                │
//!                └──► AutoScaler.evaluate (one action per evaluation)
//!
//! release ──► Pool ──► stats/metrics update ──► queue head rebinds ──► Busy
//!                                         └──► or instance goes Idle
//! ```
//!
//! ## Guarantees
//! - **Conservation**: every task is bound or queued — none are dropped
//! - **FIFO**: queued tasks drain strictly in submission order
//! - **Bounded**: instance count stays within `[min_instances,
//!   max_instances]`; `force_scale` clamps into the same range
//! - **One lock**: all operations run inside a single per-pool critical
//!   section; pools for different roles never contend
//!
//! ## NOT Responsible For
//! - Model selection (see: `selection`)
//! - Task execution (external instance collaborator)
//! - Budget enforcement (see: `selection::guard`)

pub mod balancer;
pub mod instance;
pub mod pool;
pub mod scaler;

// Re-exports for convenience
pub use balancer::{BalanceStrategy, BalancerMetrics, LoadBalancer};
pub use instance::{Instance, InstanceState, InstanceStats};
pub use pool::{InstanceDetail, Pool, PoolStatus};
pub use scaler::{AutoScaler, ScalingThresholds};

/// Result of an allocation request against a pool.
///
/// `Queued` is a normal outcome, **not** an error: the task waits in the
/// pool's FIFO queue until an instance frees up or the auto-scaler adds
/// capacity.
///
/// # Panics
///
/// No methods on this type panic.
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// The task was bound to an instance.
    Assigned {
        /// Id of the instance now executing the task.
        instance_id: String,
        /// Model id stamped on the binding at submission time.
        model: String,
    },
    /// No idle instance was available; the task joined the FIFO queue.
    Queued {
        /// Queue depth after enqueueing (position of this task).
        depth: usize,
    },
}

impl Allocation {
    /// Returns `true` if the task was bound to an instance.
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned { .. })
    }

    /// Returns `true` if the task was queued.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    /// The bound instance id, if assigned.
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            Self::Assigned { instance_id, .. } => Some(instance_id),
            Self::Queued { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_assigned_predicates() {
        let allocation = Allocation::Assigned {
            instance_id: "inst-1".to_string(),
            model: "gpt-4".to_string(),
        };
        assert!(allocation.is_assigned());
        assert!(!allocation.is_queued());
        assert_eq!(allocation.instance_id(), Some("inst-1"));
    }

    #[test]
    fn test_allocation_queued_predicates() {
        let allocation = Allocation::Queued { depth: 3 };
        assert!(allocation.is_queued());
        assert!(!allocation.is_assigned());
        assert_eq!(allocation.instance_id(), None);
    }
}
