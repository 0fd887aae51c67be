//! # tokio-agent-scheduler
//!
//! A role-based worker pool scheduler with adaptive model selection,
//! pluggable load balancing, and reactive auto-scaling.
//!
//! ## Architecture
//!
//! One pool per role, each with its own critical section:
//! ```text
//! caller ──► Scheduler.select_model ──► Scheduler.allocate
//!                                            │
//!                   ┌────────────────────────┴───────────────────┐
//!                   ▼                                            ▼
//!             Pool("implementation")                  Pool("research")
//!             instances + FIFO queue                  instances + FIFO queue
//!             LoadBalancer + AutoScaler               LoadBalancer + AutoScaler
//!                   │
//!             external instance executes ──► Scheduler.release
//!                   │
//!             PerformanceTracker + CostLedger (persisted aggregates)
//! ```
//!
//! The scheduler's contract ends at binding a task to an instance or
//! enqueuing it; task execution belongs to the external instance
//! collaborator, which reports outcomes back through [`Scheduler::release`].

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod model;
pub mod monitor;
pub mod persist;
pub mod pool;
pub mod scheduler;
pub mod selection;
pub mod task;

// Re-exports for convenience
pub use config::{Budget, SchedulerConfig};
pub use model::{ModelAssignment, ModelTier, Role};
pub use pool::{Allocation, BalanceStrategy, InstanceState, PoolStatus, ScalingThresholds};
pub use scheduler::Scheduler;
pub use selection::{ResourceConstraint, Selection, SelectionStrategy};
pub use task::{Task, TaskKind, TaskOutcome, TaskPriority};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///   for local development
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`SchedulerError::Config`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), SchedulerError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| SchedulerError::Config(format!("tracing init failed: {e}")))
}

/// Top-level scheduler errors.
///
/// Every error surface in the scheduler is mapped to a variant here.
/// All variants implement `std::error::Error` via [`thiserror`]. None of
/// them are retried internally — each is surfaced synchronously to the
/// caller, who decides whether to retry, escalate, or reconfigure.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The role has no configured [`ModelAssignment`] — caller
    /// misconfiguration, detected before any state changes.
    #[error("no model assignment configured for role: {role}")]
    InvalidAssignment {
        /// The role that was looked up.
        role: Role,
    },

    /// A budget or concurrency ceiling would be breached by the requested
    /// allocation. The caller should retry later or escalate.
    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    /// A strategy evaluation failed (e.g. a corrupted performance record).
    #[error("optimization failed: {0}")]
    Optimization(String),

    /// The referenced instance does not exist in the role's pool.
    #[error("instance not found: {id}")]
    InstanceNotFound {
        /// The instance id that was not found.
        id: String,
    },

    /// A configuration value is missing or invalid.
    ///
    /// Returned at construction time so that misconfiguration surfaces
    /// immediately rather than at the first allocation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisted state could not be written or encoded.
    #[error("persistence error: {0}")]
    Persist(String),

    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_assignment_display_includes_role() {
        let err = SchedulerError::InvalidAssignment {
            role: Role::Implementation,
        };
        assert!(err.to_string().contains("implementation"));
    }

    #[test]
    fn test_insufficient_resources_display_includes_message() {
        let err = SchedulerError::InsufficientResources("daily budget exceeded".to_string());
        assert!(err.to_string().contains("daily budget exceeded"));
    }

    #[test]
    fn test_optimization_display_includes_message() {
        let err = SchedulerError::Optimization("corrupt record".to_string());
        assert!(err.to_string().contains("corrupt record"));
    }

    #[test]
    fn test_instance_not_found_display_includes_id() {
        let err = SchedulerError::InstanceNotFound {
            id: "inst-42".to_string(),
        };
        assert!(err.to_string().contains("inst-42"));
    }

    #[test]
    fn test_config_error_display_includes_message() {
        let err = SchedulerError::Config("no assignments".to_string());
        assert!(err.to_string().contains("no assignments"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: SchedulerError = io_err.into();
        assert!(matches!(err, SchedulerError::Io(_)));
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        // First call may succeed or fail depending on test execution order
        // (another test may have already installed a subscriber).
        let _ = init_tracing();
        // Second call must not panic — it should return Err.
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}
