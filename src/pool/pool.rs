//! Per-role pool composition: instances, FIFO queue, balancer, scaler.
//!
//! All operations run inside the pool's single mutex — pools for
//! different roles share no mutable state and never contend. The
//! auto-scaler is evaluated synchronously at the end of every assignment,
//! release, and explicit [`Pool::evaluate`] call.

use crate::model::{ModelAssignment, Role};
use crate::task::{Task, TaskOutcome};
use crate::SchedulerError;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::balancer::{BalanceStrategy, LoadBalancer};
use super::instance::{Binding, Instance, InstanceState};
use super::scaler::{AutoScaler, ScaleDecision, ScalingThresholds};
use super::Allocation;

/// Point-in-time status snapshot of one pool.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    /// Role this pool serves.
    pub role: Role,
    /// Total instances in the set (idle + busy + failed).
    pub total_instances: usize,
    /// Instances ready for work.
    pub idle_count: usize,
    /// Instances executing a task.
    pub busy_count: usize,
    /// Instances pulled out by a health signal, awaiting reaping.
    pub failed_count: usize,
    /// Unassigned tasks waiting in the FIFO queue.
    pub queue_depth: usize,
    /// `busy / (idle + busy)`; 0.0 for an empty pool.
    pub load_factor: f64,
    /// Max load factor observed so far.
    pub peak_load: f64,
    /// `successful / total` release observations; 0.0 before any.
    pub success_rate: f64,
    /// Running mean of response times, in seconds.
    pub average_response_secs: f64,
    /// Active load balancing strategy.
    pub strategy: BalanceStrategy,
    /// Configured minimum instance count.
    pub min_instances: usize,
    /// Configured maximum instance count.
    pub max_instances: usize,
}

/// Detailed view of one instance, for operators and dashboards.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceDetail {
    /// Instance id.
    pub id: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Id of the task being executed, if busy.
    pub current_task_id: Option<String>,
    /// Depth of the instance-local overflow queue.
    pub overflow_depth: usize,
    /// Tasks this instance has completed.
    pub tasks_completed: u64,
    /// Running mean of success observations.
    pub success_rate: f64,
    /// Running mean of execution times, in seconds.
    pub average_execution_secs: f64,
    /// Running mean of quality observations.
    pub quality_score: f64,
}

/// What a release accomplished, for the scheduler's bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct Completion {
    /// Model that served the completed task, if one was in flight.
    pub model: Option<String>,
    /// Id of the completed task.
    pub completed_task_id: Option<String>,
    /// Id of the task the freed instance was rebound to, if any.
    pub next_task_id: Option<String>,
}

/// Mutable pool state, guarded by the pool's single mutex.
#[derive(Debug)]
struct PoolInner {
    instances: Vec<Instance>,
    queue: VecDeque<Binding>,
    balancer: LoadBalancer,
    scaler: AutoScaler,
}

/// A bounded, auto-scaling set of worker instances for one role.
///
/// # Panics
///
/// This type and its methods never panic.
#[derive(Debug)]
pub struct Pool {
    role: Role,
    assignment: ModelAssignment,
    inner: Mutex<PoolInner>,
}

impl Pool {
    /// Create a pool with tier-appropriate thresholds and balancing
    /// strategy, populated with `min_instances` idle instances.
    pub fn new(assignment: ModelAssignment) -> Self {
        let thresholds =
            ScalingThresholds::for_tier(assignment.tier, assignment.max_concurrent_instances);
        let strategy = BalanceStrategy::default_for(assignment.tier);
        Self::with_settings(assignment, thresholds, strategy)
    }

    /// Create a pool with explicit thresholds and strategy.
    ///
    /// The threshold ceiling is clamped to the assignment's concurrency
    /// limit.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn with_settings(
        assignment: ModelAssignment,
        mut thresholds: ScalingThresholds,
        strategy: BalanceStrategy,
    ) -> Self {
        thresholds.max_instances = thresholds
            .max_instances
            .min(assignment.max_concurrent_instances);
        thresholds.min_instances = thresholds.min_instances.min(thresholds.max_instances);

        let role = assignment.role;
        let instances = (0..thresholds.min_instances.max(1))
            .map(|_| Instance::new(role))
            .collect();

        tracing::info!(role = %role, instances = thresholds.min_instances.max(1), "initialized pool");

        Self {
            role,
            assignment,
            inner: Mutex::new(PoolInner {
                instances,
                queue: VecDeque::new(),
                balancer: LoadBalancer::new(strategy),
                scaler: AutoScaler::new(thresholds),
            }),
        }
    }

    /// Role this pool serves.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Assignment this pool was built from.
    pub fn assignment(&self) -> &ModelAssignment {
        &self.assignment
    }

    /// Total instances currently in the set.
    pub fn active_count(&self) -> usize {
        self.lock().instances.len()
    }

    /// Bind a task to an idle instance, or queue it.
    ///
    /// The balancer breaks ties among idle instances. Queuing is a normal
    /// outcome, not an error. The auto-scaler is evaluated synchronously
    /// before returning.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn assign(&self, task: Task, model: String) -> Allocation {
        let mut inner = self.lock();
        let task_id = task.id.clone();

        let allocation = {
            let PoolInner {
                instances,
                queue,
                balancer,
                ..
            } = &mut *inner;

            let candidates: Vec<usize> = instances
                .iter()
                .enumerate()
                .filter(|(_, i)| i.state().is_idle())
                .map(|(i, _)| i)
                .collect();

            match balancer.pick(instances, &candidates) {
                Some(index) => {
                    let instance_id = instances
                        .get(index)
                        .map(|i| i.id().to_string())
                        .unwrap_or_default();
                    if let Some(instance) = instances.get_mut(index) {
                        instance.bind(Binding {
                            task,
                            model: model.clone(),
                        });
                    }
                    tracing::info!(
                        role = %self.role,
                        task = %task_id,
                        instance = %instance_id,
                        "assigned task"
                    );
                    Allocation::Assigned { instance_id, model }
                }
                None => {
                    queue.push_back(Binding { task, model });
                    let depth = queue.len();
                    tracing::info!(role = %self.role, task = %task_id, depth, "queued task");
                    Allocation::Queued { depth }
                }
            }
        };

        Self::evaluate_locked(self.role, &mut inner);
        allocation
    }

    /// Complete the instance's current task and rebind the queue head.
    ///
    /// The outcome updates the instance's rolling counters and the pool's
    /// balancer metrics. If the queue is nonempty the freed instance
    /// rebinds to the head (staying busy); otherwise it goes idle. The
    /// auto-scaler is evaluated synchronously before returning.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InstanceNotFound`] for an unknown id.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub(crate) fn complete(
        &self,
        instance_id: &str,
        outcome: &TaskOutcome,
    ) -> Result<Completion, SchedulerError> {
        let mut inner = self.lock();

        let index = inner
            .instances
            .iter()
            .position(|i| i.id() == instance_id)
            .ok_or_else(|| SchedulerError::InstanceNotFound {
                id: instance_id.to_string(),
            })?;

        let completion = {
            let PoolInner {
                instances,
                queue,
                balancer,
                ..
            } = &mut *inner;

            let Some(instance) = instances.get_mut(index) else {
                return Err(SchedulerError::InstanceNotFound {
                    id: instance_id.to_string(),
                });
            };

            let completed = instance.release();
            if completed.is_some() {
                instance.record_outcome(outcome);
                balancer
                    .metrics
                    .record_request(outcome.success, outcome.execution_secs);
            } else {
                tracing::warn!(
                    role = %self.role,
                    instance = %instance_id,
                    "release on instance with no current task"
                );
            }

            // Rebind: the overflow head (if the instance stayed busy) or
            // the pool queue head (if it went idle).
            let next_task_id = if instance.state().is_idle() {
                queue.pop_front().map(|head| {
                    let id = head.task.id.clone();
                    instance.bind(head);
                    id
                })
            } else {
                instance.current_task_id().map(String::from)
            };

            Completion {
                completed_task_id: completed.as_ref().map(|b| b.task.id.clone()),
                model: completed.map(|b| b.model),
                next_task_id,
            }
        };

        Self::evaluate_locked(self.role, &mut inner);
        Ok(completion)
    }

    /// Apply an external health failure signal to an instance.
    ///
    /// The instance leaves load-balancing immediately; its in-flight task
    /// returns to the queue **front** and any overflow rejoins the queue
    /// back, so no task is lost. The next auto-scaler evaluation reaps the
    /// failed instance and backfills toward `min_instances`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InstanceNotFound`] for an unknown id.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn mark_failed(&self, instance_id: &str) -> Result<(), SchedulerError> {
        let mut inner = self.lock();

        let index = inner
            .instances
            .iter()
            .position(|i| i.id() == instance_id)
            .ok_or_else(|| SchedulerError::InstanceNotFound {
                id: instance_id.to_string(),
            })?;

        let (current, overflow) = match inner.instances.get_mut(index) {
            Some(instance) => instance.fail(),
            None => (None, Vec::new()),
        };

        if let Some(binding) = current {
            inner.queue.push_front(binding);
        }
        for binding in overflow {
            inner.queue.push_back(binding);
        }

        tracing::warn!(
            role = %self.role,
            instance = %instance_id,
            queue_depth = inner.queue.len(),
            "instance marked failed"
        );
        Ok(())
    }

    /// Run one auto-scaler evaluation outside the assign/release paths.
    ///
    /// Intended for periodic maintenance callers driving idle-pool
    /// scale-down and failed-instance reaping. Takes the same lock as
    /// every other operation.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn evaluate(&self) {
        let mut inner = self.lock();
        Self::evaluate_locked(self.role, &mut inner);
    }

    /// Point-in-time status snapshot.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn status(&self) -> PoolStatus {
        let inner = self.lock();
        let idle_count = count_state(&inner.instances, InstanceState::is_idle);
        let busy_count = count_state(&inner.instances, InstanceState::is_busy);
        let failed_count = inner
            .instances
            .iter()
            .filter(|i| i.state() == InstanceState::Failed)
            .count();

        PoolStatus {
            role: self.role,
            total_instances: inner.instances.len(),
            idle_count,
            busy_count,
            failed_count,
            queue_depth: inner.queue.len(),
            load_factor: load_factor(&inner.instances),
            peak_load: inner.balancer.metrics.peak_load,
            success_rate: inner.balancer.metrics.success_rate(),
            average_response_secs: inner.balancer.metrics.average_response_secs,
            strategy: inner.balancer.strategy(),
            min_instances: inner.scaler.thresholds().min_instances,
            max_instances: inner.scaler.thresholds().max_instances,
        }
    }

    /// Detailed information about every instance in the set.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn instance_details(&self) -> Vec<InstanceDetail> {
        let inner = self.lock();
        inner
            .instances
            .iter()
            .map(|instance| InstanceDetail {
                id: instance.id().to_string(),
                state: instance.state(),
                current_task_id: instance.current_task_id().map(String::from),
                overflow_depth: instance.load().saturating_sub(usize::from(
                    instance.state().is_busy(),
                )),
                tasks_completed: instance.stats().tasks_completed,
                success_rate: instance.stats().success_rate,
                average_execution_secs: instance.stats().average_execution_secs,
                quality_score: instance.stats().quality_score,
            })
            .collect()
    }

    /// The pool's current scaling thresholds.
    pub fn thresholds(&self) -> ScalingThresholds {
        *self.lock().scaler.thresholds()
    }

    /// Replace the scaling thresholds.
    ///
    /// The ceiling is clamped to the assignment's concurrency limit and
    /// the floor to the resulting ceiling.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn update_thresholds(&self, mut thresholds: ScalingThresholds) {
        thresholds.max_instances = thresholds
            .max_instances
            .min(self.assignment.max_concurrent_instances);
        thresholds.min_instances = thresholds.min_instances.min(thresholds.max_instances);
        let mut inner = self.lock();
        inner.scaler.set_thresholds(thresholds);
        tracing::info!(role = %self.role, "updated scaling thresholds");
    }

    /// The active load balancing strategy.
    pub fn strategy(&self) -> BalanceStrategy {
        self.lock().balancer.strategy()
    }

    /// Switch the load balancing strategy.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn set_strategy(&self, strategy: BalanceStrategy) {
        let mut inner = self.lock();
        let old = inner.balancer.strategy();
        inner.balancer.set_strategy(strategy);
        tracing::info!(role = %self.role, from = %old, to = %strategy, "updated balancing strategy");
    }

    /// Force the instance count to `target`, clamped into
    /// `[min_instances, max_instances]`.
    ///
    /// Bypasses cooldowns. Scaling down removes only idle instances, so
    /// the applied count may stay above the clamped target while instances
    /// are busy. Returns `false` iff clamping changed the requested value.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn force_scale(&self, target: usize) -> bool {
        let mut inner = self.lock();
        let clamped = inner.scaler.clamp_target(target);
        let current = inner.instances.len();

        if clamped > current {
            for _ in current..clamped {
                inner.instances.push(Instance::new(self.role));
            }
            Self::drain_queue(&mut inner);
        } else if clamped < current {
            let mut to_remove = current - clamped;
            inner.instances.retain_mut(|instance| {
                if to_remove > 0 && instance.state().is_idle() {
                    instance.mark_scaling_down();
                    to_remove -= 1;
                    false
                } else {
                    true
                }
            });
        }

        tracing::info!(
            role = %self.role,
            requested = target,
            applied = clamped,
            instances = inner.instances.len(),
            "force scaled pool"
        );
        clamped == target
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Acquire the pool lock, recovering from poisoning rather than
    /// propagating a panic from another thread.
    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One full evaluation pass: reap failed instances, apply at most one
    /// scaling action, drain the queue onto idle capacity, refresh gauges.
    fn evaluate_locked(role: Role, inner: &mut PoolInner) {
        // Reap failed instances and backfill toward the floor. Failed
        // instances already surrendered their bindings in `mark_failed`.
        let before = inner.instances.len();
        inner
            .instances
            .retain(|i| i.state() != InstanceState::Failed);
        let reaped = before - inner.instances.len();
        if reaped > 0 {
            while inner.instances.len() < inner.scaler.thresholds().min_instances {
                inner.instances.push(Instance::new(role));
            }
            tracing::info!(role = %role, reaped, instances = inner.instances.len(), "reaped failed instances");
        }

        let load = load_factor(&inner.instances);
        let queue_depth = inner.queue.len();
        let count = inner.instances.len();

        match inner.scaler.evaluate(load, queue_depth, count) {
            ScaleDecision::Up => {
                inner.instances.push(Instance::new(role));
                tracing::info!(role = %role, instances = inner.instances.len(), "scaled up pool");
            }
            ScaleDecision::Down => {
                if let Some(index) = inner
                    .instances
                    .iter()
                    .position(|i| i.state().is_idle())
                {
                    if let Some(instance) = inner.instances.get_mut(index) {
                        instance.mark_scaling_down();
                    }
                    inner.instances.remove(index);
                    tracing::info!(role = %role, instances = inner.instances.len(), "scaled down pool");
                }
            }
            ScaleDecision::Hold => {}
        }

        Self::drain_queue(inner);

        let load = load_factor(&inner.instances);
        let queue_depth = inner.queue.len();
        inner.balancer.metrics.record_gauges(load, queue_depth);
    }

    /// Bind queued tasks onto idle capacity, preserving FIFO order.
    fn drain_queue(inner: &mut PoolInner) {
        let PoolInner {
            instances,
            queue,
            balancer,
            ..
        } = inner;

        while !queue.is_empty() {
            let candidates: Vec<usize> = instances
                .iter()
                .enumerate()
                .filter(|(_, i)| i.state().is_idle())
                .map(|(i, _)| i)
                .collect();

            let Some(index) = balancer.pick(instances, &candidates) else {
                break;
            };
            let Some(head) = queue.pop_front() else {
                break;
            };
            if let Some(instance) = instances.get_mut(index) {
                instance.bind(head);
            }
        }
    }
}

/// `busy / (idle + busy)`; 0.0 when the pool has no healthy instances.
fn load_factor(instances: &[Instance]) -> f64 {
    let busy = count_state(instances, InstanceState::is_busy);
    let healthy = instances
        .iter()
        .filter(|i| i.state().is_healthy())
        .count();
    if healthy == 0 {
        0.0
    } else {
        busy as f64 / healthy as f64
    }
}

/// Count instances matching a state predicate.
fn count_state(instances: &[Instance], predicate: fn(&InstanceState) -> bool) -> usize {
    instances
        .iter()
        .filter(|i| predicate(&i.state()))
        .count()
}

// ── Tests ──────────────────────────────────────────────────────────────
