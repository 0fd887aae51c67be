//! Restart recovery: performance and cost aggregates survive, pool and
//! instance state does not.

use std::path::PathBuf;
use tokio_agent_scheduler::{
    Role, Scheduler, SchedulerConfig, Task, TaskKind, TaskOutcome, TaskPriority,
};

fn config_with_state(path: PathBuf) -> SchedulerConfig {
    SchedulerConfig {
        state_path: Some(path),
        autosave_every: 1,
        ..SchedulerConfig::default()
    }
}

fn run_one_task(scheduler: &Scheduler, cost: f64) {
    let task = Task::new(TaskKind::Implementation, TaskPriority::Medium);
    let allocation = scheduler.allocate(Role::Implementation, task, &[]).ok();
    let instance_id = allocation
        .and_then(|a| a.instance_id().map(String::from))
        .unwrap_or_default();
    let released = scheduler.release(
        Role::Implementation,
        &instance_id,
        TaskOutcome::success(1.5, 0.9, cost, 600),
    );
    assert!(released.is_ok());
}

#[test]
fn test_aggregates_survive_restart() {
    let dir = tempfile::tempdir().ok().unwrap();
    let path = dir.path().join("scheduler-state.json");

    {
        let scheduler = Scheduler::new(config_with_state(path.clone())).ok().unwrap();
        run_one_task(&scheduler, 0.10);
        run_one_task(&scheduler, 0.15);
    }

    let restarted = Scheduler::new(config_with_state(path)).ok().unwrap();
    let snapshot = restarted.budget_snapshot();
    assert!((snapshot.total_cost - 0.25).abs() < 1e-9);
    assert_eq!(snapshot.requests_made, 2);
    assert_eq!(snapshot.tokens_consumed, 1200);

    let records = restarted.performance_snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records.first().map(|r| r.total_requests), Some(2));
    assert!((records.first().map(|r| r.average_latency).unwrap_or_default() - 1.5).abs() < 1e-9);
}

#[test]
fn test_pool_state_never_survives_restart() {
    let dir = tempfile::tempdir().ok().unwrap();
    let path = dir.path().join("scheduler-state.json");

    {
        let scheduler = Scheduler::new(config_with_state(path.clone())).ok().unwrap();
        // Leave a busy instance and a queued task behind.
        for _ in 0..8 {
            let _ = scheduler.allocate(
                Role::Implementation,
                Task::new(TaskKind::Implementation, TaskPriority::Medium),
                &[],
            );
        }
        // Force a save so the file exists despite the in-flight work.
        assert!(scheduler.save().is_ok());
        let status = scheduler.pool_status(Role::Implementation).ok().unwrap();
        assert!(status.busy_count > 0);
    }

    let restarted = Scheduler::new(config_with_state(path)).ok().unwrap();
    let status = restarted.pool_status(Role::Implementation).ok().unwrap();
    assert_eq!(status.total_instances, status.min_instances);
    assert_eq!(status.busy_count, 0);
    assert_eq!(status.queue_depth, 0, "queues rebuild empty");
    assert_eq!(status.idle_count, status.total_instances);
}

#[test]
fn test_missing_state_file_starts_fresh() {
    let dir = tempfile::tempdir().ok().unwrap();
    let path = dir.path().join("never-written.json");
    let scheduler = Scheduler::new(config_with_state(path)).ok().unwrap();
    assert!(scheduler.budget_snapshot().total_cost.abs() < f64::EPSILON);
    assert!(scheduler.performance_snapshot().is_empty());
}

#[test]
fn test_corrupt_state_file_starts_fresh() {
    let dir = tempfile::tempdir().ok().unwrap();
    let path = dir.path().join("scheduler-state.json");
    std::fs::write(&path, "{ not json at all").ok().unwrap();

    let scheduler = Scheduler::new(config_with_state(path)).ok().unwrap();
    assert!(scheduler.performance_snapshot().is_empty());
    assert!(scheduler.budget_snapshot().total_cost.abs() < f64::EPSILON);
}

#[test]
fn test_explicit_save_writes_current_aggregates() {
    let dir = tempfile::tempdir().ok().unwrap();
    let path = dir.path().join("scheduler-state.json");

    let scheduler = Scheduler::new(SchedulerConfig {
        state_path: Some(path.clone()),
        autosave_every: 1_000, // keep autosave out of the way
        ..SchedulerConfig::default()
    })
    .ok()
    .unwrap();

    run_one_task(&scheduler, 0.05);
    assert!(!path.exists(), "autosave cadence not reached yet");

    assert!(scheduler.save().is_ok());
    assert!(path.exists());

    let restarted = Scheduler::new(config_with_state(path)).ok().unwrap();
    assert!((restarted.budget_snapshot().total_cost - 0.05).abs() < 1e-9);
}
