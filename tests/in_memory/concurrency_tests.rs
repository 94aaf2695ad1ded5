//! Concurrent writers racing on one task.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{Board, board};
use eyre::ensure;
use rstest::rstest;
use taskflow::{
    config::TaskflowConfig,
    resilience::{CallContext, CircuitState},
    task::{
        domain::TaskStatus,
        ports::{StorageFaultKind, TaskRepositoryError},
        services::{MoveTaskRequest, MutationErrorKind, TaskMutationError},
    },
};

const WRITERS: usize = 12;

/// Enough retries that every writer outlasts the revision conflicts of its
/// rivals.
const PATIENT_CONFIG: &str = r#"{
    "retry": {"max_retries": 40, "base_delay_ms": 0, "max_delay_ms": 0},
    "circuit_breaker": {"failure_threshold": 1000}
}"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writers_settle_on_one_attempted_target() -> eyre::Result<()> {
    let board = Board::from_config(PATIENT_CONFIG)?;
    let seeded = board.seed("T-1", TaskStatus::Developing, 0).await?;
    let targets = [TaskStatus::Review, TaskStatus::Backlog];
    let engine = Arc::new(board.engine.clone());

    let handles: Vec<_> = targets
        .iter()
        .cycle()
        .take(WRITERS)
        .map(|&target| {
            let worker = Arc::clone(&engine);
            tokio::spawn(async move {
                let request = MoveTaskRequest::new("T-1", target.as_str(), 0);
                worker.move_task(&CallContext::new(), request).await
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(WRITERS);
    for handle in handles {
        outcomes.push(handle.await?);
    }
    let stored = board.stored("T-1").await?;

    ensure!(outcomes.len() == WRITERS);
    ensure!(outcomes.iter().any(Result::is_ok));
    ensure!(
        outcomes.iter().all(|outcome| match outcome {
            Ok(_) => true,
            Err(err) => matches!(err, TaskMutationError::InvalidTransition { .. }),
        }),
        "unexpected outcome: {outcomes:?}"
    );
    ensure!(targets.contains(&stored.status()));
    ensure!(stored.revision() > seeded.revision());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writers_survive_injected_lock_contention(board: Board) -> eyre::Result<()> {
    board.seed("T-2", TaskStatus::Todo, 0).await?;
    board.repository.fail_next_saves([
        TaskRepositoryError::fault(StorageFaultKind::Deadlock, "deadlock detected"),
        TaskRepositoryError::fault(StorageFaultKind::Busy, "database busy"),
    ]);
    let engine = Arc::new(board.engine.clone());

    let handles: Vec<_> = (1..=4_i64)
        .map(|position| {
            let worker = Arc::clone(&engine);
            tokio::spawn(async move {
                let request = MoveTaskRequest::new("T-2", "developing", position);
                worker.move_task(&CallContext::new(), request).await
            })
        })
        .collect();

    let mut successes = 0_usize;
    for handle in handles {
        if handle.await?.is_ok() {
            successes += 1;
        }
    }
    let stored = board.stored("T-2").await?;

    ensure!(successes >= 1);
    ensure!(stored.status() == TaskStatus::Developing);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn revision_conflicts_do_not_trip_a_default_breaker() -> eyre::Result<()> {
    const RACERS: i64 = 32;
    let mut config = TaskflowConfig::default();
    config.retry.base_delay = Duration::ZERO;
    config.retry.max_delay = Duration::ZERO;
    config.deadlock.min_delay = Duration::ZERO;
    config.deadlock.max_delay = Duration::ZERO;
    let board = Board::from_config(&serde_json::to_string(&config)?)?;
    board.seed("T-3", TaskStatus::Developing, 0).await?;
    let engine = Arc::new(board.engine.clone());

    let handles: Vec<_> = (1..=RACERS)
        .map(|position| {
            let worker = Arc::clone(&engine);
            tokio::spawn(async move {
                let request = MoveTaskRequest::new("T-3", "developing", position);
                worker.move_task(&CallContext::new(), request).await
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await?);
    }
    let breaker = board.breakers.breaker("task.move").snapshot();

    ensure!(outcomes.iter().any(Result::is_ok));
    ensure!(
        outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(|err| err.kind() != MutationErrorKind::CircuitOpen),
        "a racer was denied by the breaker: {outcomes:?}"
    );
    ensure!(breaker.state == CircuitState::Closed);
    ensure!(breaker.failure_count == 0);
    Ok(())
}
