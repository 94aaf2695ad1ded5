//! Retry, breaker and deadline behaviour of the services under faults.

use std::time::Duration;

use super::helpers::{Board, board};
use eyre::{bail, ensure};
use rstest::rstest;
use taskflow::{
    resilience::{CallContext, CircuitState},
    task::{
        domain::TaskStatus,
        ports::{StorageFaultKind, TaskRepositoryError},
        services::{MoveTaskRequest, MutationErrorKind, TaskMutationError},
    },
};

fn faults(kind: StorageFaultKind, count: usize) -> Vec<TaskRepositoryError> {
    std::iter::repeat_with(|| TaskRepositoryError::fault(kind, kind.as_str()))
        .take(count)
        .collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn max_retries_failures_then_success(board: Board) -> eyre::Result<()> {
    board.seed("T-1", TaskStatus::Backlog, 0).await?;
    board
        .repository
        .fail_next_saves(faults(StorageFaultKind::Timeout, 3));

    let moved = board
        .engine
        .move_task(&CallContext::new(), MoveTaskRequest::new("T-1", "todo", 0))
        .await?;

    ensure!(moved.status() == TaskStatus::Todo);
    ensure!(board.repository.save_calls() == 4);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn validation_faults_fail_on_the_first_attempt(board: Board) -> eyre::Result<()> {
    board.seed("T-2", TaskStatus::Backlog, 0).await?;
    board
        .repository
        .fail_next_saves(faults(StorageFaultKind::Validation, 1));

    let result = board
        .engine
        .move_task(&CallContext::new(), MoveTaskRequest::new("T-2", "todo", 0))
        .await;

    let Err(TaskMutationError::Storage { attempts, .. }) = result else {
        bail!("expected a storage rejection, got {result:?}");
    };
    ensure!(attempts == 1);
    ensure!(board.repository.save_calls() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_failures_open_the_breaker_for_the_operation() -> eyre::Result<()> {
    let board = Board::from_config(
        r#"{
            "retry": {"max_retries": 1, "base_delay_ms": 0, "max_delay_ms": 0},
            "circuit_breaker": {"failure_threshold": 2, "reset_timeout_ms": 60000}
        }"#,
    )?;
    board.seed("T-3", TaskStatus::Backlog, 0).await?;
    board
        .repository
        .fail_next_gets(faults(StorageFaultKind::Connection, 2));
    let ctx = CallContext::new();

    let first = board
        .engine
        .move_task(&ctx, MoveTaskRequest::new("T-3", "todo", 0))
        .await;
    let second = board
        .engine
        .move_task(&ctx, MoveTaskRequest::new("T-3", "todo", 0))
        .await;
    let other_operation = board
        .engine
        .update_progress(&ctx, "T-3", 10)
        .await;

    ensure!(first.as_ref().err().map(TaskMutationError::kind) == Some(MutationErrorKind::Retryable));
    ensure!(second.as_ref().err().map(TaskMutationError::kind) == Some(MutationErrorKind::CircuitOpen));
    ensure!(board.breakers.breaker("task.move").state() == CircuitState::Open);
    ensure!(other_operation.is_ok());
    ensure!(board.repository.get_calls() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_deadline_surfaces_as_timeout(board: Board) -> eyre::Result<()> {
    board.seed("T-4", TaskStatus::Backlog, 0).await?;
    let ctx = CallContext::new().with_timeout(Duration::ZERO);

    let result = board
        .engine
        .move_task(&ctx, MoveTaskRequest::new("T-4", "todo", 0))
        .await;

    let Err(err) = result else {
        bail!("expired context should fail the call");
    };
    ensure!(err.kind() == MutationErrorKind::Timeout);
    ensure!(err.is_retry_later());
    ensure!(board.stored("T-4").await?.status() == TaskStatus::Backlog);
    Ok(())
}
