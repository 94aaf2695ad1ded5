//! All-or-nothing batch behaviour over the in-memory repository.

use super::helpers::{Board, board};
use eyre::{bail, ensure};
use rstest::rstest;
use taskflow::{
    resilience::CallContext,
    task::{
        domain::{Task, TaskId, TaskStatus},
        ports::{StorageFaultKind, TaskRepositoryError},
        services::TaskMutationError,
    },
};

async fn snapshot(board: &Board, ids: &[&str]) -> eyre::Result<Vec<Task>> {
    let mut tasks = Vec::with_capacity(ids.len());
    for id in ids {
        tasks.push(board.stored(id).await?);
    }
    Ok(tasks)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_batch_leaves_every_task_unchanged(board: Board) -> eyre::Result<()> {
    let ids = ["A", "B", "C", "D"];
    board.seed("A", TaskStatus::Developing, 0).await?;
    board.seed("B", TaskStatus::Developing, 1).await?;
    board.seed("C", TaskStatus::Complete, 0).await?;
    board.seed("D", TaskStatus::Developing, 2).await?;
    let before = snapshot(&board, &ids).await?;

    let result = board
        .coordinator
        .bulk_update_status(&CallContext::new(), &ids, "review")
        .await;

    ensure!(matches!(
        result,
        Err(TaskMutationError::InvalidTransition { ref task_id, .. }) if task_id.as_str() == "C"
    ));
    ensure!(snapshot(&board, &ids).await? == before);
    ensure!(board.repository.save_calls() == 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_batch_touches_nothing(board: Board) -> eyre::Result<()> {
    let ids: Vec<String> = Vec::new();

    let result = board
        .coordinator
        .bulk_update_status(&CallContext::new(), &ids, "todo")
        .await?;

    ensure!(result.is_empty());
    ensure!(board.repository.get_calls() == 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn transient_commit_failures_are_retried_inside_the_batch(
    board: Board,
) -> eyre::Result<()> {
    board.seed("A", TaskStatus::Todo, 0).await?;
    board.seed("B", TaskStatus::Todo, 1).await?;
    board.repository.fail_saves_for(
        &TaskId::new("B")?,
        [TaskRepositoryError::fault(StorageFaultKind::Timeout, "timed out")],
    );

    let updated = board
        .coordinator
        .bulk_update_status(&CallContext::new(), &["A", "B"], "developing")
        .await?;

    ensure!(updated.iter().all(|task| task.status() == TaskStatus::Developing));
    ensure!(board.repository.save_calls() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exhausted_commit_rolls_back_earlier_writes(board: Board) -> eyre::Result<()> {
    let ids = ["A", "B", "C"];
    for (position, id) in (0_u64..).zip(ids) {
        board.seed(id, TaskStatus::Review, position).await?;
    }
    let before = snapshot(&board, &ids).await?;
    board.repository.fail_saves_for(
        &TaskId::new("C")?,
        std::iter::repeat_with(|| {
            TaskRepositoryError::fault(StorageFaultKind::Network, "network unreachable")
        })
        .take(4),
    );

    let result = board
        .coordinator
        .bulk_update_status(&CallContext::new(), &ids, "complete")
        .await;

    let Err(err) = result else {
        bail!("batch should fail once retries are exhausted");
    };
    ensure!(err.is_retry_later());
    let after = snapshot(&board, &ids).await?;
    for (original, current) in before.iter().zip(&after) {
        ensure!(current.status() == original.status());
        ensure!(current.position() == original.position());
        ensure!(current.progress() == original.progress());
    }
    Ok(())
}
