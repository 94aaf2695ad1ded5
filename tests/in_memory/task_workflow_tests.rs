//! End-to-end workflow tests over the in-memory repository.

use super::helpers::{Board, board};
use eyre::ensure;
use rstest::rstest;
use taskflow::{
    resilience::CallContext,
    task::{
        domain::{Position, TaskStatus},
        services::{MoveTaskRequest, MutationErrorKind, UpdateStatusRequest},
    },
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn canonical_walk_reaches_complete(board: Board) -> eyre::Result<()> {
    board.seed("T-1", TaskStatus::Backlog, 0).await?;
    let ctx = CallContext::new();

    for status in ["todo", "developing", "review", "complete"] {
        board
            .engine
            .update_status(&ctx, UpdateStatusRequest::new("T-1", status))
            .await?;
    }

    let stored = board.stored("T-1").await?;
    ensure!(stored.status() == TaskStatus::Complete);
    ensure!(stored.revision() == 5);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn skipping_review_is_rejected_and_leaves_the_task_in_place(
    board: Board,
) -> eyre::Result<()> {
    let before = board.seed("T-2", TaskStatus::Todo, 3).await?;

    let result = board
        .engine
        .move_task(&CallContext::new(), MoveTaskRequest::new("T-2", "complete", 0))
        .await;

    let err = result.err().ok_or_else(|| eyre::eyre!("move should fail"))?;
    ensure!(err.kind() == MutationErrorKind::InvalidTransition);
    ensure!(board.stored("T-2").await? == before);
    Ok(())
}

#[rstest]
#[case("developing", TaskStatus::Backlog, true)]
#[case("developing", TaskStatus::Complete, false)]
#[case("review", TaskStatus::Developing, false)]
#[case("complete", TaskStatus::Review, false)]
#[case("backlog", TaskStatus::Todo, true)]
#[tokio::test(flavor = "multi_thread")]
async fn move_task_follows_the_transition_table(
    board: Board,
    #[case] from: &str,
    #[case] to: TaskStatus,
    #[case] legal: bool,
) -> eyre::Result<()> {
    let start = TaskStatus::try_from(from)?;
    board.seed("T-3", start, 0).await?;

    let result = board
        .engine
        .move_task(&CallContext::new(), MoveTaskRequest::new("T-3", to.as_str(), 1))
        .await;

    let stored = board.stored("T-3").await?;
    ensure!(result.is_ok() == legal);
    ensure!(stored.status() == if legal { to } else { start });
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repositioning_within_a_column_is_persisted(board: Board) -> eyre::Result<()> {
    board.seed("T-4", TaskStatus::Review, 0).await?;

    let moved = board
        .engine
        .move_task(&CallContext::new(), MoveTaskRequest::new("T-4", "review", 9))
        .await?;

    ensure!(moved.status() == TaskStatus::Review);
    ensure!(moved.position() == Position::from(9));
    ensure!(board.repository.save_calls() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn progress_updates_clamp_and_are_idempotent(board: Board) -> eyre::Result<()> {
    board.seed("T-5", TaskStatus::Developing, 0).await?;
    let ctx = CallContext::new();

    let high = board.engine.update_progress(&ctx, "T-5", 150).await?;
    let repeat = board.engine.update_progress(&ctx, "T-5", 150).await?;
    let low = board.engine.update_progress(&ctx, "T-5", -10).await?;

    ensure!(high.progress().value() == 100);
    ensure!(repeat == high);
    ensure!(low.progress().value() == 0);
    ensure!(board.repository.save_calls() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn board_column_lists_one_status_in_order(board: Board) -> eyre::Result<()> {
    board.seed("T-7", TaskStatus::Todo, 2).await?;
    board.seed("T-6", TaskStatus::Todo, 1).await?;
    board.seed("T-8", TaskStatus::Developing, 0).await?;

    let column = board
        .engine
        .board_column(&CallContext::new(), TaskStatus::Todo)
        .await?;

    let ids: Vec<&str> = column.iter().map(|task| task.id().as_str()).collect();
    ensure!(ids == ["T-6", "T-7"]);
    Ok(())
}
