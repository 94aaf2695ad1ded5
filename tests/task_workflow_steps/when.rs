//! When steps for task workflow BDD scenarios.

use super::world::{TaskWorkflowWorld, run_async};
use rstest_bdd_macros::when;
use taskflow::{resilience::CallContext, task::services::MoveTaskRequest};

#[when(r#"the task "{task_id}" is moved to "{status}" at position {position:i64}"#)]
fn move_task(world: &mut TaskWorkflowWorld, task_id: String, status: String, position: i64) {
    let result = run_async(world.engine.move_task(
        &CallContext::new(),
        MoveTaskRequest::new(task_id, status, position),
    ));
    world.last_move_result = Some(result);
}

#[when(r#"the progress of task "{task_id}" is set to {progress:i64}"#)]
fn set_progress(
    world: &mut TaskWorkflowWorld,
    task_id: String,
    progress: i64,
) -> Result<(), eyre::Report> {
    let updated = run_async(world.engine.update_progress(
        &CallContext::new(),
        &task_id,
        progress,
    ))?;
    world.last_move_result = Some(Ok(updated));
    Ok(())
}

#[when(r#"the tasks "{task_ids}" are moved together to "{status}""#)]
fn move_batch(world: &mut TaskWorkflowWorld, task_ids: String, status: String) {
    let ids: Vec<&str> = task_ids.split(',').map(str::trim).collect();
    let result = run_async(world.coordinator.bulk_update_status(
        &CallContext::new(),
        &ids,
        &status,
    ));
    world.last_batch_result = Some(result);
}
