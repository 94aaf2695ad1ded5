//! Given steps for task workflow BDD scenarios.

use super::world::{TaskWorkflowWorld, run_async};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::given;
use taskflow::task::{
    domain::{Position, Task, TaskId, TaskStatus},
    ports::TaskRepository,
};

#[given(r#"a task "{task_id}" in "{status}""#)]
fn task_in_status(
    world: &mut TaskWorkflowWorld,
    task_id: String,
    status: String,
) -> Result<(), eyre::Report> {
    let column = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))?;
    let task = Task::new(TaskId::new(task_id.as_str())?, format!("Task {task_id}"), &DefaultClock)?
        .with_placement(column, Position::TOP);

    run_async(world.repository.save(&task)).wrap_err("seed task for workflow scenario")?;
    Ok(())
}
