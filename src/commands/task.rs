use crate::models::task::{TaskCreateInput, TaskRecord, TaskUpdateInput};

use super::{run_blocking, AppState, CommandResult};

pub async fn tasks_list(state: &AppState) -> CommandResult<Vec<TaskRecord>> {
    let state = state.clone();
    run_blocking(move || state.tasks().list_tasks()).await
}

pub async fn tasks_get(state: &AppState, id: String) -> CommandResult<TaskRecord> {
    let state = state.clone();
    run_blocking(move || state.tasks().get_task(&id)).await
}

pub async fn tasks_create(state: &AppState, payload: TaskCreateInput) -> CommandResult<TaskRecord> {
    let state = state.clone();
    run_blocking(move || state.tasks().create_task(payload)).await
}

pub async fn tasks_update(
    state: &AppState,
    id: String,
    payload: TaskUpdateInput,
) -> CommandResult<TaskRecord> {
    let state = state.clone();
    run_blocking(move || state.tasks().update_task(&id, payload)).await
}

pub async fn tasks_delete(state: &AppState, id: String) -> CommandResult<()> {
    let state = state.clone();
    run_blocking(move || state.tasks().delete_task(&id)).await
}
