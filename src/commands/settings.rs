use crate::models::settings::AppSettings;
use crate::services::settings_service::SettingsUpdateInput;

use super::{run_blocking, AppState, CommandResult};

pub async fn settings_get(state: &AppState) -> CommandResult<AppSettings> {
    let state = state.clone();
    run_blocking(move || state.settings().get()).await
}

pub async fn settings_update(
    state: &AppState,
    payload: SettingsUpdateInput,
) -> CommandResult<AppSettings> {
    let state = state.clone();
    run_blocking(move || state.settings().update(payload)).await
}
