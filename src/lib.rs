pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::path::Path;

use crate::commands::AppState;
use crate::error::AppResult;

const DATABASE_FILE: &str = "dayplan.sqlite";

/// Sets up logging and storage under `data_dir` and returns the command state.
pub fn bootstrap(data_dir: &Path) -> AppResult<AppState> {
    std::fs::create_dir_all(data_dir)?;
    crate::utils::logger::init_logging(&data_dir.join("logs"))?;

    let pool = crate::db::DbPool::new(data_dir.join(DATABASE_FILE))?;
    AppState::new(pool)
}
