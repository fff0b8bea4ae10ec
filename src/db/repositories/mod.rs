pub mod daily_plan_repository;
pub mod settings_repository;
pub mod task_repository;
