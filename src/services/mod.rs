pub mod calendar_service;
pub mod intervals;
pub mod planning_service;
pub mod schedule_utils;
pub mod settings_service;
pub mod slot_scheduler;
pub mod task_service;
