use crate::domain::models::ScheduleBlock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Slot conflict with block '{}' at slot {}", conflicting.title, conflicting.start_slot)]
    SlotConflict { conflicting: Box<ScheduleBlock> },
    #[error("Notification error: {0}")]
    Notification(String),
}
