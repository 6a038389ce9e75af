pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::block_store::{
    BlockDraft, BlockPatch, BlockStore, ConflictDecision, ConflictHandler,
};
pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::context::PlannerContext;
pub use application::reminder::{
    load_reminder_policy, spawn_reminder_scheduler, ReminderEngine, ReminderPolicy,
    ReminderSchedulerHandle, UpcomingReminder,
};
pub use domain::color::{contrasting_text_color, resolve_block_color, Palette, ResolvedColor};
pub use domain::models::{BlockOrigin, RecurringBlock, ScheduleBlock, TimeBlock};
pub use domain::recurrence::{occurrence_for_date, occurrences_for_date};
pub use domain::schedule::{build_day_schedule, find_next_available_slot, OccupancyMap};
pub use domain::slots::{format_range, slot_to_time, TimeFormat, SLOTS_PER_DAY};
pub use infrastructure::block_repository::{
    BlockRepository, InMemoryBlockRepository, SqliteBlockRepository,
};
pub use infrastructure::error::PlannerError;
pub use infrastructure::notification::{
    InMemoryNotificationClient, NotificationClient, NotificationPermission,
};
pub use infrastructure::storage::initialize_database;
