pub mod color;
pub mod models;
pub mod recurrence;
pub mod schedule;
pub mod slots;
