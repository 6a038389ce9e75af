use serde::{Deserialize, Serialize};

pub const SLOTS_PER_DAY: u32 = 144;
pub const SLOT_MINUTES: u32 = 10;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeFormat {
    #[serde(rename = "12h")]
    TwelveHour,
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
}

pub fn slot_minutes_from_midnight(slot: u32) -> u32 {
    slot * SLOT_MINUTES
}

pub fn slot_to_time(slot: u32, format: TimeFormat) -> String {
    let hour = (slot / 6) % 24;
    let minute = (slot % 6) * SLOT_MINUTES;
    render_time(hour, minute, format)
}

pub fn format_range(start_slot: u32, duration_slots: u32, format: TimeFormat) -> String {
    // Inclusive end: the last covered slot plus nine minutes. The hour wraps
    // past 23 when a block runs over midnight.
    let end_slot = start_slot + duration_slots.saturating_sub(1);
    let end_hour = (end_slot / 6) % 24;
    let end_minute = (end_slot % 6) * SLOT_MINUTES + (SLOT_MINUTES - 1);
    format!(
        "{} - {}",
        slot_to_time(start_slot, format),
        render_time(end_hour, end_minute, format)
    )
}

fn render_time(hour: u32, minute: u32, format: TimeFormat) -> String {
    match format {
        TimeFormat::TwentyFourHour => format!("{hour:02}:{minute:02}"),
        TimeFormat::TwelveHour => {
            let period = if hour < 12 { "AM" } else { "PM" };
            let display_hour = match hour % 12 {
                0 => 12,
                value => value,
            };
            format!("{display_hour}:{minute:02} {period}")
        }
    }
}
