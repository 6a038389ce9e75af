use crate::domain::models::{BlockOrigin, RECURRING_ID_PREFIX, RecurringBlock, ScheduleBlock};
use chrono::{Datelike, NaiveDate};

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// Occurrence ids are deterministic so the reminder dedup set and the UI can
// address a projection without storing it.
pub fn occurrence_id(template_id: &str, date: NaiveDate) -> String {
    format!("{RECURRING_ID_PREFIX}{template_id}:{date}")
}

pub fn occurrence_for_date(template: &RecurringBlock, date: NaiveDate) -> Option<ScheduleBlock> {
    if !template.days_of_week.contains(&weekday_index(date)) {
        return None;
    }
    Some(ScheduleBlock {
        id: occurrence_id(&template.id, date),
        title: template.title.clone(),
        start_slot: template.start_slot,
        duration_slots: template.duration_slots,
        color: template.color.clone(),
        reminder: template.reminder,
        reminder_lead_minutes: template.reminder_lead_minutes,
        origin: BlockOrigin::Recurring {
            template_id: template.id.clone(),
        },
    })
}

pub fn occurrences_for_date(templates: &[RecurringBlock], date: NaiveDate) -> Vec<ScheduleBlock> {
    templates
        .iter()
        .filter_map(|template| occurrence_for_date(template, date))
        .collect()
}
