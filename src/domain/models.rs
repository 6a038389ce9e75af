use crate::domain::slots::SLOTS_PER_DAY;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const RECURRING_ID_PREFIX: &str = "rec:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBlock {
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
    pub start_slot: u32,
    pub duration_slots: u32,
    pub color: String,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_lead_minutes: Option<u32>,
}

impl TimeBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.title, "block.title")?;
        if self.id.starts_with(RECURRING_ID_PREFIX) {
            return Err(format!(
                "block.id must not start with '{RECURRING_ID_PREFIX}' (reserved for derived occurrences)"
            ));
        }
        validate_slot_span(self.start_slot, self.duration_slots, "block")?;
        Ok(())
    }

    pub fn end_slot(&self) -> u32 {
        self.start_slot + self.duration_slots.saturating_sub(1)
    }

    pub fn effective_lead_minutes(&self, default_lead: u32) -> u32 {
        effective_lead(self.reminder, self.reminder_lead_minutes, default_lead)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringBlock {
    pub id: String,
    pub title: String,
    pub start_slot: u32,
    pub duration_slots: u32,
    pub color: String,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_lead_minutes: Option<u32>,
    pub days_of_week: BTreeSet<u8>,
}

impl RecurringBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "recurring.id")?;
        validate_non_empty(&self.title, "recurring.title")?;
        validate_slot_span(self.start_slot, self.duration_slots, "recurring")?;
        if self.days_of_week.is_empty() {
            return Err("recurring.days_of_week must not be empty".to_string());
        }
        for day in &self.days_of_week {
            if *day > 6 {
                return Err("recurring.days_of_week[] must be 0..=6 (0 = Sunday)".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockOrigin {
    OneOff,
    Recurring { template_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleBlock {
    pub id: String,
    pub title: String,
    pub start_slot: u32,
    pub duration_slots: u32,
    pub color: String,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_lead_minutes: Option<u32>,
    pub origin: BlockOrigin,
}

impl ScheduleBlock {
    pub fn from_one_off(block: &TimeBlock) -> Self {
        ScheduleBlock {
            id: block.id.clone(),
            title: block.title.clone(),
            start_slot: block.start_slot,
            duration_slots: block.duration_slots,
            color: block.color.clone(),
            reminder: block.reminder,
            reminder_lead_minutes: block.reminder_lead_minutes,
            origin: BlockOrigin::OneOff,
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.origin, BlockOrigin::Recurring { .. })
    }

    pub fn end_slot(&self) -> u32 {
        self.start_slot + self.duration_slots.saturating_sub(1)
    }

    pub fn effective_lead_minutes(&self, default_lead: u32) -> u32 {
        effective_lead(self.reminder, self.reminder_lead_minutes, default_lead)
    }
}

// An explicit lead always wins; the legacy reminder flag alone means "use the
// configured default". Explicit zero disables the reminder.
fn effective_lead(reminder: bool, lead: Option<u32>, default_lead: u32) -> u32 {
    match lead {
        Some(minutes) => minutes,
        None if reminder => default_lead,
        None => 0,
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_slot_span(start_slot: u32, duration_slots: u32, prefix: &str) -> Result<(), String> {
    if start_slot >= SLOTS_PER_DAY {
        return Err(format!(
            "{prefix}.start_slot must be <= {}",
            SLOTS_PER_DAY - 1
        ));
    }
    if duration_slots == 0 {
        return Err(format!("{prefix}.duration_slots must be > 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn sample_time_block() -> TimeBlock {
        TimeBlock {
            id: "blk-1".to_string(),
            date: sample_date(),
            title: "Deep work".to_string(),
            start_slot: 54,
            duration_slots: 6,
            color: "blue".to_string(),
            reminder: true,
            reminder_lead_minutes: None,
        }
    }

    fn sample_recurring_block() -> RecurringBlock {
        RecurringBlock {
            id: "standup".to_string(),
            title: "Standup".to_string(),
            start_slot: 57,
            duration_slots: 2,
            color: "#8b5cf6".to_string(),
            reminder: false,
            reminder_lead_minutes: Some(5),
            days_of_week: BTreeSet::from([1, 3, 5]),
        }
    }

    #[test]
    fn time_block_validate_accepts_valid_block() {
        assert!(sample_time_block().validate().is_ok());
    }

    #[test]
    fn time_block_validate_rejects_empty_title() {
        let mut block = sample_time_block();
        block.title = "   ".to_string();
        assert!(block.validate().is_err());
    }

    #[test]
    fn time_block_validate_rejects_out_of_range_start() {
        let mut block = sample_time_block();
        block.start_slot = 144;
        assert!(block.validate().is_err());
    }

    #[test]
    fn time_block_validate_rejects_zero_duration() {
        let mut block = sample_time_block();
        block.duration_slots = 0;
        assert!(block.validate().is_err());
    }

    #[test]
    fn time_block_validate_allows_overhang_past_midnight() {
        let mut block = sample_time_block();
        block.start_slot = 142;
        block.duration_slots = 4;
        assert!(block.validate().is_ok());
    }

    #[test]
    fn time_block_validate_rejects_reserved_id_prefix() {
        let mut block = sample_time_block();
        block.id = "rec:standup:2026-02-16".to_string();
        assert!(block.validate().is_err());
    }

    #[test]
    fn recurring_block_validate_rejects_bad_weekday() {
        let mut recurring = sample_recurring_block();
        recurring.days_of_week = BTreeSet::from([7]);
        assert!(recurring.validate().is_err());
        recurring.days_of_week = BTreeSet::new();
        assert!(recurring.validate().is_err());
    }

    #[test]
    fn effective_lead_prefers_explicit_minutes() {
        let mut block = sample_time_block();
        assert_eq!(block.effective_lead_minutes(10), 10);
        block.reminder_lead_minutes = Some(25);
        assert_eq!(block.effective_lead_minutes(10), 25);
        block.reminder = false;
        assert_eq!(block.effective_lead_minutes(10), 25);
    }

    #[test]
    fn effective_lead_zero_disables_reminder() {
        let mut block = sample_time_block();
        block.reminder = true;
        block.reminder_lead_minutes = Some(0);
        assert_eq!(block.effective_lead_minutes(10), 0);
        block.reminder_lead_minutes = None;
        block.reminder = false;
        assert_eq!(block.effective_lead_minutes(10), 0);
    }

    #[test]
    fn block_origin_serializes_with_kind_tag() {
        let origin = BlockOrigin::Recurring {
            template_id: "standup".to_string(),
        };
        let value = serde_json::to_value(&origin).expect("serialize origin");
        assert_eq!(value["kind"], "recurring");
        assert_eq!(value["template_id"], "standup");
        let one_off = serde_json::to_value(BlockOrigin::OneOff).expect("serialize origin");
        assert_eq!(one_off["kind"], "one_off");
    }

    // Feature: dayplan, Property 4: domain models survive a serde round-trip
    proptest! {
        #[test]
        fn property4_time_block_serde_roundtrip(
            start_slot in 0u32..144,
            duration_slots in 1u32..=144,
            reminder in proptest::bool::ANY,
            lead in proptest::option::of(0u32..240),
        ) {
            let mut block = sample_time_block();
            block.start_slot = start_slot;
            block.duration_slots = duration_slots;
            block.reminder = reminder;
            block.reminder_lead_minutes = lead;

            let roundtrip: TimeBlock =
                serde_json::from_str(&serde_json::to_string(&block).expect("serialize block"))
                    .expect("deserialize block");
            prop_assert_eq!(roundtrip, block);
        }
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let block = sample_time_block();
        let recurring = sample_recurring_block();
        let schedule_block = ScheduleBlock::from_one_off(&block);

        let block_roundtrip: TimeBlock =
            serde_json::from_str(&serde_json::to_string(&block).expect("serialize block"))
                .expect("deserialize block");
        let recurring_roundtrip: RecurringBlock = serde_json::from_str(
            &serde_json::to_string(&recurring).expect("serialize recurring"),
        )
        .expect("deserialize recurring");
        let schedule_roundtrip: ScheduleBlock = serde_json::from_str(
            &serde_json::to_string(&schedule_block).expect("serialize schedule block"),
        )
        .expect("deserialize schedule block");

        assert_eq!(block_roundtrip, block);
        assert_eq!(recurring_roundtrip, recurring);
        assert_eq!(schedule_roundtrip, schedule_block);
    }

    #[test]
    fn missing_reminder_fields_default_off() {
        let raw = r#"{
            "id": "blk-2",
            "date": "2026-02-16",
            "title": "Lunch",
            "start_slot": 72,
            "duration_slots": 3,
            "color": "green"
        }"#;
        let block: TimeBlock = serde_json::from_str(raw).expect("deserialize block");
        assert!(!block.reminder);
        assert_eq!(block.reminder_lead_minutes, None);
        assert_eq!(block.effective_lead_minutes(10), 0);
    }
}
