use crate::domain::models::{RecurringBlock, ScheduleBlock, TimeBlock};
use crate::domain::recurrence::occurrences_for_date;
use crate::domain::schedule::{
    build_day_schedule, find_conflict, find_next_available_slot, OccupancyMap,
};
use crate::infrastructure::block_repository::BlockRepository;
use crate::infrastructure::error::PlannerError;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    Abort,
    Commit,
}

pub type ConflictHandler<'a> = dyn Fn(&ScheduleBlock) -> ConflictDecision + 'a;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub start_slot: u32,
    pub duration_slots: u32,
    pub color: String,
    #[serde(default)]
    pub reminder: bool,
    #[serde(default)]
    pub reminder_lead_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_slot: Option<u32>,
    #[serde(default)]
    pub duration_slots: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub reminder: Option<bool>,
    // Set-or-keep; a stored lead cannot be cleared back to the legacy default.
    #[serde(default)]
    pub reminder_lead_minutes: Option<u32>,
}

pub struct BlockStore<R: BlockRepository> {
    repository: Arc<R>,
}

impl<R: BlockRepository> BlockStore<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn add_block(
        &self,
        date: NaiveDate,
        draft: BlockDraft,
        on_conflict: Option<&ConflictHandler<'_>>,
    ) -> Result<TimeBlock, PlannerError> {
        let id = draft
            .id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| next_id("blk"));

        let block = TimeBlock {
            id,
            date,
            title: draft.title.trim().to_string(),
            start_slot: draft.start_slot,
            duration_slots: draft.duration_slots,
            color: draft.color.trim().to_string(),
            reminder: draft.reminder,
            reminder_lead_minutes: draft.reminder_lead_minutes,
        };
        block.validate().map_err(PlannerError::InvalidBlock)?;

        let mut blocks = self.repository.load_blocks_for_date(date)?;
        if blocks.iter().any(|existing| existing.id == block.id) {
            return Err(PlannerError::InvalidBlock(format!(
                "duplicate block id '{}' on {date}",
                block.id
            )));
        }

        let occurrences = self.occurrences_for(date)?;
        self.resolve_conflict(
            block.start_slot,
            block.duration_slots,
            None,
            &blocks,
            &occurrences,
            on_conflict,
        )?;

        blocks.push(block.clone());
        self.repository.save_blocks_for_date(date, &blocks)?;
        Ok(block)
    }

    pub fn update_block(
        &self,
        date: NaiveDate,
        block_id: &str,
        patch: BlockPatch,
        on_conflict: Option<&ConflictHandler<'_>>,
    ) -> Result<TimeBlock, PlannerError> {
        let block_id = block_id.trim();
        if block_id.is_empty() {
            return Err(PlannerError::InvalidBlock(
                "block_id must not be empty".to_string(),
            ));
        }

        let mut blocks = self.repository.load_blocks_for_date(date)?;
        let Some(index) = blocks.iter().position(|block| block.id == block_id) else {
            return Err(PlannerError::InvalidBlock(format!(
                "block not found: {block_id}"
            )));
        };

        let mut updated = blocks[index].clone();
        if let Some(title) = patch.title {
            updated.title = title.trim().to_string();
        }
        if let Some(start_slot) = patch.start_slot {
            updated.start_slot = start_slot;
        }
        if let Some(duration_slots) = patch.duration_slots {
            updated.duration_slots = duration_slots;
        }
        if let Some(color) = patch.color {
            updated.color = color.trim().to_string();
        }
        if let Some(reminder) = patch.reminder {
            updated.reminder = reminder;
        }
        if let Some(lead) = patch.reminder_lead_minutes {
            updated.reminder_lead_minutes = Some(lead);
        }
        updated.validate().map_err(PlannerError::InvalidBlock)?;

        let occurrences = self.occurrences_for(date)?;
        self.resolve_conflict(
            updated.start_slot,
            updated.duration_slots,
            Some(block_id),
            &blocks,
            &occurrences,
            on_conflict,
        )?;

        blocks[index] = updated.clone();
        self.repository.save_blocks_for_date(date, &blocks)?;
        Ok(updated)
    }

    pub fn delete_block(&self, date: NaiveDate, block_id: &str) -> Result<bool, PlannerError> {
        let block_id = block_id.trim();
        if block_id.is_empty() {
            return Err(PlannerError::InvalidBlock(
                "block_id must not be empty".to_string(),
            ));
        }

        let mut blocks = self.repository.load_blocks_for_date(date)?;
        let before = blocks.len();
        blocks.retain(|block| block.id != block_id);
        if blocks.len() == before {
            return Ok(false);
        }
        self.repository.save_blocks_for_date(date, &blocks)?;
        Ok(true)
    }

    pub fn list_blocks(&self, date: NaiveDate) -> Result<Vec<TimeBlock>, PlannerError> {
        self.repository.load_blocks_for_date(date)
    }

    pub fn list_recurring_templates(&self) -> Result<Vec<RecurringBlock>, PlannerError> {
        self.repository.load_recurring_templates()
    }

    pub fn schedule_for_date(&self, date: NaiveDate) -> Result<OccupancyMap, PlannerError> {
        let blocks = self.repository.load_blocks_for_date(date)?;
        let occurrences = self.occurrences_for(date)?;
        Ok(build_day_schedule(&blocks, &occurrences))
    }

    pub fn find_next_available_slot(
        &self,
        date: NaiveDate,
        duration_slots: u32,
        start_slot: u32,
    ) -> Result<Option<u32>, PlannerError> {
        let occupancy = self.schedule_for_date(date)?;
        Ok(find_next_available_slot(
            &occupancy,
            duration_slots,
            start_slot,
        ))
    }

    fn occurrences_for(&self, date: NaiveDate) -> Result<Vec<ScheduleBlock>, PlannerError> {
        let templates = self.repository.load_recurring_templates()?;
        Ok(occurrences_for_date(&templates, date))
    }

    // The store only writes after the caller has seen the conflict and asked
    // for it to be committed anyway. No handler means no override.
    fn resolve_conflict(
        &self,
        start_slot: u32,
        duration_slots: u32,
        exclude_id: Option<&str>,
        blocks: &[TimeBlock],
        occurrences: &[ScheduleBlock],
        on_conflict: Option<&ConflictHandler<'_>>,
    ) -> Result<(), PlannerError> {
        let Some(conflicting) =
            find_conflict(start_slot, duration_slots, exclude_id, blocks, occurrences)
        else {
            return Ok(());
        };
        let decision = match on_conflict {
            Some(handler) => handler(&conflicting),
            None => ConflictDecision::Abort,
        };
        match decision {
            ConflictDecision::Commit => Ok(()),
            ConflictDecision::Abort => Err(PlannerError::SlotConflict {
                conflicting: Box::new(conflicting),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BlockOrigin;
    use crate::infrastructure::block_repository::InMemoryBlockRepository;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn sample_date() -> NaiveDate {
        // A Monday.
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn store() -> BlockStore<InMemoryBlockRepository> {
        BlockStore::new(Arc::new(InMemoryBlockRepository::default()))
    }

    fn draft(title: &str, start_slot: u32, duration_slots: u32) -> BlockDraft {
        BlockDraft {
            id: None,
            title: title.to_string(),
            start_slot,
            duration_slots,
            color: "blue".to_string(),
            reminder: false,
            reminder_lead_minutes: None,
        }
    }

    fn standup_template() -> RecurringBlock {
        RecurringBlock {
            id: "standup".to_string(),
            title: "Standup".to_string(),
            start_slot: 57,
            duration_slots: 2,
            color: "purple".to_string(),
            reminder: false,
            reminder_lead_minutes: None,
            days_of_week: BTreeSet::from([1, 3, 5]),
        }
    }

    #[test]
    fn add_block_persists_and_generates_an_id() {
        let store = store();
        let block = store
            .add_block(sample_date(), draft("Deep work", 54, 6), None)
            .expect("add block");
        assert!(block.id.starts_with("blk-"));
        assert_eq!(block.title, "Deep work");

        let stored = store.list_blocks(sample_date()).expect("list blocks");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], block);
    }

    #[test]
    fn add_block_honors_an_explicit_id() {
        let store = store();
        let mut explicit = draft("Lunch", 72, 3);
        explicit.id = Some("  lunch-1  ".to_string());
        let block = store
            .add_block(sample_date(), explicit, None)
            .expect("add block");
        assert_eq!(block.id, "lunch-1");
    }

    #[test]
    fn add_block_rejects_blank_title() {
        let store = store();
        let result = store.add_block(sample_date(), draft("   ", 10, 2), None);
        match result {
            Err(PlannerError::InvalidBlock(message)) => {
                assert!(message.contains("title"));
            }
            _ => panic!("expected invalid block error"),
        }
    }

    #[test]
    fn add_block_rejects_reserved_occurrence_ids() {
        let store = store();
        let mut reserved = draft("Sneaky", 10, 2);
        reserved.id = Some("rec:standup:2026-02-16".to_string());
        assert!(store.add_block(sample_date(), reserved, None).is_err());
    }

    #[test]
    fn add_block_rejects_duplicate_ids() {
        let store = store();
        let mut first = draft("One", 10, 2);
        first.id = Some("fixed".to_string());
        store
            .add_block(sample_date(), first, None)
            .expect("add first");

        let mut second = draft("Two", 20, 2);
        second.id = Some("fixed".to_string());
        let result = store.add_block(sample_date(), second, None);
        match result {
            Err(PlannerError::InvalidBlock(message)) => {
                assert!(message.contains("duplicate"));
            }
            _ => panic!("expected duplicate id error"),
        }
    }

    #[test]
    fn overlapping_add_without_handler_fails_and_leaves_day_unchanged() {
        let store = store();
        store
            .add_block(sample_date(), draft("Existing", 54, 6), None)
            .expect("add existing");
        let before = store.list_blocks(sample_date()).expect("list blocks");

        let result = store.add_block(sample_date(), draft("Overlap", 57, 2), None);
        match result {
            Err(PlannerError::SlotConflict { conflicting }) => {
                assert_eq!(conflicting.title, "Existing");
                assert_eq!(conflicting.origin, BlockOrigin::OneOff);
            }
            _ => panic!("expected slot conflict"),
        }

        let after = store.list_blocks(sample_date()).expect("list blocks");
        assert_eq!(after, before);
    }

    #[test]
    fn conflict_handler_abort_keeps_the_block_out() {
        let store = store();
        store
            .add_block(sample_date(), draft("Existing", 54, 6), None)
            .expect("add existing");

        let seen = Mutex::new(Vec::new());
        let handler = |conflicting: &ScheduleBlock| {
            seen.lock().expect("seen lock").push(conflicting.id.clone());
            ConflictDecision::Abort
        };
        let result = store.add_block(sample_date(), draft("Overlap", 57, 2), Some(&handler));
        assert!(matches!(result, Err(PlannerError::SlotConflict { .. })));
        assert_eq!(seen.lock().expect("seen lock").len(), 1);
        assert_eq!(store.list_blocks(sample_date()).expect("list blocks").len(), 1);
    }

    #[test]
    fn conflict_handler_commit_forces_the_overlap() {
        let store = store();
        store
            .add_block(sample_date(), draft("Existing", 54, 6), None)
            .expect("add existing");

        let handler = |_conflicting: &ScheduleBlock| ConflictDecision::Commit;
        let forced = store
            .add_block(sample_date(), draft("Forced", 57, 2), Some(&handler))
            .expect("forced add");

        let stored = store.list_blocks(sample_date()).expect("list blocks");
        assert_eq!(stored.len(), 2);

        // The block stored later wins reads on contested slots.
        let occupancy = store.schedule_for_date(sample_date()).expect("schedule");
        assert_eq!(occupancy[&57].id, forced.id);
        assert_eq!(occupancy[&58].id, forced.id);
        assert_eq!(occupancy[&54].title, "Existing");
    }

    #[test]
    fn add_block_conflicts_with_a_recurring_occurrence() {
        let repository = Arc::new(InMemoryBlockRepository::default());
        repository
            .set_recurring_templates(vec![standup_template()])
            .expect("seed templates");
        let store = BlockStore::new(repository);

        // 2026-02-16 is a Monday, so the standup projects onto slots 57-58.
        let result = store.add_block(sample_date(), draft("Overlap", 58, 2), None);
        match result {
            Err(PlannerError::SlotConflict { conflicting }) => {
                assert!(conflicting.is_recurring());
                assert_eq!(conflicting.id, "rec:standup:2026-02-16");
            }
            _ => panic!("expected recurring conflict"),
        }

        // Tuesday is quiet; the same span is free.
        let tuesday = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
        assert!(store.add_block(tuesday, draft("Quiet", 58, 2), None).is_ok());
    }

    #[test]
    fn update_block_can_move_within_its_own_span() {
        let store = store();
        let mut fixed = draft("Existing", 54, 6);
        fixed.id = Some("existing".to_string());
        store
            .add_block(sample_date(), fixed, None)
            .expect("add existing");

        let patch = BlockPatch {
            start_slot: Some(55),
            duration_slots: Some(4),
            ..BlockPatch::default()
        };
        let updated = store
            .update_block(sample_date(), "existing", patch, None)
            .expect("update block");
        assert_eq!(updated.start_slot, 55);
        assert_eq!(updated.duration_slots, 4);
    }

    #[test]
    fn update_block_detects_occurrence_hidden_under_itself() {
        let repository = Arc::new(InMemoryBlockRepository::default());
        repository
            .set_recurring_templates(vec![standup_template()])
            .expect("seed templates");
        let store = BlockStore::new(repository);

        let handler = |_conflicting: &ScheduleBlock| ConflictDecision::Commit;
        let mut forced = draft("On top", 57, 2);
        forced.id = Some("on-top".to_string());
        store
            .add_block(sample_date(), forced, Some(&handler))
            .expect("forced add");

        // Still overlapping the standup underneath; without a handler the
        // update must fail.
        let patch = BlockPatch {
            start_slot: Some(58),
            duration_slots: Some(1),
            ..BlockPatch::default()
        };
        let result = store.update_block(sample_date(), "on-top", patch, None);
        match result {
            Err(PlannerError::SlotConflict { conflicting }) => {
                assert!(conflicting.is_recurring());
            }
            _ => panic!("expected recurring conflict"),
        }
    }

    #[test]
    fn update_patch_keeps_an_unmentioned_lead() {
        let store = store();
        let mut fixed = draft("Existing", 54, 6);
        fixed.id = Some("existing".to_string());
        fixed.reminder_lead_minutes = Some(15);
        store
            .add_block(sample_date(), fixed, None)
            .expect("add existing");

        let patch = BlockPatch {
            title: Some("Renamed".to_string()),
            ..BlockPatch::default()
        };
        let updated = store
            .update_block(sample_date(), "existing", patch, None)
            .expect("update block");
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.reminder_lead_minutes, Some(15));
    }

    #[test]
    fn update_block_rejects_unknown_ids() {
        let store = store();
        let result = store.update_block(sample_date(), "missing", BlockPatch::default(), None);
        match result {
            Err(PlannerError::InvalidBlock(message)) => {
                assert!(message.contains("not found"));
            }
            _ => panic!("expected invalid block error"),
        }
    }

    #[test]
    fn delete_block_reports_whether_anything_was_removed() {
        let store = store();
        let mut fixed = draft("Existing", 54, 6);
        fixed.id = Some("existing".to_string());
        store
            .add_block(sample_date(), fixed, None)
            .expect("add existing");

        assert!(store.delete_block(sample_date(), "existing").expect("delete"));
        assert!(!store.delete_block(sample_date(), "existing").expect("repeat delete"));
        assert!(store.schedule_for_date(sample_date()).expect("schedule").is_empty());
    }

    #[test]
    fn template_seeding_rejects_an_out_of_range_template() {
        let repository = InMemoryBlockRepository::default();
        let mut bad = standup_template();
        bad.start_slot = 144;
        let result = repository.set_recurring_templates(vec![bad]);
        match result {
            Err(PlannerError::InvalidBlock(message)) => {
                assert!(message.contains("start_slot"));
            }
            _ => panic!("expected invalid block error"),
        }
        assert!(repository
            .load_recurring_templates()
            .expect("load templates")
            .is_empty());
    }

    #[test]
    fn find_next_available_slot_sees_recurring_occupancy() {
        let repository = Arc::new(InMemoryBlockRepository::default());
        repository
            .set_recurring_templates(vec![standup_template()])
            .expect("seed templates");
        let store = BlockStore::new(repository);

        let found = store
            .find_next_available_slot(sample_date(), 3, 56)
            .expect("finder");
        assert_eq!(found, Some(59));
    }

    // Feature: dayplan, Property 8: a rejected add never mutates the day
    proptest! {
        #[test]
        fn property8_rejected_add_never_mutates_the_day(
            start in 0u32..120,
            duration in 1u32..6,
            offset in 0u32..6,
            candidate_duration in 1u32..6,
        ) {
            let offset = offset % duration;
            let store = store();
            store
                .add_block(sample_date(), draft("Existing", start, duration), None)
                .expect("add existing");
            let before = store.list_blocks(sample_date()).expect("list blocks");

            let candidate_start = start + offset;
            let result = store.add_block(
                sample_date(),
                draft("Overlap", candidate_start, candidate_duration),
                None,
            );
            let conflicted = matches!(result, Err(PlannerError::SlotConflict { .. }));
            prop_assert!(conflicted);
            let after = store.list_blocks(sample_date()).expect("list blocks");
            prop_assert_eq!(after, before);
        }
    }
}
