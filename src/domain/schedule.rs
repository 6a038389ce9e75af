use crate::domain::models::{ScheduleBlock, TimeBlock};
use crate::domain::slots::SLOTS_PER_DAY;
use std::collections::BTreeMap;
use std::ops::Range;

pub type OccupancyMap = BTreeMap<u32, ScheduleBlock>;

// Slots past the end of the day are dropped from occupancy; an overhanging
// block only occupies what is left of its own day.
fn day_slot_range(start_slot: u32, duration_slots: u32) -> Range<u32> {
    let start = start_slot.min(SLOTS_PER_DAY);
    let end = start_slot.saturating_add(duration_slots).min(SLOTS_PER_DAY);
    start..end
}

fn ranges_overlap(a: &Range<u32>, b: &Range<u32>) -> bool {
    a.start < b.end && b.start < a.end
}

pub fn build_day_schedule(one_offs: &[TimeBlock], occurrences: &[ScheduleBlock]) -> OccupancyMap {
    let mut occupancy = OccupancyMap::new();
    for occurrence in occurrences {
        for slot in day_slot_range(occurrence.start_slot, occurrence.duration_slots) {
            occupancy.insert(slot, occurrence.clone());
        }
    }
    // One-off blocks layer over recurring occurrences on contested slots.
    for block in one_offs {
        let schedule_block = ScheduleBlock::from_one_off(block);
        for slot in day_slot_range(block.start_slot, block.duration_slots) {
            occupancy.insert(slot, schedule_block.clone());
        }
    }
    occupancy
}

pub fn find_conflict(
    start_slot: u32,
    duration_slots: u32,
    exclude_id: Option<&str>,
    one_offs: &[TimeBlock],
    occurrences: &[ScheduleBlock],
) -> Option<ScheduleBlock> {
    let candidate = day_slot_range(start_slot, duration_slots);
    if candidate.is_empty() {
        return None;
    }
    for block in one_offs {
        if exclude_id == Some(block.id.as_str()) {
            continue;
        }
        let occupied = day_slot_range(block.start_slot, block.duration_slots);
        if ranges_overlap(&candidate, &occupied) {
            return Some(ScheduleBlock::from_one_off(block));
        }
    }
    for occurrence in occurrences {
        if exclude_id == Some(occurrence.id.as_str()) {
            continue;
        }
        let occupied = day_slot_range(occurrence.start_slot, occurrence.duration_slots);
        if ranges_overlap(&candidate, &occupied) {
            return Some(occurrence.clone());
        }
    }
    None
}

pub fn find_next_available_slot(
    occupancy: &OccupancyMap,
    duration_slots: u32,
    start_slot: u32,
) -> Option<u32> {
    if duration_slots == 0 || duration_slots > SLOTS_PER_DAY {
        return None;
    }
    // The run must fit inside the day; no wrapping into tomorrow.
    let last_candidate = SLOTS_PER_DAY - duration_slots;
    let mut candidate = start_slot;
    while candidate <= last_candidate {
        let occupied = (candidate..candidate + duration_slots)
            .find(|slot| occupancy.contains_key(slot));
        match occupied {
            None => return Some(candidate),
            Some(slot) => candidate = slot + 1,
        }
    }
    None
}
