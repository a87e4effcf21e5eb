//! Conflict-ranked slot search.
//!
//! Used when a fully-free slot is not expected to exist: enumerates
//! fixed-duration candidate slots across the window and ranks the ones with
//! the fewest conflicting participants. Unlike the first-fit path this works
//! on per-participant raw events, since it must attribute each conflict.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::TaggedEvent;
use crate::types::{ParticipantLabel, TimeWindow};

/// A sub-range of a candidate slot during which one or more participants are
/// busy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub conflicting_participants: BTreeSet<ParticipantLabel>,
}

/// A candidate slot with its conflicts. An empty `conflicts` list means the
/// slot is fully free for every queried participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    pub conflicts: Vec<ConflictInfo>,
}

/// Policy knobs for the sliding-window slot search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSearchConfig {
    /// Candidate slot durations, tried in order.
    pub durations_minutes: Vec<i64>,

    /// Cursor step while searching for fully-free slots.
    pub free_step_minutes: i64,

    /// Cursor step while searching for partially-free slots. Coarser than
    /// the free step: partial search is the fallback path, so it trades
    /// candidate density for cost.
    pub partial_step_minutes: i64,

    /// Maximum number of ranked partial slots returned.
    pub max_partial_results: usize,
}

impl Default for SlotSearchConfig {
    fn default() -> Self {
        Self {
            durations_minutes: vec![30, 60, 90, 120],
            free_step_minutes: 15,
            partial_step_minutes: 30,
            max_partial_results: 5,
        }
    }
}

/// Finds fully-free slots: for each configured duration, the earliest
/// candidate with zero conflicts (first-fit per duration).
pub fn find_free_slots(
    events: &[TaggedEvent],
    participants: &[ParticipantLabel],
    window: &TimeWindow,
    config: &SlotSearchConfig,
) -> Vec<AvailabilitySlot> {
    if participants.is_empty() {
        return Vec::new();
    }
    let step = Duration::minutes(config.free_step_minutes.max(1));
    let mut slots = Vec::new();

    for &duration_minutes in &config.durations_minutes {
        let duration = Duration::minutes(duration_minutes);
        let mut current = window.start();

        while current + duration <= window.end() {
            let slot_end = current + duration;
            let conflicts = conflicts_for_slot(events, participants, current, slot_end);

            if conflicts.is_empty() {
                slots.push(AvailabilitySlot {
                    start: current,
                    end: slot_end,
                    duration_minutes,
                    conflicts: Vec::new(),
                });
                // First fit for this duration; move on to the next one.
                break;
            }
            current += step;
        }
    }

    slots
}

/// Finds partially-free slots: candidates where some but not all
/// participants conflict, ranked by ascending conflict count and then
/// descending duration, truncated to the configured top-N.
///
/// Slots where literally everyone conflicts are excluded as useless.
pub fn find_partial_slots(
    events: &[TaggedEvent],
    participants: &[ParticipantLabel],
    window: &TimeWindow,
    config: &SlotSearchConfig,
) -> Vec<AvailabilitySlot> {
    if participants.is_empty() {
        return Vec::new();
    }
    let step = Duration::minutes(config.partial_step_minutes.max(1));
    let mut slots = Vec::new();

    for &duration_minutes in &config.durations_minutes {
        let duration = Duration::minutes(duration_minutes);
        let mut current = window.start();

        while current + duration <= window.end() {
            let slot_end = current + duration;
            let conflicts = conflicts_for_slot(events, participants, current, slot_end);

            if !conflicts.is_empty() && conflicts.len() < participants.len() {
                slots.push(AvailabilitySlot {
                    start: current,
                    end: slot_end,
                    duration_minutes,
                    conflicts,
                });
            }
            current += step;
        }
    }

    slots.sort_by(|a, b| {
        a.conflicts
            .len()
            .cmp(&b.conflicts.len())
            .then(b.duration_minutes.cmp(&a.duration_minutes))
    });
    slots.truncate(config.max_partial_results);
    slots
}

/// Computes the conflict list for one candidate slot.
///
/// Each overlapping event contributes the clamped overlap sub-range for its
/// owner. Sub-ranges from different participants are merged into one entry
/// only when their start and end instants are exactly equal; near-identical
/// overlaps stay separate entries.
fn conflicts_for_slot(
    events: &[TaggedEvent],
    participants: &[ParticipantLabel],
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
) -> Vec<ConflictInfo> {
    let mut conflicts: Vec<ConflictInfo> = Vec::new();

    for participant in participants {
        let overlapping = events.iter().filter(|event| {
            event.owner == *participant
                && event.start_instant() < slot_end
                && event.end_instant() > slot_start
        });

        for event in overlapping {
            let conflict_start = event.start_instant().max(slot_start);
            let conflict_end = event.end_instant().min(slot_end);

            if let Some(existing) = conflicts
                .iter_mut()
                .find(|c| c.start == conflict_start && c.end == conflict_end)
            {
                existing
                    .conflicting_participants
                    .insert(participant.clone());
            } else {
                conflicts.push(ConflictInfo {
                    start: conflict_start,
                    end: conflict_end,
                    conflicting_participants: BTreeSet::from([participant.clone()]),
                });
            }
        }
    }

    conflicts
}
