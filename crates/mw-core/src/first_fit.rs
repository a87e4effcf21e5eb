//! First-fit availability search.
//!
//! Scans the merged busy timeline for the earliest gap of at least the
//! requested duration. First-fit, not best-fit: ties break toward the
//! earliest start, and the scan stops at the first qualifying gap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::TaggedEvent;
use crate::timeline::MergedTimeline;
use crate::types::TimeWindow;

/// A found meeting slot, serialized with ISO-8601 instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Finds the earliest slot of `duration_minutes` free for every participant
/// present in `events`, within `window`.
///
/// Returns `None` when no gap fits, when the duration is non-positive, or
/// when the input carries no participant label at all. The latter means
/// there is nobody to schedule around, and the caller's intent is always
/// multi-party scheduling, so an unconstrained slot would be misleading.
pub fn find_first_available(
    events: &[TaggedEvent],
    duration_minutes: i64,
    window: &TimeWindow,
) -> Option<FoundSlot> {
    if duration_minutes <= 0 {
        return None;
    }
    // No events means no participant labels at all: nobody to schedule around.
    if events.is_empty() {
        return None;
    }
    let duration = Duration::minutes(duration_minutes);
    let timeline = MergedTimeline::build(events, window);

    let mut current = window.start();
    for busy in timeline.periods() {
        if busy.start - current >= duration {
            return Some(FoundSlot {
                start: current,
                end: current + duration,
            });
        }
        current = current.max(busy.end);
    }

    // Trailing gap after the last busy period.
    if window.end() - current >= duration {
        return Some(FoundSlot {
            start: current,
            end: current + duration,
        });
    }

    None
}
