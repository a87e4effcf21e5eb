//! Raw and participant-tagged calendar events.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CalendarId, ParticipantLabel};

/// An event boundary: either a precise instant or a date-only (all-day) value.
///
/// Date-only values resolve to the start of that calendar day in UTC. The
/// remote source reports all-day events with an exclusive end date, so
/// resolving both boundaries to day start covers the full final day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    /// A precise timestamp.
    At(DateTime<Utc>),
    /// A date-only value for an all-day event.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Resolves the boundary to an absolute instant.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Self::At(t) => *t,
            Self::AllDay(d) => d.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns true if this boundary came from an all-day event.
    pub const fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }
}

/// An event as returned by the remote event source, before tagging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Human-readable event title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// When the event starts.
    pub start: EventTime,

    /// When the event ends.
    pub end: EventTime,
}

/// A calendar as listed by the remote event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    /// The calendar identifier, used for subsequent event fetches.
    pub id: CalendarId,

    /// Human-readable calendar name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Whether this is the account's primary calendar.
    #[serde(default)]
    pub primary: bool,
}

/// A raw event annotated with the participant and calendar it came from.
///
/// Immutable once built; created by the aggregator, consumed by the
/// normalization and search stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedEvent {
    /// The participant whose calendar produced this event.
    pub owner: ParticipantLabel,

    /// The calendar the event was fetched from.
    pub source_calendar_id: CalendarId,

    /// 1-based position of the owner in the original participant list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_index: Option<usize>,

    /// Human-readable event title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// When the event starts.
    pub start: EventTime,

    /// When the event ends.
    pub end: EventTime,
}

impl TaggedEvent {
    /// Tags a raw event with its owning participant and source calendar.
    pub fn tag(
        raw: RawEvent,
        owner: ParticipantLabel,
        source_calendar_id: CalendarId,
        participant_index: Option<usize>,
    ) -> Self {
        Self {
            owner,
            source_calendar_id,
            participant_index,
            title: raw.title,
            start: raw.start,
            end: raw.end,
        }
    }

    /// The effective start instant (all-day events start at day start).
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.instant()
    }

    /// The effective end instant.
    pub fn end_instant(&self) -> DateTime<Utc> {
        self.end.instant()
    }
}
