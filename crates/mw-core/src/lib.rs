//! Core domain logic for the meetwhen scheduling engine.
//!
//! This crate contains the pure, synchronous stages of multi-participant
//! scheduling:
//! - Normalization: clipping tagged events into a merged busy timeline
//! - First-fit search: the earliest gap of a requested duration
//! - Conflict-ranked search: least-bad options when nothing is fully free
//! - Preference search: reconciling free-text day/time hints with the
//!   busy timeline
//!
//! Fetching remote calendars and driving these stages per request lives in
//! `mw-engine`.

pub mod conflict;
pub mod event;
pub mod first_fit;
pub mod format;
pub mod preference;
pub mod timeline;
pub mod types;

pub use conflict::{AvailabilitySlot, ConflictInfo, SlotSearchConfig, find_free_slots, find_partial_slots};
pub use event::{CalendarInfo, EventTime, RawEvent, TaggedEvent};
pub use first_fit::{FoundSlot, find_first_available};
pub use format::format_events_by_participant;
pub use preference::{
    DayOfWeek, HourWindow, PreferenceHint, PreferenceWindow, SearchPolicy, find_preferred_time,
};
pub use timeline::{BusyPeriod, MergedTimeline};
pub use types::{
    CalendarId, Credential, Participant, ParticipantLabel, TimeWindow, ValidationError,
};
