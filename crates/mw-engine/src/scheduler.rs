//! The scheduling facade.
//!
//! `Scheduler` ties the aggregator to the pure search functions in
//! `mw-core` and exposes the three caller operations: first-fit,
//! conflict-ranked availability, and preference-weighted search. The only
//! hard failure is an empty participant list, rejected before any fetch;
//! everything else degrades to `None` or empty results.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use mw_core::{
    AvailabilitySlot, FoundSlot, Participant, ParticipantLabel, PreferenceHint, PreferenceWindow,
    SearchPolicy, SlotSearchConfig, TaggedEvent, TimeWindow, ValidationError, find_first_available,
    find_free_slots, find_partial_slots, find_preferred_time,
};

use crate::aggregate::{AggregatorConfig, aggregate_events};
use crate::source::EventSource;

/// Errors surfaced by the scheduling facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// No participants were supplied. There is nothing to schedule around
    /// and no credentials to fetch with, so this is rejected up front.
    #[error("at least one participant is required")]
    NoParticipants,

    /// A derived time window was invalid, e.g. a zero-length search span.
    #[error(transparent)]
    InvalidWindow(#[from] ValidationError),
}

/// Combined policy for the facade: fan-out, slot search, and
/// preference-search knobs.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub aggregator: AggregatorConfig,
    pub slot_search: SlotSearchConfig,
    pub search: SearchPolicy,
}

/// Free and partially-free availability over a window.
///
/// `partial` is populated only when `free` is empty: ranked compromise
/// slots are a fallback, not a parallel result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedAvailability {
    pub free: Vec<AvailabilitySlot>,
    pub partial: Vec<AvailabilitySlot>,
}

/// A scheduling request carried as data, for callers that dispatch on
/// intent rather than calling the operations directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleRequest {
    /// Earliest slot where everyone is free.
    FirstFit {
        window: TimeWindow,
        duration_minutes: i64,
    },
    /// Fully-free slots per duration, or ranked compromise slots.
    Ranked { window: TimeWindow },
    /// Earliest slot satisfying every participant's stated preference.
    PreferenceWeighted {
        hints: Vec<PreferenceHint>,
        duration_minutes: i64,
        search_start: DateTime<Utc>,
    },
}

/// The result of a [`ScheduleRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleResponse {
    Slot(Option<FoundSlot>),
    Ranked(RankedAvailability),
}

/// Schedules meetings across every participant's calendars via a shared
/// event source.
#[derive(Debug)]
pub struct Scheduler<S> {
    source: Arc<S>,
    config: SchedulerConfig,
}

impl<S> Scheduler<S>
where
    S: EventSource + 'static,
{
    pub fn new(source: S) -> Self {
        Self::with_config(source, SchedulerConfig::default())
    }

    pub fn with_config(source: S, config: SchedulerConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
        }
    }

    /// Finds the earliest slot of the given duration where every
    /// participant is free within the window.
    ///
    /// `None` means the window has no qualifying gap; that is a normal
    /// outcome, not an error.
    pub async fn find_first_fit(
        &self,
        participants: &[Participant],
        window: TimeWindow,
        duration_minutes: i64,
    ) -> Result<Option<FoundSlot>, ScheduleError> {
        let events = self.fetch(participants, window).await?;
        Ok(find_first_available(&events, duration_minutes, &window))
    }

    /// Finds fully-free slots per configured duration; when none exist,
    /// falls back to compromise slots ranked by fewest conflicting
    /// participants.
    pub async fn find_ranked_partial(
        &self,
        participants: &[Participant],
        window: TimeWindow,
    ) -> Result<RankedAvailability, ScheduleError> {
        let events = self.fetch(participants, window).await?;
        // Conflicts are attributed against the full roster, not just the
        // participants who produced events.
        let labels: Vec<ParticipantLabel> =
            participants.iter().map(|p| p.label().clone()).collect();

        let free = find_free_slots(&events, &labels, &window, &self.config.slot_search);
        let partial = if free.is_empty() {
            find_partial_slots(&events, &labels, &window, &self.config.slot_search)
        } else {
            Vec::new()
        };
        Ok(RankedAvailability { free, partial })
    }

    /// Finds the earliest slot that satisfies every stated preference,
    /// scanning up to the configured horizon from `search_start`.
    pub async fn find_preference_weighted(
        &self,
        participants: &[Participant],
        hints: &[PreferenceHint],
        duration_minutes: i64,
        search_start: DateTime<Utc>,
    ) -> Result<Option<FoundSlot>, ScheduleError> {
        // A horizon too large to represent cannot contain a slot either.
        let Some(horizon_end) = i64::try_from(self.config.search.horizon_days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|days| search_start.checked_add_signed(days))
        else {
            return Ok(None);
        };
        let window = TimeWindow::new(search_start, horizon_end)?;
        let events = self.fetch(participants, window).await?;

        let preferences: Vec<PreferenceWindow> =
            hints.iter().map(PreferenceWindow::parse).collect();
        Ok(find_preferred_time(
            &events,
            &preferences,
            duration_minutes,
            search_start,
            &self.config.search,
        ))
    }

    /// Dispatches a request carried as data to the matching operation.
    pub async fn schedule(
        &self,
        participants: &[Participant],
        request: ScheduleRequest,
    ) -> Result<ScheduleResponse, ScheduleError> {
        match request {
            ScheduleRequest::FirstFit {
                window,
                duration_minutes,
            } => self
                .find_first_fit(participants, window, duration_minutes)
                .await
                .map(ScheduleResponse::Slot),
            ScheduleRequest::Ranked { window } => self
                .find_ranked_partial(participants, window)
                .await
                .map(ScheduleResponse::Ranked),
            ScheduleRequest::PreferenceWeighted {
                hints,
                duration_minutes,
                search_start,
            } => self
                .find_preference_weighted(participants, &hints, duration_minutes, search_start)
                .await
                .map(ScheduleResponse::Slot),
        }
    }

    async fn fetch(
        &self,
        participants: &[Participant],
        window: TimeWindow,
    ) -> Result<Vec<TaggedEvent>, ScheduleError> {
        if participants.is_empty() {
            return Err(ScheduleError::NoParticipants);
        }
        Ok(aggregate_events(&self.source, participants, window, &self.config.aggregator).await)
    }
}
