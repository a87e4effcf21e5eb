//! Busy-interval normalization and merging.
//!
//! Converts tagged events into busy periods clipped to a query window, then
//! coalesces overlapping or touching periods into a minimal disjoint cover.
//! Every search stage consumes the resulting [`MergedTimeline`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::TaggedEvent;
use crate::types::TimeWindow;

/// A half-open span `[start, end)` during which at least one participant is
/// busy. Ownership is deliberately not tracked here; once periods are merged
/// the only question the timeline answers is "is someone busy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An ordered sequence of disjoint busy periods, sorted by start.
///
/// Invariant: no two periods overlap or touch; adjacent periods with
/// `a.end >= b.start` have been coalesced. Rebuilt per query, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedTimeline {
    periods: Vec<BusyPeriod>,
}

impl MergedTimeline {
    /// Builds a timeline from tagged events clipped to the query window.
    ///
    /// Events that do not overlap the window are discarded, as are malformed
    /// spans (`end <= start`). A single bad upstream record must not abort
    /// scheduling for everyone else, so there is no failure path here.
    pub fn build(events: &[TaggedEvent], window: &TimeWindow) -> Self {
        let clipped = events.iter().filter_map(|event| {
            let start = event.start_instant();
            let end = event.end_instant();
            if end <= start {
                tracing::debug!(?event.title, "dropping malformed event span");
                return None;
            }
            if !window.overlaps(start, end) {
                return None;
            }
            Some(BusyPeriod {
                start: start.max(window.start()),
                end: end.min(window.end()),
            })
        });
        Self::from_periods(clipped)
    }

    /// Builds a timeline from raw busy periods, dropping malformed spans.
    pub fn from_periods(periods: impl IntoIterator<Item = BusyPeriod>) -> Self {
        let mut sorted: Vec<BusyPeriod> = periods.into_iter().filter(|p| p.end > p.start).collect();
        sorted.sort_by_key(|p| p.start);

        let mut merged: Vec<BusyPeriod> = Vec::new();
        for period in sorted {
            if let Some(last) = merged.last_mut() {
                if period.start <= last.end {
                    last.end = last.end.max(period.end);
                } else {
                    merged.push(period);
                }
            } else {
                merged.push(period);
            }
        }

        Self { periods: merged }
    }

    /// The merged busy periods in ascending start order.
    pub fn periods(&self) -> &[BusyPeriod] {
        &self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Returns true if someone is busy at the given instant.
    pub fn is_busy_at(&self, instant: DateTime<Utc>) -> bool {
        self.periods
            .iter()
            .any(|p| p.start <= instant && instant < p.end)
    }

    /// Returns true if the half-open span `[start, end)` misses every busy
    /// period.
    pub fn is_free(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !self
            .periods
            .iter()
            .any(|p| p.start < end && p.end > start)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};

    use super::*;
    use crate::event::{EventTime, RawEvent};
    use crate::types::{CalendarId, ParticipantLabel};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn event(owner: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> TaggedEvent {
        TaggedEvent::tag(
            RawEvent {
                title: None,
                start: EventTime::At(start),
                end: EventTime::At(end),
            },
            ParticipantLabel::new(owner).unwrap(),
            CalendarId::new("primary").unwrap(),
            None,
        )
    }

    fn period(start: DateTime<Utc>, end: DateTime<Utc>) -> BusyPeriod {
        BusyPeriod { start, end }
    }

    #[test]
    fn merges_overlapping_periods() {
        let events = vec![
            event("a@x.com", ts(60), ts(120)),  // 09:00-10:00
            event("b@x.com", ts(90), ts(180)),  // 09:30-11:00
        ];
        let window = TimeWindow::new(ts(0), ts(240)).unwrap();
        let timeline = MergedTimeline::build(&events, &window);

        assert_eq!(timeline.periods(), &[period(ts(60), ts(180))]);
    }

    #[test]
    fn merges_touching_periods() {
        let timeline = MergedTimeline::from_periods(vec![
            period(ts(0), ts(30)),
            period(ts(30), ts(60)),
        ]);
        assert_eq!(timeline.periods(), &[period(ts(0), ts(60))]);
    }

    #[test]
    fn merge_never_shrinks_previous_end() {
        // Second period is fully contained in the first.
        let timeline = MergedTimeline::from_periods(vec![
            period(ts(0), ts(120)),
            period(ts(30), ts(60)),
        ]);
        assert_eq!(timeline.periods(), &[period(ts(0), ts(120))]);
    }

    #[test]
    fn merge_is_idempotent() {
        let timeline = MergedTimeline::from_periods(vec![
            period(ts(0), ts(45)),
            period(ts(30), ts(60)),
            period(ts(90), ts(120)),
        ]);
        let remerged = MergedTimeline::from_periods(timeline.periods().to_vec());
        assert_eq!(remerged, timeline);
    }

    #[test]
    fn clips_events_to_window() {
        let events = vec![event("a@x.com", ts(-60), ts(30))];
        let window = TimeWindow::new(ts(0), ts(240)).unwrap();
        let timeline = MergedTimeline::build(&events, &window);
        assert_eq!(timeline.periods(), &[period(ts(0), ts(30))]);
    }

    #[test]
    fn discards_events_outside_window() {
        let events = vec![
            event("a@x.com", ts(-120), ts(-60)),
            event("a@x.com", ts(300), ts(360)),
        ];
        let window = TimeWindow::new(ts(0), ts(240)).unwrap();
        let timeline = MergedTimeline::build(&events, &window);
        assert!(timeline.is_empty());
    }

    #[test]
    fn drops_malformed_spans() {
        let events = vec![
            event("a@x.com", ts(60), ts(60)),
            event("a@x.com", ts(90), ts(30)),
        ];
        let window = TimeWindow::new(ts(0), ts(240)).unwrap();
        let timeline = MergedTimeline::build(&events, &window);
        assert!(timeline.is_empty());
    }

    #[test]
    fn all_day_event_covers_whole_day_when_clipped() {
        // All-day event for June 2 as the remote source reports it:
        // date-only start June 2, exclusive date-only end June 3.
        let all_day = TaggedEvent::tag(
            RawEvent {
                title: Some("Offsite".to_string()),
                start: EventTime::AllDay(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
                end: EventTime::AllDay(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()),
            },
            ParticipantLabel::new("a@x.com").unwrap(),
            CalendarId::new("primary").unwrap(),
            None,
        );
        // Window covering June 2 working hours.
        let window = TimeWindow::new(ts(0), ts(12 * 60)).unwrap();
        let timeline = MergedTimeline::build(&[all_day], &window);

        // Busy for the entire window.
        assert_eq!(timeline.periods(), &[period(ts(0), ts(12 * 60))]);
        assert!(timeline.is_busy_at(ts(0)));
        assert!(timeline.is_busy_at(ts(6 * 60)));
    }

    #[test]
    fn coverage_matches_input_periods() {
        // Any instant inside the window is busy iff at least one input
        // period covered it.
        let inputs = vec![
            period(ts(10), ts(40)),
            period(ts(35), ts(50)),
            period(ts(80), ts(81)),
            period(ts(100), ts(160)),
        ];
        let timeline = MergedTimeline::from_periods(inputs.clone());

        for minute in 0..240 {
            let instant = ts(minute);
            let covered = inputs
                .iter()
                .any(|p| p.start <= instant && instant < p.end);
            assert_eq!(
                timeline.is_busy_at(instant),
                covered,
                "coverage mismatch at minute {minute}"
            );
        }
    }

    #[test]
    fn is_free_respects_half_open_bounds() {
        let timeline = MergedTimeline::from_periods(vec![period(ts(60), ts(120))]);
        assert!(timeline.is_free(ts(0), ts(60)));
        assert!(timeline.is_free(ts(120), ts(180)));
        assert!(!timeline.is_free(ts(30), ts(90)));
        assert!(!timeline.is_free(ts(90), ts(100)));
    }
}
