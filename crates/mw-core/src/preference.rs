//! Free-text preference parsing and preference-weighted best-time search.
//!
//! Preference hints are whatever participants typed ("next Tuesday",
//! "after 2pm"). Parsing is intentionally heuristic substring matching with
//! a documented fallback (9-17 window, no day restriction), not a strict
//! grammar. The explicit-hour token overriding the coarse day-part buckets
//! is a load-bearing tie-break; keep the matching order.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, Timelike, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event::TaggedEvent;
use crate::first_fit::{FoundSlot, find_first_available};
use crate::timeline::MergedTimeline;
use crate::types::TimeWindow;

static EXPLICIT_HOUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(am|pm|:)").unwrap());

/// A day of the week, ordered Sunday-first to match the phrase matcher.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [Self; 7] = [
        Self::Sunday,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
    ];

    /// Lower-case full day name, as matched against preference phrases.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => Self::Sunday,
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
        }
    }
}

/// A participant's stored free-text scheduling preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceHint {
    /// Day phrase, e.g. "Tuesday" or "early next week".
    pub day_phrase: String,

    /// Time phrase, e.g. "afternoon" or "2pm".
    pub time_phrase: String,

    /// Free-form notes; carried for display, never parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An hour-of-day window `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// A parsed preference: acceptable weekdays plus an hour window.
///
/// Derived fresh from the stored hint on every scheduling attempt; never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceWindow {
    /// Acceptable weekdays. Empty means no day restriction.
    pub preferred_days: BTreeSet<DayOfWeek>,

    /// Acceptable start hours.
    pub hours: HourWindow,
}

impl PreferenceWindow {
    /// Parses a free-text hint into a preference window.
    ///
    /// Day phrase: any weekday name appearing as a substring
    /// (case-insensitive) is added, so "next Tuesday" matches `tuesday`.
    /// Time phrase: an explicit hour token (`2pm`, `14:00`) wins over the
    /// coarse buckets and yields a 2-hour window; otherwise
    /// morning/afternoon/evening/night map to fixed windows; absent any
    /// recognized token the default 9-17 window applies.
    pub fn parse(hint: &PreferenceHint) -> Self {
        let day_phrase = hint.day_phrase.to_lowercase();
        let preferred_days = DayOfWeek::ALL
            .into_iter()
            .filter(|day| day_phrase.contains(day.as_str()))
            .collect();

        let time_phrase = hint.time_phrase.to_lowercase();
        let hours = parse_hour_window(&time_phrase);

        Self {
            preferred_days,
            hours,
        }
    }

    /// Returns true if a slot starting at `start` satisfies this
    /// preference: the weekday is acceptable (vacuously so with no day
    /// restriction) and the start hour falls inside the hour window.
    pub fn allows(&self, start: DateTime<Utc>) -> bool {
        let day_ok = self.preferred_days.is_empty()
            || self.preferred_days.contains(&DayOfWeek::from(start.weekday()));
        let hour = start.hour();
        day_ok && hour >= self.hours.start_hour && hour < self.hours.end_hour
    }
}

fn parse_hour_window(time_phrase: &str) -> HourWindow {
    if let Some(captures) = EXPLICIT_HOUR_RE.captures(time_phrase) {
        if let Ok(mut hour) = captures[1].parse::<u32>() {
            match &captures[2] {
                "pm" if hour < 12 => hour += 12,
                "am" if hour == 12 => hour = 0,
                _ => {}
            }
            return HourWindow {
                start_hour: hour,
                end_hour: hour + 2,
            };
        }
    }

    if time_phrase.contains("morning") {
        HourWindow {
            start_hour: 9,
            end_hour: 12,
        }
    } else if time_phrase.contains("afternoon") {
        HourWindow {
            start_hour: 13,
            end_hour: 17,
        }
    } else if time_phrase.contains("evening") {
        HourWindow {
            start_hour: 17,
            end_hour: 20,
        }
    } else if time_phrase.contains("night") {
        HourWindow {
            start_hour: 19,
            end_hour: 22,
        }
    } else {
        // No recognized token: default working hours.
        HourWindow {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

/// Policy knobs for the preference-weighted search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPolicy {
    /// How many days ahead to consider before giving up.
    pub horizon_days: u64,

    /// First candidate start hour of each day.
    pub day_start_hour: u32,

    /// One past the last candidate start hour of each day.
    pub day_end_hour: u32,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            day_start_hour: 8,
            day_end_hour: 20,
        }
    }
}

/// Finds the earliest slot that is both fully free and inside every stated
/// preference window, scanning day-then-hour across the horizon.
///
/// This is a deliberate earliest-preferred-slot policy, not a global
/// optimum search. If the horizon is exhausted, falls back to an
/// unconstrained first-fit over the same horizon; `None` is a normal
/// outcome, not an error.
pub fn find_preferred_time(
    events: &[TaggedEvent],
    preferences: &[PreferenceWindow],
    duration_minutes: i64,
    search_start: DateTime<Utc>,
    policy: &SearchPolicy,
) -> Option<FoundSlot> {
    if duration_minutes <= 0 || policy.horizon_days == 0 {
        return None;
    }
    let duration = Duration::minutes(duration_minutes);
    let horizon_end = search_start + Duration::days(i64::try_from(policy.horizon_days).ok()?);

    // Candidate days start at day boundaries, so busy time earlier in the
    // first day still has to count; the timeline window opens at day start.
    let first_day = search_start.date_naive();
    let timeline_window = TimeWindow::new(
        first_day.and_time(NaiveTime::MIN).and_utc(),
        horizon_end + Duration::days(1),
    )
    .ok()?;
    let timeline = MergedTimeline::build(events, &timeline_window);

    for day_offset in 0..policy.horizon_days {
        let day = first_day.checked_add_days(Days::new(day_offset))?;
        for hour in policy.day_start_hour..policy.day_end_hour {
            let slot_start = day.and_hms_opt(hour, 0, 0)?.and_utc();
            if slot_start >= horizon_end {
                break;
            }
            let slot_end = slot_start + duration;

            if timeline.is_free(slot_start, slot_end)
                && preferences.iter().all(|pref| pref.allows(slot_start))
            {
                return Some(FoundSlot {
                    start: slot_start,
                    end: slot_end,
                });
            }
        }
    }

    // No preference-qualifying slot in the horizon: any free time will do.
    tracing::debug!("no preference-qualifying slot found, falling back to first fit");
    let fallback_window = TimeWindow::new(search_start, horizon_end).ok()?;
    find_first_available(events, duration_minutes, &fallback_window)
}
