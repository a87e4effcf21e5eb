//! Multi-participant calendar aggregation.
//!
//! Fans out to the remote event source per participant and per calendar,
//! tags every event with its owning participant, and returns one
//! time-sorted list. Fetches are independent, so they run concurrently
//! under a shared in-flight cap; issuance order never affects the sorted
//! result.
//!
//! Partial failure is the normal case here: a participant whose calendar
//! list cannot be resolved, or a single calendar whose events cannot be
//! fetched, is logged and skipped. The aggregation itself never fails —
//! when every unit fails the result is simply empty, and the "nothing to
//! schedule" decision stays with the caller.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use mw_core::{Participant, TaggedEvent, TimeWindow};

use crate::source::EventSource;

/// Aggregation policy.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Cap on concurrently in-flight remote fetches across all
    /// participants and calendars. Kept small: on the order of the
    /// participant count, not unbounded.
    pub max_concurrent_fetches: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
        }
    }
}

/// Fetches and tags events for every participant over the window.
///
/// Returns events sorted ascending by effective start instant (all-day
/// events order as if starting at the beginning of their day). No local
/// state is mutated; dropping the returned future abandons any in-flight
/// fetches.
pub async fn aggregate_events<S>(
    source: &Arc<S>,
    participants: &[Participant],
    window: TimeWindow,
    config: &AggregatorConfig,
) -> Vec<TaggedEvent>
where
    S: EventSource + 'static,
{
    let limit = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
    let mut tasks: JoinSet<Vec<TaggedEvent>> = JoinSet::new();

    for (position, participant) in participants.iter().enumerate() {
        let source = Arc::clone(source);
        let limit = Arc::clone(&limit);
        let participant = participant.clone();
        tasks.spawn(async move {
            fetch_participant_events(&source, &limit, &participant, position + 1, window).await
        });
    }

    let mut events = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(batch) => events.extend(batch),
            Err(err) => tracing::warn!(%err, "participant fetch task failed"),
        }
    }

    events.sort_by_key(TaggedEvent::start_instant);
    tracing::debug!(
        participants = participants.len(),
        events = events.len(),
        "aggregated calendar events"
    );
    events
}

/// Fetches all of one participant's events across their calendars.
///
/// Any failure contributes no events instead of propagating.
async fn fetch_participant_events<S>(
    source: &Arc<S>,
    limit: &Arc<Semaphore>,
    participant: &Participant,
    participant_index: usize,
    window: TimeWindow,
) -> Vec<TaggedEvent>
where
    S: EventSource + 'static,
{
    let calendars = {
        let Ok(_permit) = limit.acquire().await else {
            return Vec::new();
        };
        match source.list_calendars(participant.credential()).await {
            Ok(calendars) => calendars,
            Err(err) => {
                tracing::warn!(
                    participant = %participant.label(),
                    error = %err,
                    "failed to list calendars, skipping participant"
                );
                return Vec::new();
            }
        }
    };
    tracing::debug!(
        participant = %participant.label(),
        calendars = calendars.len(),
        "resolved calendar list"
    );

    let mut tasks: JoinSet<Vec<TaggedEvent>> = JoinSet::new();
    for calendar in calendars {
        let source = Arc::clone(source);
        let limit = Arc::clone(limit);
        let participant = participant.clone();
        tasks.spawn(async move {
            let Ok(_permit) = limit.acquire().await else {
                return Vec::new();
            };
            match source
                .list_events(participant.credential(), &calendar.id, &window)
                .await
            {
                Ok(raw_events) => raw_events
                    .into_iter()
                    .map(|raw| {
                        TaggedEvent::tag(
                            raw,
                            participant.label().clone(),
                            calendar.id.clone(),
                            Some(participant_index),
                        )
                    })
                    .collect(),
                Err(err) => {
                    tracing::warn!(
                        participant = %participant.label(),
                        calendar = %calendar.id,
                        error = %err,
                        "failed to fetch calendar events, skipping calendar"
                    );
                    Vec::new()
                }
            }
        });
    }

    let mut events = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(batch) => events.extend(batch),
            Err(err) => tracing::warn!(%err, "calendar fetch task failed"),
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use thiserror::Error;

    use mw_core::{CalendarId, CalendarInfo, Credential, EventTime, ParticipantLabel, RawEvent};

    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct FakeError(&'static str);

    /// In-memory event source keyed by credential secret.
    #[derive(Default)]
    struct FakeSource {
        /// credential secret -> calendar id -> events
        calendars: HashMap<String, Vec<(String, Vec<RawEvent>)>>,
        /// credential secrets whose calendar listing fails
        broken_accounts: Vec<String>,
        /// calendar ids whose event fetch fails
        broken_calendars: Vec<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fetch_log: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with_account(mut self, secret: &str, calendars: Vec<(String, Vec<RawEvent>)>) -> Self {
            self.calendars.insert(secret.to_string(), calendars);
            self
        }

        /// Holds the in-flight count across a suspension point so an
        /// over-cap burst is observable as `max_in_flight`.
        async fn track_fetch(&self) {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl EventSource for FakeSource {
        type Error = FakeError;

        async fn list_calendars(
            &self,
            credential: &Credential,
        ) -> Result<Vec<CalendarInfo>, FakeError> {
            self.track_fetch().await;
            if self.broken_accounts.iter().any(|s| s == credential.secret()) {
                return Err(FakeError("account unavailable"));
            }
            let calendars = self
                .calendars
                .get(credential.secret())
                .ok_or(FakeError("unknown credential"))?;
            Ok(calendars
                .iter()
                .map(|(id, _)| CalendarInfo {
                    id: CalendarId::new(id.clone()).unwrap(),
                    summary: None,
                    primary: false,
                })
                .collect())
        }

        async fn list_events(
            &self,
            credential: &Credential,
            calendar: &CalendarId,
            _window: &TimeWindow,
        ) -> Result<Vec<RawEvent>, FakeError> {
            self.track_fetch().await;
            self.fetch_log
                .lock()
                .unwrap()
                .push(calendar.as_str().to_string());
            if self.broken_calendars.iter().any(|c| c == calendar.as_str()) {
                return Err(FakeError("calendar unavailable"));
            }
            let calendars = self
                .calendars
                .get(credential.secret())
                .ok_or(FakeError("unknown credential"))?;
            Ok(calendars
                .iter()
                .find(|(id, _)| id == calendar.as_str())
                .map(|(_, events)| events.clone())
                .unwrap_or_default())
        }
    }

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn raw(start: DateTime<Utc>, end: DateTime<Utc>) -> RawEvent {
        RawEvent {
            title: None,
            start: EventTime::At(start),
            end: EventTime::At(end),
        }
    }

    fn participant(label: &str, secret: &str) -> Participant {
        Participant::new(
            ParticipantLabel::new(label).unwrap(),
            Credential::new(secret).unwrap(),
        )
    }

    fn window() -> TimeWindow {
        TimeWindow::new(ts(0), ts(24 * 60)).unwrap()
    }

    #[tokio::test]
    async fn tags_and_sorts_events_across_participants() {
        let source = Arc::new(
            FakeSource::default()
                .with_account(
                    "token-a",
                    vec![
                        ("a-work".to_string(), vec![raw(ts(120), ts(180))]),
                        ("a-personal".to_string(), vec![raw(ts(30), ts(60))]),
                    ],
                )
                .with_account(
                    "token-b",
                    vec![("b-primary".to_string(), vec![raw(ts(60), ts(90))])],
                ),
        );
        let participants = vec![
            participant("alice@x.com", "token-a"),
            participant("bob@x.com", "token-b"),
        ];

        let events =
            aggregate_events(&source, &participants, window(), &AggregatorConfig::default()).await;

        // Sorted by start regardless of which task finished first.
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().map(TaggedEvent::start_instant).collect::<Vec<_>>(),
            vec![ts(30), ts(60), ts(120)]
        );
        assert_eq!(events[0].owner.as_str(), "alice@x.com");
        assert_eq!(events[0].source_calendar_id.as_str(), "a-personal");
        assert_eq!(events[0].participant_index, Some(1));
        assert_eq!(events[1].owner.as_str(), "bob@x.com");
        assert_eq!(events[1].participant_index, Some(2));
    }

    #[tokio::test]
    async fn broken_account_is_skipped_not_fatal() {
        let mut source = FakeSource::default().with_account(
            "token-b",
            vec![("b-primary".to_string(), vec![raw(ts(60), ts(90))])],
        );
        source.broken_accounts.push("token-a".to_string());
        let source = Arc::new(source);

        let participants = vec![
            participant("alice@x.com", "token-a"),
            participant("bob@x.com", "token-b"),
        ];
        let events =
            aggregate_events(&source, &participants, window(), &AggregatorConfig::default()).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner.as_str(), "bob@x.com");
    }

    #[tokio::test]
    async fn broken_calendar_is_skipped_within_a_participant() {
        let mut source = FakeSource::default().with_account(
            "token-a",
            vec![
                ("a-flaky".to_string(), vec![raw(ts(0), ts(30))]),
                ("a-good".to_string(), vec![raw(ts(60), ts(90))]),
            ],
        );
        source.broken_calendars.push("a-flaky".to_string());
        let source = Arc::new(source);

        let participants = vec![participant("alice@x.com", "token-a")];
        let events =
            aggregate_events(&source, &participants, window(), &AggregatorConfig::default()).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_calendar_id.as_str(), "a-good");
    }

    #[tokio::test]
    async fn all_units_failing_yields_empty_not_error() {
        let mut source = FakeSource::default();
        source.broken_accounts.push("token-a".to_string());
        source.broken_accounts.push("token-b".to_string());
        let source = Arc::new(source);

        let participants = vec![
            participant("alice@x.com", "token-a"),
            participant("bob@x.com", "token-b"),
        ];
        let events =
            aggregate_events(&source, &participants, window(), &AggregatorConfig::default()).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn no_participants_yields_empty() {
        let source = Arc::new(FakeSource::default());
        let events =
            aggregate_events(&source, &[], window(), &AggregatorConfig::default()).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn concurrency_stays_within_the_configured_cap() {
        let mut accounts = FakeSource::default();
        for i in 0..6 {
            accounts = accounts.with_account(
                &format!("token-{i}"),
                vec![(format!("cal-{i}"), vec![raw(ts(i * 10), ts(i * 10 + 5))])],
            );
        }
        let source = Arc::new(accounts);
        let participants: Vec<Participant> = (0..6)
            .map(|i| participant(&format!("p{i}@x.com"), &format!("token-{i}")))
            .collect();

        let config = AggregatorConfig {
            max_concurrent_fetches: 2,
        };
        let events = aggregate_events(&source, &participants, window(), &config).await;

        assert_eq!(events.len(), 6);
        // The fixture parks every fetch at a yield point while counted as
        // in flight, so the cap must both bind (never exceeded) and bite
        // (actually reached under contention).
        let max_in_flight = source.max_in_flight.load(Ordering::SeqCst);
        assert!(max_in_flight <= 2, "cap exceeded: {max_in_flight}");
        assert!(max_in_flight >= 2, "cap never saturated: {max_in_flight}");
        assert_eq!(source.fetch_log.lock().unwrap().len(), 6);
    }
}
