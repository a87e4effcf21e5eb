//! The remote event source collaborator contract.

use std::future::Future;

use mw_core::{CalendarId, CalendarInfo, Credential, RawEvent, TimeWindow};

/// A remote calendar provider, keyed by an opaque per-participant
/// credential.
///
/// Implementations are read-only: the aggregator only lists calendars and
/// fetches events. Any error is caught by the aggregator and treated as
/// "zero events for this unit", so implementations should not retry
/// internally beyond their own transport concerns.
pub trait EventSource: Send + Sync {
    /// The source's error type. The aggregator only logs it.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists the calendars visible to the given credential.
    fn list_calendars(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<CalendarInfo>, Self::Error>> + Send;

    /// Lists the events of one calendar that overlap the window.
    fn list_events(
        &self,
        credential: &Credential,
        calendar: &CalendarId,
        window: &TimeWindow,
    ) -> impl Future<Output = Result<Vec<RawEvent>, Self::Error>> + Send;
}
