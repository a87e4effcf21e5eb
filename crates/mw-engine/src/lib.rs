//! Asynchronous shell around the `mw-core` scheduling engine.
//!
//! Defines the [`EventSource`] collaborator contract, the bounded-concurrency
//! calendar aggregator, and the [`Scheduler`] facade exposing the caller
//! operations: first-fit, conflict-ranked availability, and
//! preference-weighted search.

pub mod aggregate;
pub mod scheduler;
pub mod source;

pub use aggregate::{AggregatorConfig, aggregate_events};
pub use scheduler::{
    RankedAvailability, ScheduleError, ScheduleRequest, ScheduleResponse, Scheduler,
    SchedulerConfig,
};
pub use source::EventSource;
