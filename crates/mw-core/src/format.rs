//! Text digests of aggregated events for downstream collaborators.
//!
//! The engine never calls a language model itself; callers that do (or that
//! render a summary view) consume this per-participant digest. Output is
//! plain text, grouped by participant in first-appearance order.

use crate::event::TaggedEvent;
use crate::types::{ParticipantLabel, TimeWindow};

const HEADER_FMT: &str = "%Y-%m-%d %H:%M";
const EVENT_FMT: &str = "%a %b %-d %H:%M";

/// Formats aggregated events as a per-participant text digest over the
/// query window.
pub fn format_events_by_participant(events: &[TaggedEvent], window: &TimeWindow) -> String {
    let mut people: Vec<&ParticipantLabel> = Vec::new();
    for event in events {
        if !people.contains(&&event.owner) {
            people.push(&event.owner);
        }
    }

    let mut output = format!(
        "Calendar events for {} people from {} to {}.\n\n",
        people.len(),
        window.start().format(HEADER_FMT),
        window.end().format(HEADER_FMT),
    );
    output.push_str(&format!(
        "People involved: {}\n\n",
        people
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    ));
    output.push_str("Scheduled events by person:\n\n");

    if events.is_empty() {
        output.push_str("No events scheduled for any of the people.\n");
        return output;
    }

    for person in &people {
        output.push_str(&format!("=== {person} ===\n"));
        for event in events.iter().filter(|e| &&e.owner == person) {
            output.push_str(&format!(
                "- {}\n",
                event.title.as_deref().unwrap_or("Untitled event")
            ));
            output.push_str(&format!("  Calendar: {}\n", event.source_calendar_id));
            output.push_str(&format!(
                "  Start: {}\n",
                event.start_instant().format(EVENT_FMT)
            ));
            output.push_str(&format!(
                "  End: {}\n",
                event.end_instant().format(EVENT_FMT)
            ));
        }
        output.push('\n');
    }

    output
}
